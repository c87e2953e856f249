use crate::data::PrimaryStore;
use crate::infrastructure::config::DatabaseConfig;
use anyhow::{bail, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Builds the pool without connecting, so an unreachable database does not
/// stop startup; the first query reports the outage instead.
pub fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    if !(config.url.starts_with("postgres://") || config.url.starts_with("postgresql://")) {
        bail!("DATABASE_URL must be a postgres:// connection string");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_lazy(&config.url)?;

    tracing::info!(
        "Database connection pool created (max {} connections)",
        config.max_connections
    );
    Ok(pool)
}

/// Primary store handle for the configured database, or an unavailable one
/// when no database is configured or the URL is unusable. With `migrate`,
/// pending migrations are applied; a database that is down at that point
/// only produces a warning.
pub async fn connect_primary_store(
    config: Option<&DatabaseConfig>,
    migrate: bool,
) -> PrimaryStore {
    let Some(config) = config else {
        tracing::warn!("DATABASE_URL not set - running with the data file only");
        return PrimaryStore::unavailable();
    };

    let pool = match create_pool(config) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database pool: {}", e);
            return PrimaryStore::unavailable();
        }
    };

    if migrate {
        if let Err(e) = run_migrations(&pool).await {
            tracing::warn!("Database migrations not applied: {}", e);
        }
    }

    PrimaryStore::from_pool(Some(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    tracing::info!("Database migrations completed");
    Ok(())
}
