use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Settings read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs the server in file-only mode.
    pub database: Option<DatabaseConfig>,
    pub data_file: PathBuf,
    pub jwt_secret: String,
    pub admin_password_hash: String,
    pub http_port: u16,
    pub cors_allowed_origins: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            data_file: data_file_from_env(),
            jwt_secret: required("JWT_SECRET")?,
            admin_password_hash: required("ADMIN_PASSWORD_HASH")?,
            http_port: parsed_or("HTTP_PORT", 3000)?,
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
        })
    }
}

impl DatabaseConfig {
    /// `Ok(None)` when `DATABASE_URL` is unset or blank.
    pub fn from_env() -> Result<Option<Self>> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };
        Ok(Some(Self {
            url,
            max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 5)?,
            acquire_timeout: Duration::from_secs(parsed_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?),
        }))
    }
}

pub fn data_file_from_env() -> PathBuf {
    std::env::var("DATA_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/posts.json"))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{} must be set", key))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}
