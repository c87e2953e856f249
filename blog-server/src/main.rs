use blog_server::application::{AuthService, Stores};
use blog_server::data::{JsonFileStore, PostCache};
use blog_server::infrastructure::{
    config::AppConfig, database::connect_primary_store, jwt::JwtService, logging::init_logging,
};
use blog_server::presentation::{configure, AppServices};
use dotenvy::dotenv;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    init_logging();

    let config = AppConfig::from_env()?;
    let http_addr = format!("0.0.0.0:{}", config.http_port);

    tracing::info!("Starting blog server...");
    tracing::info!("HTTP server will listen on {}", http_addr);
    tracing::info!("Data file: {:?}", config.data_file);

    let stores = Stores::new(
        PostCache::new(),
        connect_primary_store(config.database.as_ref(), true).await,
        JsonFileStore::new(&config.data_file),
    );

    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret));
    let auth_service = AuthService::new(config.admin_password_hash.clone(), jwt_service);
    let services = AppServices::new(stores, auth_service);

    // Наполняем кэш до приёма запросов
    let report = services.sync.initialize().await;
    tracing::info!(
        "Cache ready with {} posts (source: {:?})",
        report.total_cache,
        report.source
    );

    run_http_server(http_addr, services, config.cors_allowed_origins).await?;

    tracing::info!("Shutting down...");
    Ok(())
}

/// Configure CORS for the HTTP server with allowed origins from .env
fn configure_cors(allowed_origins: &str) -> actix_cors::Cors {
    use actix_cors::Cors;
    use actix_web::http::header;

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .max_age(3600);

    for origin in allowed_origins.split(',').map(str::trim) {
        if !origin.is_empty() {
            cors = cors.allowed_origin(origin);
            tracing::debug!("Added allowed CORS origin: {}", origin);
        }
    }

    cors
}

async fn run_http_server(
    addr: String,
    services: AppServices,
    cors_allowed_origins: String,
) -> anyhow::Result<()> {
    use actix_web::{middleware::Logger, App, HttpServer};

    tracing::info!("CORS allowed origins: {}", cors_allowed_origins);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(configure_cors(&cors_allowed_origins))
            .configure(configure(services.clone()))
    })
    .bind(&addr)?
    .run();

    tracing::info!("HTTP server running on {}", addr);

    server.await?;

    Ok(())
}
