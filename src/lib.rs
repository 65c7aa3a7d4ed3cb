//! Portfolio content service - read-only access to blog posts and portfolio
//! sections stored in a managed backend, served over a small HTTP API.

pub mod backend;
pub mod config;
pub mod content;
pub mod logging;
pub mod routes;
pub mod state;

use anyhow::Context;
use axum::{http::HeaderValue, http::Method, middleware, routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::content::ContentService;
use crate::state::AppState;

/// CORS for the configured frontend origins. Unparsable origins are skipped.
pub fn configure_cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// Create and configure the application router.
pub fn create_app(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = configure_cors(allowed_origins);

    Router::new()
        .route("/api/blog", get(routes::blog::list_posts))
        .route("/api/blog/{slug}", get(routes::blog::get_post))
        .route("/api/portfolio", get(routes::portfolio::get_portfolio))
        .route("/rss.xml", get(routes::rss::rss_feed))
        .route("/health", get(routes::health::health_ping))
        .route("/health/backend", get(routes::health::health_backend))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Read-only API: nothing legitimate sends a large body
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(cors)
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    // Held until the server exits so buffered log lines are flushed.
    let _log_guards = logging::init(&config);

    routes::health::init_start_time();

    let backend = backend::connect(&config.backend)
        .await
        .context("failed to connect to content backend")?;
    tracing::info!(backend = backend.name(), "Content backend ready");

    let state = AppState::new(ContentService::new(backend), config.site.clone());
    let app = create_app(state, &config.allowed_origins);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid HOST/PORT {}:{}", config.host, config.port))?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
