/**
 * Health Routes
 * Liveness and content-backend checks
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::state::AppState;

/// Reported instead of the adapter's error, which can name hosts and users.
const BACKEND_UNAVAILABLE: &str = "Backend unavailable";

// Track server start time for uptime calculation
lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

/// Initialize the server start time
pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Backend check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detailed health response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub backend: ServiceCheck,
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// GET /health - Simple health ping
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/backend - Round-trip the content backend
pub async fn health_backend(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.content.backend();

    let (status, check) = match backend.health_check().await {
        Ok(duration) => (
            StatusCode::OK,
            ServiceCheck {
                name: backend.name().to_string(),
                status: "healthy".to_string(),
                response_time: Some(duration.as_millis() as u64),
                error: None,
            },
        ),
        Err(e) => {
            tracing::warn!(backend = backend.name(), error = %e, "backend health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ServiceCheck {
                    name: backend.name().to_string(),
                    status: "unhealthy".to_string(),
                    response_time: None,
                    error: Some(BACKEND_UNAVAILABLE.to_string()),
                },
            )
        }
    };

    let response = BackendHealthResponse {
        status: if status.is_success() { "ok" } else { "degraded" }.to_string(),
        timestamp: Utc::now(),
        uptime: SERVER_START.elapsed().as_secs(),
        backend: check,
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, BackendError, MemoryBackend, Query, Row};
    use crate::config::SiteConfig;
    use crate::content::ContentService;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct DownBackend;

    #[async_trait]
    impl Backend for DownBackend {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn query(&self, _query: &Query) -> Result<Vec<Row>, BackendError> {
            Err(BackendError::Transport("timed out".to_string()))
        }

        async fn health_check(&self) -> Result<Duration, BackendError> {
            Err(BackendError::Transport(
                "connect to db.internal:5432 as portfolio_admin timed out".to_string(),
            ))
        }
    }

    fn test_router(backend: Arc<dyn Backend>) -> Router {
        let state = AppState::new(
            ContentService::new(backend),
            SiteConfig {
                url: "http://localhost:3000".to_string(),
                title: "Blog".to_string(),
                description: "Test".to_string(),
            },
        );
        Router::new()
            .route("/health", get(health_ping))
            .route("/health/backend", get(health_backend))
            .with_state(state)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(app: Router, uri: &str) -> (StatusCode, T) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value: T = serde_json::from_slice(&body).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn test_health_ping_returns_ok() {
        init_start_time();
        let app = test_router(Arc::new(MemoryBackend::new()));
        let (status, body) = get_json::<SimpleHealthResponse>(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_health_backend_healthy() {
        let app = test_router(Arc::new(MemoryBackend::new()));
        let (status, body) = get_json::<BackendHealthResponse>(app, "/health/backend").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.backend.name, "memory");
        assert_eq!(body.backend.status, "healthy");
    }

    #[tokio::test]
    async fn test_health_backend_unhealthy() {
        let app = test_router(Arc::new(DownBackend));
        let (status, body) = get_json::<BackendHealthResponse>(app, "/health/backend").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.backend.status, "unhealthy");
        let error = body.backend.error.unwrap();
        assert_eq!(error, BACKEND_UNAVAILABLE);
        assert!(!error.contains("db.internal"));
        assert!(!error.contains("portfolio_admin"));
    }
}
