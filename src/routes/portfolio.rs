/**
 * Portfolio Routes
 * Portfolio sections (projects, experience, ...) with their items
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::content::{Outcome, PortfolioSection};
use crate::state::AppState;

/// Response for GET /api/portfolio
#[derive(Debug, Serialize, Deserialize)]
pub struct PortfolioResponse {
    pub sections: Vec<PortfolioSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/portfolio
/// Sections in display order, each with its items in display order.
pub async fn get_portfolio(State(state): State<AppState>) -> impl IntoResponse {
    match state.content.list_portfolio_sections_with_items().await {
        Outcome::Loaded(sections) => (
            StatusCode::OK,
            Json(PortfolioResponse {
                sections,
                error: None,
            }),
        ),
        Outcome::Empty => (
            StatusCode::OK,
            Json(PortfolioResponse {
                sections: Vec::new(),
                error: None,
            }),
        ),
        Outcome::Failed(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(PortfolioResponse {
                sections: Vec::new(),
                error: Some("Content temporarily unavailable".to_string()),
            }),
        ),
    }
}
