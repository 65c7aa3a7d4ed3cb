/**
 * Blog Routes
 * Read-only endpoints for published blog posts
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::{mappers::is_valid_slug, BlogPost, Outcome};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/blog
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

/// Response for GET /api/blog
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListResponse {
    pub items: Vec<BlogPostSummary>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Blog post summary (for list view)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<BlogPost> for BlogPostSummary {
    fn from(post: BlogPost) -> Self {
        Self {
            id: post.id,
            title: post.title,
            slug: post.slug,
            summary: post.summary,
            tags: post.tags,
            published_at: post.published_at,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn error_response(status: StatusCode, error: &str, message: Option<&str>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.map(str::to_string),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blog - Published posts, newest first, paginated
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> impl IntoResponse {
    // Clamp page_size to max 100
    let page_size = query.page_size.clamp(1, 100);
    let page = query.page.max(1);

    let (status, posts, error) = match state.content.list_published_posts().await {
        Outcome::Loaded(posts) => (StatusCode::OK, posts, None),
        Outcome::Empty => (StatusCode::OK, Vec::new(), None),
        Outcome::Failed(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Vec::new(),
            Some("Content temporarily unavailable".to_string()),
        ),
    };

    let total = posts.len();
    let items: Vec<BlogPostSummary> = posts
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .map(BlogPostSummary::from)
        .collect();

    (
        status,
        Json(BlogListResponse {
            items,
            page,
            page_size,
            total,
            error,
        }),
    )
}

/// GET /api/blog/{slug} - Single published post
pub async fn get_post(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    if !is_valid_slug(&slug) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid slug",
            Some("Slug must contain only lowercase letters, numbers, and hyphens"),
        );
    }

    match state.content.get_post_by_slug(&slug).await {
        Outcome::Loaded(post) => (StatusCode::OK, Json(post)).into_response(),
        Outcome::Empty => error_response(StatusCode::NOT_FOUND, "Not found", None),
        Outcome::Failed(_) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Content temporarily unavailable",
            None,
        ),
    }
}
