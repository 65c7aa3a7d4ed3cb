//! Content records served to presentation code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Blog post model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: Option<Uuid>,
}

/// A link shown alongside a portfolio item (repository, live demo, write-up).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub label: String,
    pub url: String,
}

/// Portfolio item model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub id: Uuid,
    pub section_id: Uuid,
    pub display_order: i32,
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub links: Vec<ExternalLink>,
    pub tags: Vec<String>,
    pub featured: bool,
}

/// Portfolio section model, with its items in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSection {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub display_order: i32,
    pub items: Vec<PortfolioItem>,
}
