//! Row-to-record mapping.
//!
//! Each mapper takes one raw backend row and either produces a validated
//! record or a `ContentError::MalformedRecord` naming the offending field.
//! Unknown columns are ignored.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::error::ContentError;
use super::models::{BlogPost, ExternalLink, PortfolioItem, PortfolioSection};
use crate::backend::Row;

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Parse a timestamp as written by PostgREST, `row_to_json` or a seed file.
///
/// RFC 3339 is preferred; zone-less forms are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", s))),
    }
}

#[derive(Deserialize)]
struct BlogPostRow {
    id: Uuid,
    slug: String,
    title: String,
    #[serde(default)]
    summary: Option<String>,
    content: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    published: bool,
    #[serde(default, deserialize_with = "optional_timestamp")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    author_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct PortfolioSectionRow {
    id: Uuid,
    title: String,
    #[serde(default)]
    description: Option<String>,
    display_order: i32,
}

#[derive(Deserialize)]
struct PortfolioItemRow {
    id: Uuid,
    section_id: Uuid,
    display_order: i32,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    media_url: Option<String>,
    #[serde(default)]
    links: Option<Vec<ExternalLink>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    featured: Option<bool>,
}

fn malformed(entity: &'static str, row: &Row, reason: impl std::fmt::Display) -> ContentError {
    let reason = match row.get("id").filter(|id| !id.is_null()) {
        Some(id) => format!("{} (id: {})", reason, id),
        None => reason.to_string(),
    };
    ContentError::MalformedRecord { entity, reason }
}

fn decode<T: DeserializeOwned>(entity: &'static str, row: &Row) -> Result<T, ContentError> {
    serde_json::from_value(Value::Object(row.clone())).map_err(|e| malformed(entity, row, e))
}

/// Drop blanks and repeats, keeping first-seen order.
fn normalize_tags(tags: Option<Vec<String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.unwrap_or_default() {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub fn map_blog_post(row: &Row) -> Result<BlogPost, ContentError> {
    let raw: BlogPostRow = decode("blog post", row)?;

    if !is_valid_slug(&raw.slug) {
        return Err(malformed(
            "blog post",
            row,
            format!("slug '{}' is not URL-safe", raw.slug),
        ));
    }

    Ok(BlogPost {
        id: raw.id,
        slug: raw.slug,
        title: raw.title,
        summary: raw.summary,
        content: raw.content,
        tags: normalize_tags(raw.tags),
        published: raw.published,
        published_at: raw.published_at,
        author_id: raw.author_id,
    })
}

/// Maps the section row only; items are attached by the caller.
pub fn map_portfolio_section(row: &Row) -> Result<PortfolioSection, ContentError> {
    let raw: PortfolioSectionRow = decode("portfolio section", row)?;
    Ok(PortfolioSection {
        id: raw.id,
        title: raw.title,
        description: raw.description,
        display_order: raw.display_order,
        items: Vec::new(),
    })
}

pub fn map_portfolio_item(row: &Row) -> Result<PortfolioItem, ContentError> {
    let raw: PortfolioItemRow = decode("portfolio item", row)?;
    Ok(PortfolioItem {
        id: raw.id,
        section_id: raw.section_id,
        display_order: raw.display_order,
        title: raw.title,
        description: raw.description,
        media_url: raw.media_url.filter(|url| !url.trim().is_empty()),
        links: raw.links.unwrap_or_default(),
        tags: normalize_tags(raw.tags),
        featured: raw.featured.unwrap_or(false),
    })
}
