use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::config::SiteConfig;
use crate::content::{BlogPost, Outcome};
use crate::state::AppState;

const MAX_ITEMS: usize = 50;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// Render an RSS 2.0 document for the given posts (already newest first).
pub fn render_feed(site: &SiteConfig, posts: &[BlogPost]) -> String {
    let mut items = String::new();
    for post in posts.iter().take(MAX_ITEMS) {
        let post_url = format!("{}/blog/{}", site.url, post.slug);
        let desc = post.summary.as_deref().unwrap_or("");
        let pub_date = post
            .published_at
            .map(|dt| format!("      <pubDate>{}</pubDate>\n", rfc822(&dt)))
            .unwrap_or_default();
        items.push_str(&format!(
            "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <description>{}</description>\n{}      <guid isPermaLink=\"true\">{}</guid>\n    </item>\n",
            escape_xml(&post.title),
            escape_xml(&post_url),
            escape_xml(desc),
            pub_date,
            escape_xml(&post_url),
        ));
    }

    let feed_url = format!("{}/rss.xml", site.url);
    let blog_url = format!("{}/blog", site.url);
    let last_build = posts
        .iter()
        .find_map(|post| post.published_at)
        .map(|dt| format!("    <lastBuildDate>{}</lastBuildDate>\n", rfc822(&dt)))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>en-us</language>
    <atom:link href="{}" rel="self" type="application/rss+xml"/>
{}{}  </channel>
</rss>"#,
        escape_xml(&site.title),
        escape_xml(&blog_url),
        escape_xml(&site.description),
        escape_xml(&feed_url),
        last_build,
        items,
    )
}

/// GET /rss.xml
pub async fn rss_feed(State(state): State<AppState>) -> Response {
    let posts = match state.content.list_published_posts().await {
        Outcome::Loaded(posts) => posts,
        Outcome::Empty => Vec::new(),
        Outcome::Failed(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain")],
                "Service unavailable",
            )
                .into_response();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
            (
                header::CACHE_CONTROL,
                "public, max-age=3600, stale-while-revalidate=600",
            ),
        ],
        render_feed(&state.site, &posts),
    )
        .into_response()
}
