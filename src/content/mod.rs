//! Content access layer.
//!
//! `ContentService` is the read surface used by the HTTP routes: published
//! blog posts and the ordered portfolio. Every call is a fresh read against
//! the injected backend; failures are logged here and handed back as
//! [`Outcome::Failed`] so callers never see adapter-specific errors.

pub mod error;
pub mod mappers;
pub mod models;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{Backend, Query, Row};

pub use error::ContentError;
pub use models::{BlogPost, ExternalLink, PortfolioItem, PortfolioSection};

pub const POSTS_TABLE: &str = "blog_posts";
pub const SECTIONS_TABLE: &str = "portfolio_sections";
pub const ITEMS_TABLE: &str = "portfolio_items";

/// Result of a content read.
///
/// Keeps "nothing there" apart from "could not ask", which a bare empty
/// list or `None` would conflate.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Loaded(T),
    Empty,
    Failed(ContentError),
}

impl<T> Outcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&ContentError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Fail-soft view: failures read as absent.
    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Loaded(value) => Some(value),
            Outcome::Empty | Outcome::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Loaded(value) => Outcome::Loaded(f(value)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Fail-soft view: failures read as empty.
    pub fn unwrap_or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

impl<T> Outcome<Vec<T>> {
    fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            Outcome::Empty
        } else {
            Outcome::Loaded(items)
        }
    }
}

/// Newest first, undated posts last. Stable, so equal dates keep the
/// backend's id order.
fn sort_newest_first(posts: &mut [BlogPost]) {
    posts.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn map_rows<T>(
    rows: &[Row],
    mapper: fn(&Row) -> Result<T, ContentError>,
) -> Result<Vec<T>, ContentError> {
    rows.iter().map(mapper).collect()
}

#[derive(Clone)]
pub struct ContentService {
    backend: Arc<dyn Backend>,
}

impl ContentService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    async fn fetch(&self, query: Query) -> Result<Vec<Row>, ContentError> {
        self.backend
            .query(&query)
            .await
            .map_err(ContentError::from_backend)
    }

    /// Published posts, newest first.
    pub async fn list_published_posts(&self) -> Outcome<Vec<BlogPost>> {
        let query = Query::table(POSTS_TABLE)
            .eq("published", true)
            .order_desc("published_at")
            .order_asc("id");

        let result = self
            .fetch(query)
            .await
            .and_then(|rows| map_rows(&rows, mappers::map_blog_post));

        match result {
            Ok(mut posts) => {
                posts.retain(|post| post.published);
                sort_newest_first(&mut posts);
                tracing::debug!(count = posts.len(), "listed published posts");
                Outcome::from_vec(posts)
            }
            Err(ContentError::NotFound) => Outcome::Empty,
            Err(err) => {
                tracing::error!(
                    operation = "list_published_posts",
                    kind = err.kind(),
                    error = %err,
                    "failed to list published posts"
                );
                Outcome::Failed(err)
            }
        }
    }

    /// The published post with exactly this slug (case-sensitive).
    pub async fn get_post_by_slug(&self, slug: &str) -> Outcome<BlogPost> {
        if slug.trim().is_empty() {
            tracing::debug!("empty slug requested");
            return Outcome::Empty;
        }

        let query = Query::table(POSTS_TABLE)
            .eq("slug", slug)
            .eq("published", true)
            .single();

        let result = self.fetch(query).await.and_then(|rows| match rows.first() {
            Some(row) => mappers::map_blog_post(row).map(Some),
            None => Ok(None),
        });

        match result {
            Ok(Some(post)) if post.published && post.slug == slug => Outcome::Loaded(post),
            Ok(_) | Err(ContentError::NotFound) => {
                tracing::debug!(slug = %slug, "post not found");
                Outcome::Empty
            }
            Err(err) => {
                tracing::error!(
                    operation = "get_post_by_slug",
                    slug = %slug,
                    kind = err.kind(),
                    error = %err,
                    "failed to fetch post"
                );
                Outcome::Failed(err)
            }
        }
    }

    /// Portfolio sections by display order, each with its items by display order.
    pub async fn list_portfolio_sections_with_items(&self) -> Outcome<Vec<PortfolioSection>> {
        match self.load_portfolio().await {
            Ok(sections) => {
                tracing::debug!(count = sections.len(), "listed portfolio sections");
                Outcome::from_vec(sections)
            }
            Err(ContentError::NotFound) => Outcome::Empty,
            Err(err) => {
                tracing::error!(
                    operation = "list_portfolio_sections_with_items",
                    kind = err.kind(),
                    error = %err,
                    "failed to list portfolio sections"
                );
                Outcome::Failed(err)
            }
        }
    }

    async fn load_portfolio(&self) -> Result<Vec<PortfolioSection>, ContentError> {
        let rows = self
            .fetch(
                Query::table(SECTIONS_TABLE)
                    .order_asc("display_order")
                    .order_asc("id"),
            )
            .await?;
        let mut sections = map_rows(&rows, mappers::map_portfolio_section)?;
        if sections.is_empty() {
            return Ok(sections);
        }

        let section_ids: Vec<String> = sections.iter().map(|s| s.id.to_string()).collect();
        let rows = self
            .fetch(
                Query::table(ITEMS_TABLE)
                    .in_list("section_id", section_ids)
                    .order_asc("display_order")
                    .order_asc("id"),
            )
            .await?;
        let items = map_rows(&rows, mappers::map_portfolio_item)?;

        let index: HashMap<Uuid, usize> = sections
            .iter()
            .enumerate()
            .map(|(i, section)| (section.id, i))
            .collect();

        for item in items {
            match index.get(&item.section_id) {
                Some(&i) => sections[i].items.push(item),
                None => {
                    tracing::debug!(item_id = %item.id, section_id = %item.section_id, "dropping orphan portfolio item")
                }
            }
        }

        // Stable sorts: ties keep the backend's primary-key order.
        sections.sort_by_key(|section| section.display_order);
        for section in &mut sections {
            section.items.sort_by_key(|item| item.display_order);
        }

        Ok(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryBackend};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    const POST_A: &str = "00000000-0000-4000-8000-00000000000a";
    const POST_B: &str = "00000000-0000-4000-8000-00000000000b";
    const POST_C: &str = "00000000-0000-4000-8000-00000000000c";
    const S1: &str = "10000000-0000-4000-8000-000000000001";
    const S2: &str = "10000000-0000-4000-8000-000000000002";
    const I1: &str = "20000000-0000-4000-8000-000000000001";
    const I2: &str = "20000000-0000-4000-8000-000000000002";

    /// Fails every call the way an unreachable backend would.
    struct UnreachableBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Backend for UnreachableBackend {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn query(&self, _query: &Query) -> Result<Vec<Row>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Transport("connection refused".to_string()))
        }

        async fn health_check(&self) -> Result<Duration, BackendError> {
            Err(BackendError::Transport("connection refused".to_string()))
        }
    }

    /// Returns its rows as stored, ignoring filters and ordering.
    struct UnorderedBackend {
        rows: Vec<Row>,
    }

    #[async_trait]
    impl Backend for UnorderedBackend {
        fn name(&self) -> &'static str {
            "unordered"
        }

        async fn query(&self, _query: &Query) -> Result<Vec<Row>, BackendError> {
            Ok(self.rows.clone())
        }

        async fn health_check(&self) -> Result<Duration, BackendError> {
            Ok(Duration::ZERO)
        }
    }

    type CapturedEvent = (Level, HashMap<String, String>);

    /// Records every event with its fields rendered as strings.
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<CapturedEvent>>>);

    struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0
                .insert(field.name().to_string(), format!("{:?}", value));
        }
    }

    impl<S: Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), fields));
        }
    }

    impl CapturedEvents {
        fn errors(&self) -> Vec<HashMap<String, String>> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(level, _)| *level == Level::ERROR)
                .map(|(_, fields)| fields.clone())
                .collect()
        }
    }

    fn capture_events() -> (CapturedEvents, tracing::subscriber::DefaultGuard) {
        let events = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        (events, tracing::subscriber::set_default(subscriber))
    }

    fn post(id: &str, slug: &str, published: bool, published_at: Value) -> Value {
        json!({
            "id": id,
            "slug": slug,
            "title": slug.to_uppercase(),
            "content": "body",
            "published": published,
            "published_at": published_at,
        })
    }

    async fn blog_service() -> ContentService {
        let backend = MemoryBackend::new();
        backend
            .insert_many(
                POSTS_TABLE,
                vec![
                    post(POST_A, "post-a", true, json!("2024-01-01T00:00:00Z")),
                    post(POST_B, "post-b", false, Value::Null),
                    post(POST_C, "post-c", true, json!("2024-02-01T00:00:00Z")),
                ],
            )
            .await;
        ContentService::new(Arc::new(backend))
    }

    fn item(id: &str, section: &str, order: i32) -> Value {
        json!({"id": id, "section_id": section, "display_order": order, "title": id})
    }

    async fn portfolio_service() -> ContentService {
        let backend = MemoryBackend::new();
        backend
            .insert_many(
                SECTIONS_TABLE,
                vec![
                    json!({"id": S2, "title": "Experience", "display_order": 2}),
                    json!({"id": S1, "title": "Projects", "display_order": 1}),
                ],
            )
            .await;
        backend
            .insert_many(ITEMS_TABLE, vec![item(I1, S1, 2), item(I2, S1, 1)])
            .await;
        ContentService::new(Arc::new(backend))
    }

    fn unreachable() -> (Arc<UnreachableBackend>, ContentService) {
        let backend = Arc::new(UnreachableBackend {
            calls: AtomicUsize::new(0),
        });
        (backend.clone(), ContentService::new(backend))
    }

    fn slugs(posts: &[BlogPost]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_published_posts_newest_first_without_drafts() {
        let service = blog_service().await;
        let posts = service.list_published_posts().await.unwrap_or_default();
        assert_eq!(slugs(&posts), vec!["post-c", "post-a"]);
        assert!(posts.iter().all(|p| p.published));
    }

    #[tokio::test]
    async fn test_list_published_posts_is_idempotent() {
        let service = blog_service().await;
        let first = service.list_published_posts().await;
        let second = service.list_published_posts().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_backend_is_empty_not_failed() {
        let service = ContentService::new(Arc::new(MemoryBackend::new()));
        assert_eq!(service.list_published_posts().await, Outcome::Empty);
        assert_eq!(service.list_portfolio_sections_with_items().await, Outcome::Empty);
        assert!(service
            .list_published_posts()
            .await
            .unwrap_or_default()
            .is_empty());
    }

    #[tokio::test]
    async fn test_connection_error_fails_soft() {
        let (backend, service) = unreachable();
        let outcome = service.list_published_posts().await;

        assert!(outcome.is_failed());
        assert!(matches!(
            outcome.failure(),
            Some(ContentError::BackendFailure { .. })
        ));
        assert!(outcome.unwrap_or_default().is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_list_logs_one_error_with_operation() {
        let (events, _guard) = capture_events();
        let (_backend, service) = unreachable();

        assert!(service.list_published_posts().await.is_failed());

        let errors = events.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["operation"], "list_published_posts");
        assert_eq!(errors[0]["kind"], "backend_failure");
    }

    #[tokio::test]
    async fn test_failed_slug_lookup_logs_the_slug() {
        let (events, _guard) = capture_events();
        let (_backend, service) = unreachable();

        assert!(service.get_post_by_slug("post-a").await.is_failed());

        let errors = events.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["operation"], "get_post_by_slug");
        assert!(errors[0]["slug"].contains("post-a"));
    }

    #[tokio::test]
    async fn test_not_found_and_empty_log_no_errors() {
        let (events, _guard) = capture_events();
        let service = blog_service().await;
        assert_eq!(service.get_post_by_slug("missing").await, Outcome::Empty);

        let empty = ContentService::new(Arc::new(MemoryBackend::new()));
        assert_eq!(empty.list_published_posts().await, Outcome::Empty);
        assert_eq!(empty.list_portfolio_sections_with_items().await, Outcome::Empty);

        assert!(events.errors().is_empty());
    }

    #[tokio::test]
    async fn test_list_published_posts_orders_by_instant_across_formats() {
        let rows = [
            post(POST_A, "undated", true, Value::Null),
            post(POST_B, "earlier", true, json!("2024-03-01T05:00:00Z")),
            post(POST_C, "later", true, json!("2024-03-01 10:00:00")),
        ]
        .into_iter()
        .filter_map(|row| match row {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect();
        let service = ContentService::new(Arc::new(UnorderedBackend { rows }));

        let posts = service.list_published_posts().await.unwrap_or_default();
        assert_eq!(slugs(&posts), vec!["later", "earlier", "undated"]);
    }

    #[tokio::test]
    async fn test_get_post_by_slug_exact_match() {
        let service = blog_service().await;
        match service.get_post_by_slug("post-a").await {
            Outcome::Loaded(post) => assert_eq!(post.id.to_string(), POST_A),
            other => panic!("expected post-a, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_post_by_slug_absent_cases() {
        let service = blog_service().await;
        assert_eq!(service.get_post_by_slug("post-b").await, Outcome::Empty);
        assert_eq!(service.get_post_by_slug("POST-A").await, Outcome::Empty);
        assert_eq!(service.get_post_by_slug("missing").await, Outcome::Empty);
        assert_eq!(service.get_post_by_slug("").await, Outcome::Empty);
    }

    #[tokio::test]
    async fn test_get_post_by_slug_empty_slug_skips_backend() {
        let (backend, service) = unreachable();
        assert_eq!(service.get_post_by_slug("  ").await, Outcome::Empty);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_post_by_slug_backend_failure() {
        let (_backend, service) = unreachable();
        let outcome = service.get_post_by_slug("post-a").await;
        assert!(outcome.is_failed());
        assert_eq!(outcome.into_option(), None);
    }

    #[tokio::test]
    async fn test_malformed_row_fails_the_list() {
        let backend = MemoryBackend::new();
        backend
            .insert(
                POSTS_TABLE,
                json!({"id": POST_A, "slug": "ok", "published": true, "content": ""}),
            )
            .await;
        let service = ContentService::new(Arc::new(backend));

        match service.list_published_posts().await {
            Outcome::Failed(ContentError::MalformedRecord { entity, reason }) => {
                assert_eq!(entity, "blog post");
                assert!(reason.contains("title"));
            }
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sections_and_items_in_display_order() {
        let service = portfolio_service().await;
        let sections = service
            .list_portfolio_sections_with_items()
            .await
            .unwrap_or_default();

        let shape: Vec<(String, Vec<String>)> = sections
            .iter()
            .map(|s| {
                (
                    s.id.to_string(),
                    s.items.iter().map(|i| i.id.to_string()).collect(),
                )
            })
            .collect();

        assert_eq!(
            shape,
            vec![
                (S1.to_string(), vec![I2.to_string(), I1.to_string()]),
                (S2.to_string(), vec![]),
            ]
        );
    }

    #[tokio::test]
    async fn test_display_order_ties_keep_primary_key_order() {
        let backend = MemoryBackend::new();
        backend
            .insert(SECTIONS_TABLE, json!({"id": S1, "title": "Work", "display_order": 1}))
            .await;
        backend
            .insert_many(ITEMS_TABLE, vec![item(I2, S1, 1), item(I1, S1, 1)])
            .await;
        let service = ContentService::new(Arc::new(backend));

        let sections = service
            .list_portfolio_sections_with_items()
            .await
            .unwrap_or_default();
        let ids: Vec<String> = sections[0].items.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(ids, vec![I1.to_string(), I2.to_string()]);
    }

    #[tokio::test]
    async fn test_portfolio_backend_failure() {
        let (_backend, service) = unreachable();
        let outcome = service.list_portfolio_sections_with_items().await;
        assert!(outcome.is_failed());
        assert!(outcome.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_outcome_map_preserves_variants() {
        assert_eq!(Outcome::Loaded(2).map(|n| n * 2), Outcome::Loaded(4));
        assert_eq!(Outcome::<i32>::Empty.map(|n| n * 2), Outcome::Empty);
        let failed: Outcome<i32> = Outcome::Failed(ContentError::NotFound);
        assert!(failed.map(|n| n * 2).is_failed());
    }
}
