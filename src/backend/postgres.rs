//! Direct PostgreSQL backend over an sqlx pool.
//!
//! Rows are returned as `row_to_json(t)` so every adapter hands the content
//! layer the same JSON row shape.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use std::time::{Duration, Instant};

use reqwest::Url;

use super::{
    ensure_single, validate_ident, Backend, BackendError, Direction, Filter, FilterValue, Query,
    Row,
};
use crate::config::DbConfig;

pub struct PgBackend {
    pool: PgPool,
}

/// Database URL with the password and query string removed, for logging.
fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => "<unparseable database url>".to_string(),
    }
}

impl PgBackend {
    pub async fn connect(config: &DbConfig) -> Result<Self, BackendError> {
        tracing::info!("Initializing database connection pool...");
        tracing::debug!("Database URL: {}", redact_url(&config.url));

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        tracing::info!("Database connection pool initialized successfully");

        Ok(Self { pool })
    }

    /// Create the content tables for local development.
    pub async fn run_migrations(&self) -> Result<(), BackendError> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                slug TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT,
                content TEXT NOT NULL DEFAULT '',
                tags TEXT[] NOT NULL DEFAULT '{}',
                published BOOLEAN NOT NULL DEFAULT false,
                published_at TIMESTAMPTZ,
                author_id UUID,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolio_sections (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                title TEXT NOT NULL,
                description TEXT,
                display_order INTEGER NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolio_items (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                section_id UUID NOT NULL REFERENCES portfolio_sections(id) ON DELETE CASCADE,
                display_order INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                media_url TEXT,
                links JSONB NOT NULL DEFAULT '[]',
                tags TEXT[] NOT NULL DEFAULT '{}',
                featured BOOLEAN NOT NULL DEFAULT false
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::raw_sql(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_blog_posts_slug
                ON blog_posts(slug);
            CREATE INDEX IF NOT EXISTS idx_blog_posts_pub_published_at
                ON blog_posts(published, published_at DESC);
            CREATE INDEX IF NOT EXISTS idx_portfolio_items_section_order
                ON portfolio_items(section_id, display_order)
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed successfully");

        Ok(())
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Bool(b) => {
            builder.push_bind(*b);
        }
        FilterValue::Int(n) => {
            builder.push_bind(*n);
        }
        FilterValue::Text(s) => {
            builder.push_bind(s.clone());
        }
    }
}

/// Text operands are compared against the column's text form so UUID and
/// TEXT columns can both be matched by string.
fn push_column(builder: &mut QueryBuilder<'_, Postgres>, column: &str, value: Option<&FilterValue>) {
    builder.push("t.").push(column);
    if matches!(value, Some(FilterValue::Text(_))) {
        builder.push("::text");
    }
}

/// Translate a `Query` into a parameterized SELECT.
pub fn build_select(query: &Query) -> Result<QueryBuilder<'static, Postgres>, BackendError> {
    let table = validate_ident(&query.table)?;
    let mut builder = QueryBuilder::new("SELECT row_to_json(t)::jsonb FROM ");
    builder.push(table).push(" t");

    for (i, filter) in query.filters.iter().enumerate() {
        let column = validate_ident(filter.column())?;
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Eq { value, .. } => {
                push_column(&mut builder, column, Some(value));
                builder.push(" = ");
                push_value(&mut builder, value);
            }
            Filter::In { values, .. } if values.is_empty() => {
                builder.push("FALSE");
            }
            Filter::In { values, .. } => {
                push_column(&mut builder, column, values.first());
                builder.push(" IN (");
                let mut separated = builder.separated(", ");
                for value in values {
                    match value {
                        FilterValue::Bool(b) => separated.push_bind(*b),
                        FilterValue::Int(n) => separated.push_bind(*n),
                        FilterValue::Text(s) => separated.push_bind(s.clone()),
                    };
                }
                separated.push_unseparated(")");
            }
        }
    }

    for (i, order) in query.ordering.iter().enumerate() {
        let column = validate_ident(&order.column)?;
        builder.push(if i == 0 { " ORDER BY " } else { ", " });
        builder.push("t.").push(column);
        builder.push(match order.direction {
            Direction::Asc => " ASC NULLS LAST",
            Direction::Desc => " DESC NULLS LAST",
        });
    }

    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }

    Ok(builder)
}

#[async_trait]
impl Backend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        let mut builder = build_select(query)?;
        let values: Vec<Value> = builder
            .build_query_scalar::<Value>()
            .fetch_all(&self.pool)
            .await?;

        let rows = values
            .into_iter()
            .map(|value| match value {
                Value::Object(row) => Ok(row),
                other => Err(BackendError::InvalidResponse(format!(
                    "expected row object, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<Row>, _>>()?;

        ensure_single(query, rows, || {
            BackendError::Database(sqlx::Error::RowNotFound)
        })
    }

    async fn health_check(&self) -> Result<Duration, BackendError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }
}
