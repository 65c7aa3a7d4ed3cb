//! Backend adapters - the managed data store the content layer reads from.
//!
//! The content layer only ever talks to [`Backend`]. A query names a table,
//! a set of equality filters and an ordering; rows come back as JSON objects
//! and are mapped into typed records by `content::mappers`.

pub mod memory;
pub mod postgres;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::BackendConfig;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;
pub use rest::RestBackend;

/// A raw backend row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// PostgREST error code for "single object requested, zero (or many) rows returned".
pub const POSTGREST_NO_ROWS: &str = "PGRST116";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by a backend adapter.
///
/// These carry backend-specific detail; the content layer normalizes them
/// into `ContentError` before anything reaches a caller.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Error from the direct database adapter.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backend answered, but not with rows.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The query itself was rejected before being sent.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl BackendError {
    /// The backend-specific error identifier, when the backend supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// Query description
// ============================================================================

/// A scalar filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FilterValue {
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Bool(b) => Value::Bool(*b),
            FilterValue::Int(n) => Value::from(*n),
            FilterValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq { column: String, value: FilterValue },
    /// `column IN (values)`; an empty list matches nothing.
    In {
        column: String,
        values: Vec<FilterValue>,
    },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq { column, .. } | Filter::In { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One ordering key. Nulls always sort last, whichever the direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A read against a single table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub ordering: Vec<Order>,
    pub limit: Option<usize>,
    /// Expect exactly one row. Zero rows is reported as the adapter's
    /// native "not found" error rather than an empty result.
    pub single: bool,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            single: false,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn in_list<V: Into<FilterValue>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.ordering.push(Order {
            column: column.into(),
            direction: Direction::Asc,
        });
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.ordering.push(Order {
            column: column.into(),
            direction: Direction::Desc,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }
}

// ============================================================================
// Adapter trait
// ============================================================================

/// A managed relational store reachable by the content layer.
///
/// Implementations own their credentials and connection lifecycle.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short adapter name used in logs.
    fn name(&self) -> &'static str;

    /// Run a read query and return the matching rows in the requested order.
    async fn query(&self, query: &Query) -> Result<Vec<Row>, BackendError>;

    /// Round-trip the backend and report the latency.
    async fn health_check(&self) -> Result<Duration, BackendError>;
}

/// Build the configured backend adapter.
pub async fn connect(config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
    match config {
        BackendConfig::Rest(rest) => {
            tracing::info!(url = %rest.url, "Using REST content backend");
            Ok(Arc::new(RestBackend::new(rest)?))
        }
        BackendConfig::Postgres(db) => {
            let backend = PgBackend::connect(db).await?;
            if db.run_migrations {
                backend.run_migrations().await?;
            }
            Ok(Arc::new(backend))
        }
        BackendConfig::Memory => {
            tracing::warn!("No content backend configured. Serving from an empty in-memory store.");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

/// The "no rows" error PostgREST raises for a single-object request.
pub(crate) fn postgrest_no_rows(table: &str) -> BackendError {
    BackendError::Api {
        status: 406,
        code: Some(POSTGREST_NO_ROWS.to_string()),
        message: format!("JSON object requested, no rows returned from '{}'", table),
    }
}

/// Enforce single-row mode on a result set.
///
/// Zero rows is the adapter's own "not found" error; more than one row is an
/// invalid response in every adapter.
pub(crate) fn ensure_single<F>(
    query: &Query,
    rows: Vec<Row>,
    not_found: F,
) -> Result<Vec<Row>, BackendError>
where
    F: FnOnce() -> BackendError,
{
    if !query.single {
        return Ok(rows);
    }
    match rows.len() {
        0 => Err(not_found()),
        1 => Ok(rows),
        n => Err(BackendError::InvalidResponse(format!(
            "expected one row from '{}', got {}",
            query.table, n
        ))),
    }
}

lazy_static::lazy_static! {
    /// Table and column names accepted by the adapters.
    static ref IDENT_REGEX: regex::Regex = regex::Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
}

/// Reject identifiers that could not be spliced into a query safely.
pub(crate) fn validate_ident(ident: &str) -> Result<&str, BackendError> {
    if IDENT_REGEX.is_match(ident) {
        Ok(ident)
    } else {
        Err(BackendError::InvalidQuery(format!(
            "invalid identifier '{}'",
            ident
        )))
    }
}
