//! In-process backend. Backs the test suite and local runs without a
//! configured store; mirrors the PostgREST semantics the other adapters honor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{
    ensure_single, postgrest_no_rows, validate_ident, Backend, BackendError, Direction, Filter,
    Order, Query, Row,
};
use crate::content::mappers::parse_timestamp;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to a table. Non-object values are ignored.
    pub async fn insert(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables
                .write()
                .await
                .entry(table.to_string())
                .or_default()
                .push(row);
        }
    }

    pub async fn insert_many(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        for row in rows {
            self.insert(table, row).await;
        }
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq { value, .. } => *cell == value.to_json(),
        Filter::In { values, .. } => values.iter().any(|v| *cell == v.to_json()),
    }
}

/// Timestamps are compared as instants, in any form the mappers accept.
fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_timestamp)
}

/// Compare two non-null cells of the same column.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => {
            match (as_timestamp(a), as_timestamp(b)) {
                (Some(ta), Some(tb)) => ta.cmp(&tb),
                _ => x.cmp(y),
            }
        }
        _ => Ordering::Equal,
    }
}

fn compare_rows(a: &Row, b: &Row, ordering: &[Order]) -> Ordering {
    for order in ordering {
        let left = a.get(&order.column).unwrap_or(&Value::Null);
        let right = b.get(&order.column).unwrap_or(&Value::Null);
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = compare_values(left, right);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        validate_ident(&query.table)?;
        for filter in &query.filters {
            validate_ident(filter.column())?;
        }
        for order in &query.ordering {
            validate_ident(&order.column)?;
        }

        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| compare_rows(a, b, &query.ordering));

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        ensure_single(query, rows, || postgrest_no_rows(&query.table))
    }

    async fn health_check(&self) -> Result<Duration, BackendError> {
        Ok(Duration::ZERO)
    }
}
