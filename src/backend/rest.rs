//! PostgREST / Supabase-style HTTP backend.
//!
//! Reads go to `{base}/rest/v1/{table}` with the filter, order and limit
//! encoded in the query string, authenticated with the project API key.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{
    ensure_single, postgrest_no_rows, validate_ident, Backend, BackendError, Direction, Filter,
    FilterValue, Query, Row,
};
use crate::config::RestConfig;

pub struct RestBackend {
    client: Client,
    base_url: Url,
    api_key: String,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl RestBackend {
    pub fn new(config: &RestConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&format!("{}/rest/v1/", config.url.trim_end_matches('/')))
            .map_err(|e| BackendError::InvalidQuery(format!("invalid backend url: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Build the request URL for a query.
    pub fn query_url(&self, query: &Query) -> Result<Url, BackendError> {
        let mut url = self
            .base_url
            .join(validate_ident(&query.table)?)
            .map_err(|e| BackendError::InvalidQuery(e.to_string()))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");

            for filter in &query.filters {
                let column = validate_ident(filter.column())?;
                let operand = match filter {
                    Filter::Eq { value, .. } => format!("eq.{}", operand_text(value)),
                    Filter::In { values, .. } => {
                        let list: Vec<String> = values.iter().map(quoted_operand).collect();
                        format!("in.({})", list.join(","))
                    }
                };
                pairs.append_pair(column, &operand);
            }

            if !query.ordering.is_empty() {
                let mut keys = Vec::with_capacity(query.ordering.len());
                for order in &query.ordering {
                    let direction = match order.direction {
                        Direction::Asc => "asc",
                        Direction::Desc => "desc",
                    };
                    keys.push(format!(
                        "{}.{}.nullslast",
                        validate_ident(&order.column)?,
                        direction
                    ));
                }
                pairs.append_pair("order", &keys.join(","));
            }

            // Single-row reads fetch at most two rows so "many" can be told
            // apart from "one" without pulling the whole table.
            let limit = match (query.single, query.limit) {
                (true, Some(limit)) => Some(limit.min(2)),
                (true, None) => Some(2),
                (false, limit) => limit,
            };
            if let Some(limit) = limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }

        Ok(url)
    }
}

fn operand_text(value: &FilterValue) -> String {
    match value {
        FilterValue::Bool(b) => b.to_string(),
        FilterValue::Int(n) => n.to_string(),
        FilterValue::Text(s) => s.clone(),
    }
}

/// Operands inside `in.(...)` are double-quoted when they contain
/// PostgREST reserved characters.
fn quoted_operand(value: &FilterValue) -> String {
    let text = operand_text(value);
    if text.contains([',', '.', ':', '(', ')', '"', '\\', ' ']) {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text
    }
}

/// Turn a non-success response into a `BackendError::Api`.
fn api_error(status: StatusCode, body: &str) -> BackendError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => {
            let mut message = parsed
                .message
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            if let Some(details) = parsed.details {
                message = format!("{} ({})", message, details);
            }
            BackendError::Api {
                status: status.as_u16(),
                code: parsed.code,
                message,
            }
        }
        Err(_) => BackendError::Api {
            status: status.as_u16(),
            code: None,
            message: body.chars().take(200).collect(),
        },
    }
}

/// Normalize a success body into rows. Single-object responses are a bare object.
fn rows_from_body(body: Value) -> Result<Vec<Row>, BackendError> {
    match body {
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(BackendError::InvalidResponse(format!(
                    "expected row object, got {}",
                    other
                ))),
            })
            .collect(),
        other => Err(BackendError::InvalidResponse(format!(
            "expected row array, got {}",
            other
        ))),
    }
}

#[async_trait]
impl Backend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        let url = self.query_url(query)?;

        tracing::debug!(table = %query.table, single = query.single, "backend query");

        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body: Value = response.json().await?;
        ensure_single(query, rows_from_body(body)?, || {
            postgrest_no_rows(&query.table)
        })
    }

    async fn health_check(&self) -> Result<Duration, BackendError> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.base_url.clone())
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        Ok(start.elapsed())
    }
}
