//! Error normalization.
//!
//! Adapter errors are folded into three kinds. Only `NotFound` is expected;
//! the other two are logged by the query functions before being returned.

use thiserror::Error;

use crate::backend::{BackendError, POSTGREST_NO_ROWS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// The requested row does not exist.
    #[error("record not found")]
    NotFound,

    /// Query, network or auth failure in the backend.
    #[error("backend failure: {message}")]
    BackendFailure { message: String },

    /// A row was returned but could not be mapped into a record.
    #[error("malformed {entity} record: {reason}")]
    MalformedRecord { entity: &'static str, reason: String },
}

impl ContentError {
    pub fn from_backend(err: BackendError) -> Self {
        match err {
            BackendError::Api { code: Some(ref code), .. } if code == POSTGREST_NO_ROWS => {
                ContentError::NotFound
            }
            BackendError::Database(sqlx::Error::RowNotFound) => ContentError::NotFound,
            other => ContentError::BackendFailure {
                message: other.to_string(),
            },
        }
    }

    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentError::NotFound => "not_found",
            ContentError::BackendFailure { .. } => "backend_failure",
            ContentError::MalformedRecord { .. } => "malformed_record",
        }
    }
}

impl From<BackendError> for ContentError {
    fn from(err: BackendError) -> Self {
        ContentError::from_backend(err)
    }
}
