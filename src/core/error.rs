//! Typed error handling for recordkit
//!
//! Every adapter reports failures through [`StoreError`], so callers can
//! match on the error kind regardless of which backend produced it.
//!
//! # Error Categories
//!
//! - [`StoreError::NotFound`]: the referenced table or record is absent
//! - [`StoreError::Io`]: the underlying storage failed (permissions, disk, ...)
//! - [`StoreError::Serialization`]: a record could not be encoded or decoded
//! - [`StoreError::InvalidQuery`] / [`StoreError::InvalidName`]: rejected input
//! - [`StoreError::Transport`] / [`StoreError::Status`]: HTTP adapter failures
//!
//! # Example
//!
//! ```rust,ignore
//! match adapter.find(FindProps::new("users", id)).await {
//!     Ok(user) => println!("Found: {:?}", user),
//!     Err(StoreError::NotFound { table, id }) => println!("{}/{} is gone", table, id),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// The main error type for every adapter
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table or the record does not exist
    #[error("record '{id}' not found in table '{table}'")]
    NotFound { table: String, id: String },

    /// The storage medium failed
    #[error("storage failure while trying to {operation} '{path}': {message}")]
    Io {
        operation: &'static str,
        path: String,
        message: String,
    },

    /// A record could not be serialized or deserialized
    #[error("failed to serialize/deserialize record: {message}")]
    Serialization { message: String },

    /// The query object is structurally malformed
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    /// A table name or record id is not a single safe path segment
    #[error("invalid {kind} '{value}'")]
    InvalidName { kind: &'static str, value: String },

    /// The HTTP transport failed or the response body was unreadable
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The remote server answered with a non-success status
    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },

    /// Configuration could not be loaded
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Should not happen in normal operation
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StoreError {
    /// Build a `NotFound` error for `table`/`id`
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Build an `InvalidQuery` error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        StoreError::InvalidQuery {
            message: message.into(),
        }
    }

    /// Classify an I/O error raised while touching `path`
    ///
    /// `ErrorKind::NotFound` on a record path means the record is gone, so it
    /// becomes [`StoreError::NotFound`] instead of an I/O failure.
    pub fn from_io(
        err: std::io::Error,
        operation: &'static str,
        path: &std::path::Path,
        table: &str,
        id: &str,
    ) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::not_found(table, id)
        } else {
            StoreError::Io {
                operation,
                path: path.display().to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Check whether this error reports a missing table or record
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            StoreError::InvalidName { .. } => StatusCode::BAD_REQUEST,
            StoreError::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            StoreError::Transport { .. } => StatusCode::BAD_GATEWAY,
            StoreError::Io { .. }
            | StoreError::Serialization { .. }
            | StoreError::Config { .. }
            | StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "RECORD_NOT_FOUND",
            StoreError::Io { .. } => "IO_FAILURE",
            StoreError::Serialization { .. } => "SERIALIZATION_ERROR",
            StoreError::InvalidQuery { .. } => "INVALID_QUERY",
            StoreError::InvalidName { .. } => "INVALID_NAME",
            StoreError::Transport { .. } => "TRANSPORT_FAILURE",
            StoreError::Status { .. } => "UPSTREAM_STATUS",
            StoreError::Config { .. } => "CONFIG_ERROR",
            StoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            StoreError::NotFound { table, id } => Some(serde_json::json!({
                "table": table,
                "id": id,
            })),
            StoreError::InvalidName { kind, value } => Some(serde_json::json!({
                "kind": kind,
                "value": value,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport {
            message: err.to_string(),
        }
    }
}

/// A specialized Result type for recordkit operations
pub type StoreResult<T> = Result<T, StoreError>;
