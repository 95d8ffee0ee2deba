use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Caller-visible error types.
///
/// Per-provider failures never show up here; they are absorbed into
/// [`crate::models::SourceOutcome`] entries by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Identifier is not a 14-digit CNPJ. No provider was called.
    InvalidIdentifier(String),
    /// Name query shorter than the minimum length.
    QueryTooShort {
        /// Minimum accepted length, in characters.
        min: usize,
        /// Length of the trimmed query that was received.
        actual: usize,
    },
    /// No structured provider returned data for the identifier.
    NotFound(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidIdentifier(raw) => {
                write!(f, "Invalid identifier: '{}' (CNPJ must have 14 digits)", raw)
            }
            AppError::QueryTooShort { min, actual } => write!(
                f,
                "Query too short: {} character(s), at least {} required",
                actual, min
            ),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidIdentifier(_) | AppError::QueryTooShort { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let error_message = match &self {
            AppError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
