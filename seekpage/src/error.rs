//! Error types and HTTP response conversion

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::QueryError;
use crate::registry::RegistryError;

/// Result type alias for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or extracted
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// A configured entity registry is inconsistent
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A list request was rejected
    #[error(transparent)]
    Query(#[from] QueryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

/// JSON body of an error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status,
        }
    }

    /// Create error response with a code
    pub fn with_code(status: u16, code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status,
        }
    }
}

impl From<&QueryError> for ErrorResponse {
    fn from(err: &QueryError) -> Self {
        Self::with_code(err.status(), err.code(), err.to_string())
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, body) = match self {
            Error::Query(e) => return e.into_response(),
            Error::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(500, "CONFIG_ERROR", "Service misconfigured"),
                )
            }
            Error::Registry(e) => {
                tracing::error!("Registry error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(500, "REGISTRY_ERROR", "Service misconfigured"),
                )
            }
            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(500, "IO_ERROR", "I/O operation failed"),
                )
            }
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(500, "INTERNAL_ERROR", "Internal server error"),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
