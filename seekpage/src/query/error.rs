//! Request-time query errors
//!
//! Every rejection names the offending token so clients can see what to fix.
//! All of them are raised before any storage call is made.

use std::fmt;

use thiserror::Error;

use super::FilterOperator;

/// Broad category of a [`QueryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    /// Malformed or out-of-whitelist request parameters
    Validation,
    /// Tampered, corrupted or replayed cursor token
    Token,
    /// The engine or its storage collaborator broke an invariant
    Internal,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Token => write!(f, "token"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// A rejected list request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown or unsortable sort field '{field}'")]
    InvalidSortField { field: String },

    #[error("invalid sort syntax near '{token}'")]
    InvalidSortSyntax { token: String },

    #[error("unknown or unfilterable filter field '{field}'")]
    InvalidFilterField { field: String },

    #[error("operator {operator} is not allowed for filter field '{field}'")]
    InvalidFilterOperator {
        field: String,
        operator: FilterOperator,
    },

    #[error("invalid value {value} for filter field '{field}'")]
    InvalidFilterValue { field: String, value: String },

    #[error("invalid filter syntax near '{token}'")]
    InvalidFilterSyntax { token: String },

    #[error("unknown or unselectable field '{field}'")]
    InvalidProjectionField { field: String },

    #[error("invalid limit '{value}'")]
    InvalidLimit { value: String },

    #[error("next_token and prev_token are mutually exclusive")]
    ConflictingTokens,

    #[error("invalid pagination token")]
    InvalidToken,

    #[error("pagination token does not match the current sort or filter")]
    StaleToken,

    /// A fetched row lacks a sort column, so no boundary can be taken from it
    #[error("fetched row is missing sort column '{field}'")]
    IncompleteRow { field: String },

    /// A fetched sort column holds a value of the wrong type for its field
    #[error("fetched sort column '{field}' does not hold a {expected} value")]
    RowTypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("failed to encode pagination token: {message}")]
    TokenEncoding { message: String },
}

impl QueryError {
    /// Stable machine-readable code for API responses
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSortField { .. } => "INVALID_SORT_FIELD",
            Self::InvalidSortSyntax { .. } => "INVALID_SORT_SYNTAX",
            Self::InvalidFilterField { .. } => "INVALID_FILTER_FIELD",
            Self::InvalidFilterOperator { .. } => "INVALID_FILTER_OPERATOR",
            Self::InvalidFilterValue { .. } => "INVALID_FILTER_VALUE",
            Self::InvalidFilterSyntax { .. } => "INVALID_FILTER_SYNTAX",
            Self::InvalidProjectionField { .. } => "INVALID_PROJECTION_FIELD",
            Self::InvalidLimit { .. } => "INVALID_LIMIT",
            Self::ConflictingTokens => "CONFLICTING_TOKENS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::StaleToken => "STALE_TOKEN",
            Self::IncompleteRow { .. } => "INCOMPLETE_ROW",
            Self::RowTypeMismatch { .. } => "ROW_TYPE_MISMATCH",
            Self::TokenEncoding { .. } => "TOKEN_ENCODING",
        }
    }

    #[must_use]
    pub const fn kind(&self) -> QueryErrorKind {
        match self {
            Self::InvalidToken | Self::StaleToken => QueryErrorKind::Token,
            Self::IncompleteRow { .. }
            | Self::RowTypeMismatch { .. }
            | Self::TokenEncoding { .. } => QueryErrorKind::Internal,
            _ => QueryErrorKind::Validation,
        }
    }

    /// HTTP status the error maps to: client errors are 400, internal ones 500
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self.kind() {
            QueryErrorKind::Validation | QueryErrorKind::Token => 400,
            QueryErrorKind::Internal => 500,
        }
    }

    /// Whether the client caused the error
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self.kind(), QueryErrorKind::Internal)
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for QueryError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status())
            .unwrap_or(axum::http::StatusCode::BAD_REQUEST);
        if self.is_client_error() {
            tracing::debug!(code = self.code(), "Rejected list request: {}", self);
        } else {
            tracing::error!(code = self.code(), "List request failed: {}", self);
        }
        let body = crate::error::ErrorResponse::with_code(self.status(), self.code(), self.to_string());
        (status, axum::Json(body)).into_response()
    }
}
