//! Raw list-request parameters
//!
//! [`ListParams`] holds the untrusted query-string values exactly as the HTTP
//! layer received them. Nothing here is validated until the paginator runs it
//! through the registry-aware parsers; the only interpretation done in this
//! module is page-size clamping and cursor selection.
//!
//! # Example
//!
//! ```rust
//! use seekpage::query::ListParams;
//!
//! let params = ListParams::new()
//!     .with_sort("created_at DESC")
//!     .with_filter("status = 'active'")
//!     .with_limit("500");
//!
//! assert_eq!(params.effective_limit(20, 100).unwrap(), 100);
//! ```

use serde::{Deserialize, Serialize};

use super::QueryError;
use crate::cursor::NavDirection;

/// Query-string values of a list request
///
/// Deserializes directly from a query string (`axum::extract::Query<ListParams>`).
/// Every field is kept as text so that malformed values reach the validators
/// and are reported with a precise error rather than a generic extractor
/// rejection.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Sort terms, e.g. `first_name DESC, created_at ASC`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    /// Filter expression, e.g. `status = 'active' AND age > 18`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Comma-separated projection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,

    /// Requested page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,

    /// Cursor for the page after the one that issued it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,

    /// Cursor for the page before the one that issued it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_token: Option<String>,
}

impl ListParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: impl ToString) -> Self {
        self.limit = Some(limit.to_string());
        self
    }

    #[must_use]
    pub fn with_next_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_prev_token(mut self, token: impl Into<String>) -> Self {
        self.prev_token = Some(token.into());
        self
    }

    /// Page size after defaults and clamping
    ///
    /// Absent, empty or zero means `default_limit`; anything above `max_limit`
    /// (including values too large to represent) is clamped to it. Negative or
    /// non-numeric values are rejected.
    ///
    /// ```rust
    /// use seekpage::query::{ListParams, QueryError};
    ///
    /// assert_eq!(ListParams::new().effective_limit(20, 100), Ok(20));
    /// assert_eq!(ListParams::new().with_limit(0).effective_limit(20, 100), Ok(20));
    /// assert_eq!(ListParams::new().with_limit(1100).effective_limit(20, 100), Ok(100));
    /// assert!(matches!(
    ///     ListParams::new().with_limit(-1).effective_limit(20, 100),
    ///     Err(QueryError::InvalidLimit { .. })
    /// ));
    /// ```
    pub fn effective_limit(&self, default_limit: u32, max_limit: u32) -> Result<u32, QueryError> {
        let Some(raw) = self.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(default_limit);
        };

        let digits = raw.strip_prefix('+').unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QueryError::InvalidLimit {
                value: raw.to_string(),
            });
        }

        match digits.parse::<u64>() {
            Ok(0) => Ok(default_limit),
            Ok(n) => Ok(u32::try_from(n).map_or(max_limit, |n| n.min(max_limit))),
            Err(_) => Ok(max_limit),
        }
    }

    /// The supplied cursor and the direction it navigates
    ///
    /// Empty token strings count as absent.
    pub fn cursor(&self) -> Result<Option<(NavDirection, &str)>, QueryError> {
        let next = self.next_token.as_deref().filter(|t| !t.is_empty());
        let prev = self.prev_token.as_deref().filter(|t| !t.is_empty());
        match (next, prev) {
            (Some(_), Some(_)) => Err(QueryError::ConflictingTokens),
            (Some(token), None) => Ok(Some((NavDirection::Forward, token))),
            (None, Some(token)) => Ok(Some((NavDirection::Backward, token))),
            (None, None) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults() {
        assert_eq!(ListParams::new().effective_limit(20, 100), Ok(20));
        assert_eq!(ListParams::new().with_limit("").effective_limit(20, 100), Ok(20));
        assert_eq!(ListParams::new().with_limit(0).effective_limit(20, 100), Ok(20));
        assert_eq!(ListParams::new().with_limit("000").effective_limit(20, 100), Ok(20));
    }

    #[test]
    fn test_limit_within_range() {
        assert_eq!(ListParams::new().with_limit(1).effective_limit(20, 100), Ok(1));
        assert_eq!(ListParams::new().with_limit(" 50 ").effective_limit(20, 100), Ok(50));
        assert_eq!(ListParams::new().with_limit("+7").effective_limit(20, 100), Ok(7));
    }

    #[test]
    fn test_limit_clamps_to_max() {
        assert_eq!(ListParams::new().with_limit(1100).effective_limit(20, 100), Ok(100));
        assert_eq!(
            ListParams::new()
                .with_limit("99999999999999999999999")
                .effective_limit(20, 100),
            Ok(100)
        );
    }

    #[test]
    fn test_limit_rejects_negative_and_garbage() {
        for raw in ["-1", "ten", "1.5", "+", "5 0"] {
            assert_eq!(
                ListParams::new().with_limit(raw).effective_limit(20, 100),
                Err(QueryError::InvalidLimit {
                    value: raw.to_string()
                }),
                "limit {raw:?}"
            );
        }
    }

    #[test]
    fn test_cursor_selection() {
        assert_eq!(ListParams::new().cursor(), Ok(None));
        assert_eq!(
            ListParams::new().with_next_token("abc").cursor(),
            Ok(Some((NavDirection::Forward, "abc")))
        );
        assert_eq!(
            ListParams::new().with_prev_token("xyz").cursor(),
            Ok(Some((NavDirection::Backward, "xyz")))
        );
        assert_eq!(
            ListParams::new()
                .with_next_token("")
                .with_prev_token("xyz")
                .cursor(),
            Ok(Some((NavDirection::Backward, "xyz")))
        );
    }

    #[test]
    fn test_both_tokens_conflict() {
        let params = ListParams::new().with_next_token("a").with_prev_token("b");
        assert_eq!(params.cursor(), Err(QueryError::ConflictingTokens));
    }

    #[test]
    fn test_deserializes_from_query_string_shape() {
        let params: ListParams =
            serde_json::from_str(r#"{"sort":"age DESC","limit":"10","next_token":"t"}"#).unwrap();
        assert_eq!(params.sort.as_deref(), Some("age DESC"));
        assert_eq!(params.limit.as_deref(), Some("10"));
        assert!(params.filter.is_none());
    }
}
