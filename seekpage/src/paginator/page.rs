//! Paginated results

use serde::Serialize;

use crate::query::Row;

/// One page of rows in the sort's nominal order
///
/// `next_token`/`prev_token` are opaque; pass them back unchanged as the
/// `next_token`/`prev_token` request parameters.
///
/// A token is only present when the page has a row to anchor it. An empty page
/// reached through a cursor keeps the flag for the side the cursor came from
/// (`has_next` for a `prev_token`, `has_prev` for a `next_token`) but carries no
/// token for it; the client navigates back with the token it already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub rows: Vec<Row>,
    pub has_next: bool,
    pub has_prev: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_token: Option<String>,
}

impl Page {
    /// A page with no rows and no neighbours
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            has_next: false,
            has_prev: false,
            next_token: None,
            prev_token: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for Page {
    fn into_response(self) -> axum::response::Response {
        (axum::http::StatusCode::OK, axum::Json(self)).into_response()
    }
}
