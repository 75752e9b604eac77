//! Request parameter parsing and validation
//!
//! Turns the untrusted `sort`, `filter`, `fields` and `limit` values of a list
//! request into typed structures, each checked against an entity's
//! [`FieldRegistry`](crate::registry::FieldRegistry).

mod error;
mod filter;
mod params;
mod projection;
mod sort;
mod value;

pub use error::{QueryError, QueryErrorKind};
pub use filter::{
    parse_filter, Clause, FilterExpression, FilterOperator, MAX_FILTER_CLAUSES, MAX_FILTER_LEN,
};
pub use params::ListParams;
pub use projection::{parse_projection, Projection};
pub use sort::{parse_sort, SortDirection, SortKey, SortSpec};
pub use value::{Row, Value};

pub(crate) use sort::parse_sort_terms;
