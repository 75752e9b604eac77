//! Storage collaborator contract

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::QueryDescriptor;
use crate::query::Row;

/// Something that can return rows for a [`QueryDescriptor`]
///
/// Implementations must:
///
/// - return at most [`fetch_limit`](QueryDescriptor::fetch_limit) rows,
/// - order them by [`fetch_order`](QueryDescriptor::fetch_order),
/// - keep only rows matching [`predicate`](QueryDescriptor::predicate), binding
///   every value as a parameter,
/// - include at least the [`fetch_columns`](QueryDescriptor::fetch_columns).
///
/// Errors are surfaced to the caller unchanged; retry policy, if any, belongs
/// to the implementation. The cancellation token is the caller's; long-running
/// implementations may watch it, and the paginator also stops waiting on it.
///
/// # Example
///
/// ```rust,ignore
/// struct UserStore { pool: PgPool }
///
/// impl PageSource for UserStore {
///     type Error = sqlx::Error;
///
///     async fn fetch(
///         &self,
///         descriptor: &QueryDescriptor,
///         _cancel: &CancellationToken,
///     ) -> Result<Vec<Row>, sqlx::Error> {
///         let statement = render_select(descriptor, "users");
///         // execute and decode
///         todo!()
///     }
/// }
/// ```
pub trait PageSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch(
        &self,
        descriptor: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send;
}
