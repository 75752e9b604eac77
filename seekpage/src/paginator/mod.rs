//! Keyset pagination
//!
//! The [`Paginator`] runs one list request through a fixed sequence:
//!
//! 1. validate `sort`, `filter`, `fields` and `limit` against the entity's registry,
//! 2. decode the `next_token` or `prev_token`, if any,
//! 3. assemble a [`QueryDescriptor`] with the seek predicate,
//! 4. fetch `limit + 1` rows from a [`PageSource`],
//! 5. trim the page and mint the next and previous tokens from its edge rows.
//!
//! Nothing is kept between requests. Tokens are derived purely from row values,
//! so concurrent requests against overlapping boundaries need no coordination.
//!
//! # Example
//!
//! ```rust
//! use seekpage::cursor::CursorCodec;
//! use seekpage::memory::MemorySource;
//! use seekpage::paginator::Paginator;
//! use seekpage::query::{ListParams, Row, Value};
//! use seekpage::registry::{FieldDef, FieldRegistry, FieldType};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = FieldRegistry::builder("projects")
//!     .field(FieldDef::new("id", FieldType::Integer).sortable())
//!     .build()
//!     .unwrap();
//! let codec = CursorCodec::new("secret");
//! let source = MemorySource::new(
//!     (1..=5)
//!         .map(|n| Row::from([("id".to_string(), Value::Integer(n))]))
//!         .collect(),
//! );
//!
//! let paginator = Paginator::new(&registry, &codec);
//! let cancel = CancellationToken::new();
//!
//! let first = paginator
//!     .paginate(&source, &ListParams::new().with_limit(2), &cancel)
//!     .await
//!     .unwrap();
//! assert_eq!(first.len(), 2);
//! assert!(first.has_next);
//!
//! let params = ListParams::new()
//!     .with_limit(2)
//!     .with_next_token(first.next_token.unwrap());
//! let second = paginator.paginate(&source, &params, &cancel).await.unwrap();
//! assert_eq!(second.rows[0]["id"], Value::Integer(3));
//! # }
//! ```

mod descriptor;
mod page;
mod predicate;
mod source;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cursor::{Boundary, CursorCodec, Fingerprint, NavDirection};
use crate::query::{
    parse_filter, parse_projection, parse_sort, ListParams, QueryError, QueryErrorKind, Row,
    SortSpec,
};
use crate::registry::{FieldRegistry, FieldType};

pub use descriptor::QueryDescriptor;
pub use page::Page;
pub use predicate::Predicate;
pub use source::PageSource;

/// Failure of a complete pagination round trip
#[derive(Debug, Error)]
pub enum PageError<E> {
    /// The request was rejected, or the fetched rows could not be turned into a page
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The storage collaborator failed; its error is passed through unchanged
    #[error(transparent)]
    Storage(E),

    /// The caller cancelled before storage answered
    #[error("list request cancelled")]
    Cancelled,
}

/// Runs list requests for one entity
#[derive(Debug, Clone, Copy)]
pub struct Paginator<'a> {
    registry: &'a FieldRegistry,
    codec: &'a CursorCodec,
}

impl<'a> Paginator<'a> {
    pub fn new(registry: &'a FieldRegistry, codec: &'a CursorCodec) -> Self {
        Self { registry, codec }
    }

    /// Validate a request and decode its cursor
    ///
    /// Every rejection happens here, before any storage call.
    pub fn prepare(&self, params: &ListParams) -> Result<QueryDescriptor, QueryError> {
        self.build_descriptor(params).inspect_err(|e| {
            if e.kind() == QueryErrorKind::Validation {
                tracing::debug!(
                    entity = %self.registry.entity(),
                    code = e.code(),
                    "Rejected list request: {}", e
                );
            }
        })
    }

    fn build_descriptor(&self, params: &ListParams) -> Result<QueryDescriptor, QueryError> {
        let registry = self.registry;

        let limit = params.effective_limit(registry.default_limit(), registry.max_limit())?;
        let sort = parse_sort(params.sort.as_deref().unwrap_or_default(), registry)?;
        let filter = parse_filter(params.filter.as_deref().unwrap_or_default(), registry)?;
        let projection = parse_projection(params.fields.as_deref().unwrap_or_default(), registry)?;
        let cursor = params.cursor()?;

        let fingerprint = Fingerprint::compute(registry.entity(), &sort, filter.as_ref());

        let (direction, boundary) = match cursor {
            None => (NavDirection::Forward, None),
            Some((direction, token)) => {
                let boundary = self.codec.decode(token, direction, &fingerprint)?;
                self.check_boundary(&boundary, &sort)?;
                (direction, Some(boundary))
            }
        };

        Ok(QueryDescriptor {
            entity: registry.entity().to_string(),
            sort,
            direction,
            filter,
            boundary,
            projection,
            limit,
            fingerprint,
        })
    }

    /// A boundary must name exactly the sort columns, in order, with values of their types
    fn check_boundary(&self, boundary: &Boundary, sort: &SortSpec) -> Result<(), QueryError> {
        let consistent = boundary.keys.len() == sort.keys().len()
            && boundary
                .keys
                .iter()
                .zip(sort.keys())
                .all(|((field, value), key)| {
                    *field == key.field
                        && self
                            .registry
                            .sortable(field)
                            .is_some_and(|ty| ty.accepts(value))
                });

        if consistent {
            Ok(())
        } else {
            tracing::warn!(
                entity = %self.registry.entity(),
                "Rejected pagination token whose keys do not match the sort"
            );
            Err(QueryError::InvalidToken)
        }
    }

    /// Turn the rows storage returned for `descriptor` into a page
    ///
    /// `rows` must be in fetch order and hold at most `limit + 1` entries.
    pub fn finish(&self, descriptor: &QueryDescriptor, mut rows: Vec<Row>) -> Result<Page, QueryError> {
        let limit = descriptor.limit as usize;
        let has_extra = rows.len() > limit;
        rows.truncate(limit);

        let has_boundary = descriptor.boundary.is_some();
        let (has_next, has_prev) = match descriptor.direction {
            NavDirection::Forward => (has_extra, has_boundary),
            NavDirection::Backward => {
                rows.reverse();
                (has_boundary, has_extra)
            }
        };

        let next_token = match rows.last() {
            Some(row) if has_next => Some(self.token(descriptor, row, NavDirection::Forward)?),
            _ => None,
        };
        let prev_token = match rows.first() {
            Some(row) if has_prev => Some(self.token(descriptor, row, NavDirection::Backward)?),
            _ => None,
        };

        let projection = descriptor.projection.fields();
        for row in &mut rows {
            row.retain(|column, _| projection.iter().any(|f| f == column));
        }

        tracing::debug!(
            entity = %descriptor.entity,
            direction = %descriptor.direction,
            rows = rows.len(),
            has_next,
            has_prev,
            "Built page"
        );

        Ok(Page {
            rows,
            has_next,
            has_prev,
            next_token,
            prev_token,
        })
    }

    fn token(
        &self,
        descriptor: &QueryDescriptor,
        row: &Row,
        direction: NavDirection,
    ) -> Result<String, QueryError> {
        let keys = descriptor
            .sort
            .keys()
            .iter()
            .map(|key| {
                let value = row.get(&key.field).ok_or_else(|| QueryError::IncompleteRow {
                    field: key.field.clone(),
                })?;
                match self.registry.sortable(&key.field) {
                    Some(ty) if ty.accepts(value) => Ok((key.field.clone(), value.clone())),
                    ty => Err(QueryError::RowTypeMismatch {
                        field: key.field.clone(),
                        expected: ty.map_or("sortable", FieldType::name),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let boundary = Boundary::new(descriptor.fingerprint.clone(), direction, keys);
        self.codec.encode(&boundary)
    }

    /// Validate, fetch and assemble one page
    ///
    /// The fetch is raced against `cancel`; a cancelled request returns
    /// [`PageError::Cancelled`] and produces no page.
    #[tracing::instrument(skip_all, fields(entity = %self.registry.entity()))]
    pub async fn paginate<S: PageSource>(
        &self,
        source: &S,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<Page, PageError<S::Error>> {
        let descriptor = self.prepare(params)?;

        let rows = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::debug!("List request cancelled");
                return Err(PageError::Cancelled);
            }
            result = source.fetch(&descriptor, cancel) => {
                result.map_err(|e| {
                    tracing::error!(error = %e, "Storage fetch failed");
                    PageError::Storage(e)
                })?
            }
        };

        Ok(self.finish(&descriptor, rows)?)
    }
}
