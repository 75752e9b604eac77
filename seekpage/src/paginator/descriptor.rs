//! The validated request handed to storage

use serde::Serialize;

use super::Predicate;
use crate::cursor::{Boundary, Fingerprint, NavDirection};
use crate::query::{FilterExpression, Projection, SortSpec, Value};

/// Fully validated list request
///
/// Built only by [`Paginator::prepare`](super::Paginator::prepare); it carries
/// no raw request text. When a boundary is present its keys line up one to one
/// with the sort keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDescriptor {
    pub(crate) entity: String,
    pub(crate) sort: SortSpec,
    pub(crate) direction: NavDirection,
    pub(crate) filter: Option<FilterExpression>,
    pub(crate) boundary: Option<Boundary>,
    pub(crate) projection: Projection,
    pub(crate) limit: u32,
    pub(crate) fingerprint: Fingerprint,
}

impl QueryDescriptor {
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Requested (nominal) order of the returned page
    #[must_use]
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// Direction of navigation; `Forward` for a first page
    #[must_use]
    pub const fn direction(&self) -> NavDirection {
        self.direction
    }

    #[must_use]
    pub fn filter(&self) -> Option<&FilterExpression> {
        self.filter.as_ref()
    }

    #[must_use]
    pub fn boundary(&self) -> Option<&Boundary> {
        self.boundary.as_ref()
    }

    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Rows per page after clamping
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Identity of the entity, sort and filter, embedded in emitted tokens
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Order storage must return rows in: the sort, reversed when paging backward
    #[must_use]
    pub fn fetch_order(&self) -> SortSpec {
        match self.direction {
            NavDirection::Forward => self.sort.clone(),
            NavDirection::Backward => self.sort.reversed(),
        }
    }

    /// Rows storage should return: one more than the page so "has more" is observable
    #[must_use]
    pub const fn fetch_limit(&self) -> u32 {
        self.limit.saturating_add(1)
    }

    /// Columns storage must return: the projection plus every sort column
    #[must_use]
    pub fn fetch_columns(&self) -> Vec<String> {
        let mut columns = self.projection.fields().to_vec();
        for field in self.sort.fields() {
            if !columns.iter().any(|c| c == field) {
                columns.push(field.to_string());
            }
        }
        columns
    }

    /// Keyset condition selecting rows past the boundary in fetch order
    #[must_use]
    pub fn seek_predicate(&self) -> Option<Predicate> {
        let boundary = self.boundary.as_ref()?;
        let values: Vec<Value> = boundary.keys.iter().map(|(_, v)| v.clone()).collect();
        Predicate::seek(self.fetch_order().keys(), &values)
    }

    /// Filter clauses and seek condition combined, or `None` when every row qualifies
    #[must_use]
    pub fn predicate(&self) -> Option<Predicate> {
        let mut parts: Vec<Predicate> = self
            .filter
            .iter()
            .flat_map(|f| f.clauses())
            .map(Predicate::from)
            .collect();
        parts.extend(self.seek_predicate());

        if parts.is_empty() {
            None
        } else {
            Some(Predicate::and(parts))
        }
    }
}
