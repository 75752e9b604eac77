//! In-process storage collaborator
//!
//! [`MemorySource`] evaluates a [`QueryDescriptor`] against a vector of rows.
//! It is the reference for what any [`PageSource`] has to do, and serves tests,
//! fixtures and small static datasets.

use std::cmp::Ordering;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::paginator::{PageSource, QueryDescriptor};
use crate::query::{Row, SortDirection, SortSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("fetch cancelled")]
    Cancelled,
}

/// Rows held in memory
///
/// Sort columns are expected to be present on every row; a row missing one
/// sorts after rows that have it and never passes a seek condition.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<Row>,
}

impl MemorySource {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows matching the descriptor, in fetch order, limited and reduced to the fetch columns
    #[must_use]
    pub fn select(&self, descriptor: &QueryDescriptor) -> Vec<Row> {
        let predicate = descriptor.predicate();
        let order = descriptor.fetch_order();
        let columns = descriptor.fetch_columns();

        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| predicate.as_ref().map_or(true, |p| p.matches(row)))
            .cloned()
            .collect();

        rows.sort_by(|a, b| compare_rows(a, b, &order));
        rows.truncate(descriptor.fetch_limit() as usize);

        for row in &mut rows {
            row.retain(|column, _| columns.iter().any(|c| c == column));
        }
        rows
    }
}

fn compare_rows(a: &Row, b: &Row, order: &SortSpec) -> Ordering {
    for key in order.keys() {
        let ordering = match (a.get(&key.field), b.get(&key.field)) {
            (Some(x), Some(y)) => {
                let ordering = x.partial_cmp(y).unwrap_or(Ordering::Equal);
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
            // missing values go last in either direction
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl PageSource for MemorySource {
    type Error = MemoryError;

    fn fetch(
        &self,
        descriptor: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send {
        let result = if cancel.is_cancelled() {
            Err(MemoryError::Cancelled)
        } else {
            Ok(self.select(descriptor))
        };
        std::future::ready(result)
    }
}
