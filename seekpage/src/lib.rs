//! # seekpage
//!
//! Keyset (seek) pagination for list endpoints, with opaque signed cursor tokens.
//!
//! ## Features
//!
//! - **Whitelisted fields**: every sortable, filterable and selectable field is declared per entity
//! - **Validated requests**: `sort`, `filter`, `fields` and `limit` are parsed and checked before any storage call
//! - **Stable paging**: a unique identifier always closes the sort, so pages never skip or repeat rows
//! - **Signed cursors**: tokens are MAC-protected and bound to the entity, sort and filter they came from
//! - **Pluggable storage**: any [`PageSource`](paginator::PageSource) can serve pages; an in-memory source
//!   and a PostgreSQL renderer are included
//!
//! ## Example
//!
//! ```rust,no_run
//! use seekpage::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // Build registries and the cursor codec
//!     let registries = config.registries()?;
//!     let codec = config.cursor_codec();
//!
//!     let users = registries.get("users").ok_or_else(|| anyhow::anyhow!("no users entity"))?;
//!     let source = MemorySource::default();
//!     let page = Paginator::new(&users, &codec)
//!         .paginate(&source, &ListParams::new().with_limit(10), &CancellationToken::new())
//!         .await?;
//!
//!     println!("{}", serde_json::to_string(&page)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod memory;
pub mod observability;
pub mod paginator;
pub mod query;
pub mod registry;
pub mod sql;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, EntityConfig, FieldConfig, FieldKind, PaginationConfig};
    pub use crate::cursor::{Boundary, CursorCodec, Fingerprint, NavDirection};
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::memory::MemorySource;
    pub use crate::observability::init_tracing;
    pub use crate::paginator::{Page, PageError, PageSource, Paginator, QueryDescriptor};
    pub use crate::query::{ListParams, QueryError, Row, SortDirection, Value};
    pub use crate::registry::{FieldDef, FieldRegistry, FieldType, Registries};
    pub use crate::sql::{render_select, SqlStatement};

    #[cfg(feature = "database")]
    pub use crate::sql::PgPageSource;

    pub use tokio_util::sync::CancellationToken;
}
