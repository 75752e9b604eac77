//! `sort` parameter parsing
//!
//! Accepts comma-separated terms of the form `field [ASC|DESC]`, checks every
//! field against the registry's sortable whitelist and appends the entity's
//! identifier as the final tie-breaker so the resulting order is total.
//!
//! # Example
//!
//! ```rust
//! use seekpage::query::parse_sort;
//! use seekpage::registry::{FieldDef, FieldRegistry, FieldType};
//!
//! let registry = FieldRegistry::builder("users")
//!     .field(FieldDef::new("id", FieldType::Identifier).sortable())
//!     .field(FieldDef::new("first_name", FieldType::String).sortable())
//!     .build()
//!     .unwrap();
//!
//! let sort = parse_sort("first_name desc", &registry).unwrap();
//! assert_eq!(sort.to_string(), "first_name DESC, id ASC");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::QueryError;
use crate::registry::FieldRegistry;

/// Direction of one sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `ASC`/`DESC` in any case
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if token.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// The opposite direction
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// One `(field, direction)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Same column, opposite direction
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.field.clone(), self.direction.reversed())
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction.as_sql())
    }
}

/// Validated ordering, always ending in a unique column
///
/// The `Display` form (`created_at DESC, id ASC`) is canonical: two specs that
/// order rows the same way print identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    pub(crate) fn from_keys(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.field.as_str())
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.keys.iter().any(|k| k.field == field)
    }

    /// Every key with its direction flipped, used to fetch backwards
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            keys: self.keys.iter().map(SortKey::reversed).collect(),
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Parse a request's `sort` parameter
///
/// Empty input yields the registry's default sort.
pub fn parse_sort(raw: &str, registry: &FieldRegistry) -> Result<SortSpec, QueryError> {
    if raw.trim().is_empty() {
        return Ok(registry.default_sort().clone());
    }
    parse_sort_terms(raw, registry)
}

/// Parse non-empty sort text and append the identifier tie-breaker
pub(crate) fn parse_sort_terms(
    raw: &str,
    registry: &FieldRegistry,
) -> Result<SortSpec, QueryError> {
    let mut keys: Vec<SortKey> = Vec::new();

    for term in raw.split(',') {
        let mut words = term.split_whitespace();
        let Some(field) = words.next() else {
            return Err(QueryError::InvalidSortSyntax {
                token: if term.is_empty() { ",".to_string() } else { term.to_string() },
            });
        };

        let direction = match words.next() {
            None => SortDirection::Asc,
            Some(word) => SortDirection::parse(word).ok_or_else(|| {
                QueryError::InvalidSortSyntax {
                    token: word.to_string(),
                }
            })?,
        };

        if let Some(extra) = words.next() {
            return Err(QueryError::InvalidSortSyntax {
                token: extra.to_string(),
            });
        }

        if registry.sortable(field).is_none() {
            return Err(QueryError::InvalidSortField {
                field: field.to_string(),
            });
        }

        if keys.iter().any(|k| k.field == field) {
            return Err(QueryError::InvalidSortSyntax {
                token: field.to_string(),
            });
        }

        keys.push(SortKey::new(field, direction));
    }

    // An identifier anywhere in the list already makes the order total.
    if !keys.iter().any(|k| k.field == registry.identifier()) {
        keys.push(SortKey::asc(registry.identifier()));
    }

    Ok(SortSpec::from_keys(keys))
}
