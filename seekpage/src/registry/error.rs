//! Registry construction errors
//!
//! These are raised once, at service initialization, when a per-entity field
//! whitelist is inconsistent. They never occur at request time.

use thiserror::Error;

use crate::query::QueryError;

/// A field registry definition that cannot be turned into a usable whitelist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Field names must be lowercase ASCII identifiers
    #[error("entity '{entity}': invalid field name '{field}'")]
    InvalidFieldName { entity: String, field: String },

    /// The same field was declared twice
    #[error("entity '{entity}': field '{field}' declared more than once")]
    DuplicateField { entity: String, field: String },

    /// The configured identifier field does not exist
    #[error("entity '{entity}': identifier field '{field}' is not declared")]
    MissingIdentifier { entity: String, field: String },

    /// The identifier must be sortable to act as the tie-breaker
    #[error("entity '{entity}': identifier field '{field}' must be sortable")]
    IdentifierNotSortable { entity: String, field: String },

    /// Boolean and enum fields cannot provide a total order
    #[error("entity '{entity}': field '{field}' of type {ty} cannot be sorted")]
    UnorderableField {
        entity: String,
        field: String,
        ty: &'static str,
    },

    /// Enum fields need at least one allowed value
    #[error("entity '{entity}': enum field '{field}' has no values")]
    EmptyEnum { entity: String, field: String },

    /// The default sort does not validate against the entity's own whitelist
    #[error("entity '{entity}': invalid default sort: {source}")]
    InvalidDefaultSort {
        entity: String,
        #[source]
        source: QueryError,
    },

    /// `default_limit` must be between 1 and `max_limit`
    #[error("entity '{entity}': invalid limits (default {default_limit}, max {max_limit})")]
    InvalidLimits {
        entity: String,
        default_limit: u32,
        max_limit: u32,
    },

    /// Two registries were registered under the same entity name
    #[error("entity '{entity}' is already registered")]
    DuplicateEntity { entity: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_entity_and_field() {
        let error = RegistryError::DuplicateField {
            entity: "users".to_string(),
            field: "email".to_string(),
        };
        let display = error.to_string();
        assert!(display.contains("users"));
        assert!(display.contains("email"));
    }

    #[test]
    fn test_default_sort_error_keeps_source() {
        let error = RegistryError::InvalidDefaultSort {
            entity: "users".to_string(),
            source: QueryError::InvalidSortField {
                field: "nope".to_string(),
            },
        };
        let source = std::error::Error::source(&error).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("unknown or unsortable sort field 'nope'"));
    }
}
