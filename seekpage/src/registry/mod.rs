//! Per-entity field whitelists
//!
//! A [`FieldRegistry`] names, for one entity type, which fields may appear in
//! `sort`, `filter` and `fields` query parameters and which primitive type each
//! field holds. Registries are built once at startup (from code via
//! [`FieldRegistry::builder`] or from configuration) and are read-only afterwards;
//! every validator and the paginator borrow them.
//!
//! # Example
//!
//! ```rust
//! use seekpage::registry::{FieldDef, FieldRegistry, FieldType};
//!
//! let registry = FieldRegistry::builder("users")
//!     .field(FieldDef::new("id", FieldType::Identifier).sortable().filterable())
//!     .field(FieldDef::new("email", FieldType::String).filterable())
//!     .field(FieldDef::new("created_at", FieldType::Timestamp).sortable())
//!     .default_sort("created_at DESC, id DESC")
//!     .build()
//!     .unwrap();
//!
//! assert!(registry.sortable("created_at").is_some());
//! assert!(registry.sortable("email").is_none());
//! ```

mod error;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::query::{parse_sort_terms, SortKey, SortSpec, Value};

pub use error::RegistryError;

/// Default page size when an entity does not override it
pub const DEFAULT_LIMIT: u32 = 20;

/// Default upper bound on page size when an entity does not override it
pub const MAX_LIMIT: u32 = 100;

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("field name regex is valid"));

/// Primitive value type of a registered field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Free text
    String,
    /// 64-bit signed integer
    Integer,
    /// `true` / `false`
    Boolean,
    /// UTC instant, written as RFC 3339 in filters
    Timestamp,
    /// Unique entity identifier
    Identifier,
    /// Closed set of string values (statuses, roles)
    Enum(Vec<String>),
}

impl FieldType {
    /// Short lowercase type name used in messages and configuration
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Identifier => "identifier",
            Self::Enum(_) => "enum",
        }
    }

    /// Whether values of this type have a meaningful `<`/`>` ordering
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Integer | Self::Timestamp | Self::Identifier
        )
    }

    /// Whether `value` is a legal value for a field of this type
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::Boolean, Value::Boolean(_))
            | (Self::Timestamp, Value::Timestamp(_))
            | (Self::Identifier, Value::Identifier(_)) => true,
            (Self::Enum(values), Value::String(s)) => values.iter().any(|v| v == s),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One whitelisted field and the query clauses it may appear in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub sortable: bool,
    pub filterable: bool,
    pub selectable: bool,
}

impl FieldDef {
    /// A selectable field that is neither sortable nor filterable
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            sortable: false,
            filterable: false,
            selectable: true,
        }
    }

    /// Allow the field in `sort`
    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Allow the field in `filter`
    #[must_use]
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Exclude the field from `fields` and from the default projection
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.selectable = false;
        self
    }
}

/// Immutable whitelist of sortable, filterable and selectable fields for one entity
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    entity: String,
    identifier: String,
    fields: BTreeMap<String, FieldDef>,
    declared: Vec<String>,
    default_sort: SortSpec,
    default_limit: u32,
    max_limit: u32,
}

impl FieldRegistry {
    /// Start describing the whitelist for `entity`
    pub fn builder(entity: impl Into<String>) -> FieldRegistryBuilder {
        FieldRegistryBuilder::new(entity)
    }

    /// Entity name, e.g. `users`
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Name of the unique identifier field used as the sort tie-breaker
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Look up any declared field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Type of `name` if it may be sorted on
    #[must_use]
    pub fn sortable(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name).filter(|f| f.sortable).map(|f| &f.ty)
    }

    /// Type of `name` if it may be filtered on
    #[must_use]
    pub fn filterable(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name).filter(|f| f.filterable).map(|f| &f.ty)
    }

    /// Type of `name` if it may be projected
    #[must_use]
    pub fn selectable(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name).filter(|f| f.selectable).map(|f| &f.ty)
    }

    /// Every declared field in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.declared
            .iter()
            .filter_map(|name| self.fields.get(name.as_str()))
    }

    /// Selectable field names in declaration order
    pub fn selectable_fields(&self) -> impl Iterator<Item = &str> {
        self.declared
            .iter()
            .filter(|name| self.fields.get(name.as_str()).is_some_and(|f| f.selectable))
            .map(String::as_str)
    }

    /// Sort applied when the request carries no `sort` parameter
    #[must_use]
    pub fn default_sort(&self) -> &SortSpec {
        &self.default_sort
    }

    /// Page size used when `limit` is absent or zero
    #[must_use]
    pub const fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Largest page size; bigger requests are clamped to it
    #[must_use]
    pub const fn max_limit(&self) -> u32 {
        self.max_limit
    }
}

/// Builder for [`FieldRegistry`]
///
/// The identifier field defaults to `id`; the default sort defaults to the
/// identifier ascending.
#[derive(Debug, Clone)]
pub struct FieldRegistryBuilder {
    entity: String,
    identifier: String,
    fields: Vec<FieldDef>,
    default_sort: Option<String>,
    default_limit: u32,
    max_limit: u32,
}

impl FieldRegistryBuilder {
    fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            identifier: "id".to_string(),
            fields: Vec::new(),
            default_sort: None,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    /// Name the unique identifier field
    #[must_use]
    pub fn identifier(mut self, name: impl Into<String>) -> Self {
        self.identifier = name.into();
        self
    }

    /// Declare a field; declaration order is the default projection order
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Sort used when the request has none, in `sort` parameter syntax
    #[must_use]
    pub fn default_sort(mut self, sort: impl Into<String>) -> Self {
        self.default_sort = Some(sort.into());
        self
    }

    /// Default and maximum page sizes
    #[must_use]
    pub fn limits(mut self, default_limit: u32, max_limit: u32) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    /// Validate the definition and freeze it
    pub fn build(self) -> Result<FieldRegistry, RegistryError> {
        let entity = self.entity;
        let mut fields = BTreeMap::new();
        let mut declared = Vec::with_capacity(self.fields.len());

        for field in self.fields {
            if !FIELD_NAME.is_match(&field.name) {
                return Err(RegistryError::InvalidFieldName {
                    entity,
                    field: field.name,
                });
            }
            if field.sortable && !field.ty.is_orderable() {
                return Err(RegistryError::UnorderableField {
                    entity,
                    field: field.name,
                    ty: field.ty.name(),
                });
            }
            if matches!(&field.ty, FieldType::Enum(values) if values.is_empty()) {
                return Err(RegistryError::EmptyEnum {
                    entity,
                    field: field.name,
                });
            }
            if fields.contains_key(&field.name) {
                return Err(RegistryError::DuplicateField {
                    entity,
                    field: field.name,
                });
            }
            declared.push(field.name.clone());
            fields.insert(field.name.clone(), field);
        }

        match fields.get(&self.identifier) {
            None => {
                return Err(RegistryError::MissingIdentifier {
                    entity,
                    field: self.identifier,
                })
            }
            Some(def) if !def.sortable => {
                return Err(RegistryError::IdentifierNotSortable {
                    entity,
                    field: self.identifier,
                })
            }
            Some(_) => {}
        }

        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(RegistryError::InvalidLimits {
                entity,
                default_limit: self.default_limit,
                max_limit: self.max_limit,
            });
        }

        let mut registry = FieldRegistry {
            entity,
            default_sort: SortSpec::from_keys(vec![SortKey::asc(self.identifier.clone())]),
            identifier: self.identifier,
            fields,
            declared,
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        };

        if let Some(raw) = self.default_sort.filter(|s| !s.trim().is_empty()) {
            registry.default_sort = parse_sort_terms(&raw, &registry).map_err(|source| {
                RegistryError::InvalidDefaultSort {
                    entity: registry.entity.clone(),
                    source,
                }
            })?;
        }

        Ok(registry)
    }
}

/// Read-only lookup of registries by entity name, populated at startup
#[derive(Debug, Clone, Default)]
pub struct Registries {
    entries: BTreeMap<String, Arc<FieldRegistry>>,
}

impl Registries {
    /// Empty provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registry under its entity name
    pub fn insert(&mut self, registry: FieldRegistry) -> Result<(), RegistryError> {
        if self.entries.contains_key(registry.entity()) {
            return Err(RegistryError::DuplicateEntity {
                entity: registry.entity().to_string(),
            });
        }
        self.entries
            .insert(registry.entity().to_string(), Arc::new(registry));
        Ok(())
    }

    /// Registry for `entity`, if one was configured
    #[must_use]
    pub fn get(&self, entity: &str) -> Option<Arc<FieldRegistry>> {
        self.entries.get(entity).cloned()
    }

    /// Configured entity names, sorted
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::SortDirection;

    /// Registry shared by the query, cursor and paginator tests
    pub(crate) fn users() -> FieldRegistry {
        FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier).sortable().filterable())
            .field(FieldDef::new("first_name", FieldType::String).sortable().filterable())
            .field(FieldDef::new("email", FieldType::String).filterable())
            .field(FieldDef::new("age", FieldType::Integer).sortable().filterable())
            .field(FieldDef::new("active", FieldType::Boolean).filterable())
            .field(
                FieldDef::new(
                    "status",
                    FieldType::Enum(vec!["active".to_string(), "suspended".to_string()]),
                )
                .filterable(),
            )
            .field(FieldDef::new("created_at", FieldType::Timestamp).sortable().filterable())
            .field(FieldDef::new("password_hash", FieldType::String).hidden())
            .default_sort("created_at DESC, id DESC")
            .limits(20, 100)
            .build()
            .expect("users registry is valid")
    }

    #[test]
    fn test_whitelists_are_separate() {
        let registry = users();
        assert_eq!(registry.sortable("first_name"), Some(&FieldType::String));
        assert!(registry.sortable("email").is_none());
        assert!(registry.filterable("email").is_some());
        assert!(registry.selectable("password_hash").is_none());
        assert!(registry.field("password_hash").is_some());
        assert!(registry.sortable("unknown").is_none());
    }

    #[test]
    fn test_selectable_fields_keep_declaration_order() {
        let registry = users();
        let fields: Vec<&str> = registry.selectable_fields().collect();
        assert_eq!(
            fields,
            vec!["id", "first_name", "email", "age", "active", "status", "created_at"]
        );
        assert_eq!(registry.fields().count(), 8);
        assert_eq!(registry.fields().last().map(|f| f.name.as_str()), Some("password_hash"));
    }

    #[test]
    fn test_default_sort_is_parsed() {
        let registry = users();
        let keys = registry.default_sort().keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].field, "created_at");
        assert_eq!(keys[0].direction, SortDirection::Desc);
        assert_eq!(keys[1].field, "id");
        assert_eq!(keys[1].direction, SortDirection::Desc);
    }

    #[test]
    fn test_default_sort_falls_back_to_identifier() {
        let registry = FieldRegistry::builder("roles")
            .identifier("role_id")
            .field(FieldDef::new("role_id", FieldType::Identifier).sortable())
            .build()
            .unwrap();
        assert_eq!(registry.default_sort().to_string(), "role_id ASC");
    }

    #[test]
    fn test_rejects_bad_field_name() {
        let result = FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier).sortable())
            .field(FieldDef::new("name; DROP TABLE users", FieldType::String))
            .build();
        assert!(matches!(result, Err(RegistryError::InvalidFieldName { .. })));
    }

    #[test]
    fn test_rejects_duplicate_field() {
        let result = FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier).sortable())
            .field(FieldDef::new("id", FieldType::String))
            .build();
        assert!(matches!(result, Err(RegistryError::DuplicateField { .. })));
    }

    #[test]
    fn test_rejects_missing_or_unsortable_identifier() {
        let missing = FieldRegistry::builder("users")
            .field(FieldDef::new("name", FieldType::String))
            .build();
        assert!(matches!(missing, Err(RegistryError::MissingIdentifier { .. })));

        let unsortable = FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier))
            .build();
        assert!(matches!(
            unsortable,
            Err(RegistryError::IdentifierNotSortable { .. })
        ));
    }

    #[test]
    fn test_rejects_sortable_boolean() {
        let result = FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier).sortable())
            .field(FieldDef::new("active", FieldType::Boolean).sortable())
            .build();
        assert!(matches!(
            result,
            Err(RegistryError::UnorderableField { ty: "boolean", .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_default_sort() {
        let result = FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier).sortable())
            .default_sort("created_at DESC")
            .build();
        assert!(matches!(
            result,
            Err(RegistryError::InvalidDefaultSort { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_limits() {
        let result = FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier).sortable())
            .limits(0, 10)
            .build();
        assert!(matches!(result, Err(RegistryError::InvalidLimits { .. })));

        let result = FieldRegistry::builder("users")
            .field(FieldDef::new("id", FieldType::Identifier).sortable())
            .limits(50, 10)
            .build();
        assert!(matches!(result, Err(RegistryError::InvalidLimits { .. })));
    }

    #[test]
    fn test_field_type_accepts() {
        let status = FieldType::Enum(vec!["active".to_string()]);
        assert!(status.accepts(&Value::String("active".to_string())));
        assert!(!status.accepts(&Value::String("deleted".to_string())));
        assert!(FieldType::Integer.accepts(&Value::Integer(1)));
        assert!(!FieldType::Integer.accepts(&Value::String("1".to_string())));
    }

    #[test]
    fn test_registries_lookup() {
        let mut registries = Registries::new();
        registries.insert(users()).unwrap();
        assert!(registries.get("users").is_some());
        assert!(registries.get("projects").is_none());
        assert_eq!(registries.entities().collect::<Vec<_>>(), vec!["users"]);

        let duplicate = registries.insert(users());
        assert!(matches!(
            duplicate,
            Err(RegistryError::DuplicateEntity { .. })
        ));
    }
}
