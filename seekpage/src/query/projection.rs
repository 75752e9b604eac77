//! `fields` parameter parsing

use serde::Serialize;

use super::QueryError;
use crate::registry::FieldRegistry;

/// Validated, de-duplicated list of fields to return
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    /// Every selectable field of the registry, in declaration order
    #[must_use]
    pub fn all(registry: &FieldRegistry) -> Self {
        Self {
            fields: registry.selectable_fields().map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Parse a request's `fields` parameter
///
/// Items are trimmed and de-duplicated keeping their first position; empty
/// input selects every selectable field.
pub fn parse_projection(raw: &str, registry: &FieldRegistry) -> Result<Projection, QueryError> {
    if raw.trim().is_empty() {
        return Ok(Projection::all(registry));
    }

    let mut fields: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim) {
        if item.is_empty() || registry.selectable(item).is_none() {
            return Err(QueryError::InvalidProjectionField {
                field: item.to_string(),
            });
        }
        if !fields.iter().any(|f| f == item) {
            fields.push(item.to_string());
        }
    }

    Ok(Projection { fields })
}
