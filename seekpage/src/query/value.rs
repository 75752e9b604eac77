//! Typed field values
//!
//! Every literal that leaves the filter parser, every boundary value carried by a
//! cursor token and every column of a fetched row is a [`Value`]. Values only
//! order against values of the same variant; comparing an integer with a string
//! has no answer rather than a wrong one.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A fetched row: column name to value
///
/// Columns that are NULL in storage are simply absent.
pub type Row = BTreeMap<String, Value>;

/// A single typed value
///
/// The serialized form uses one-letter tags so cursor tokens stay short:
///
/// ```rust
/// use seekpage::query::Value;
///
/// let json = serde_json::to_string(&Value::Integer(42)).unwrap();
/// assert_eq!(json, r#"{"i":42}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    #[serde(rename = "s")]
    String(String),
    #[serde(rename = "i")]
    Integer(i64),
    #[serde(rename = "b")]
    Boolean(bool),
    #[serde(rename = "t")]
    Timestamp(DateTime<Utc>),
    #[serde(rename = "id")]
    Identifier(String),
}

impl Value {
    /// Short name of the variant, matching [`FieldType::name`](crate::registry::FieldType::name)
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Boolean(_) => "boolean",
            Self::Timestamp(_) => "timestamp",
            Self::Identifier(_) => "identifier",
        }
    }

    /// Borrow the text of a string or identifier value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Identifier(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) | (Self::Identifier(a), Self::Identifier(b)) => {
                Some(a.cmp(b))
            }
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Renders the value as a filter literal, so a parsed expression prints back
/// into text the parser accepts.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Identifier(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Timestamp(t) => {
                write!(f, "'{}'", t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}
