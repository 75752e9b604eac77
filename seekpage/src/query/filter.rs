//! `filter` parameter parsing
//!
//! The grammar is a conjunction of comparisons and nothing else:
//!
//! ```text
//! expr    := clause (AND clause)*
//! clause  := FIELD OP LITERAL
//! OP      := '=' | '!=' | '>' | '<' | '>=' | '<=' | LIKE
//! LITERAL := 'quoted string' | integer | true | false
//! ```
//!
//! Input is tokenized and parsed in full before any clause is checked against
//! the registry, so malformed text always reports [`QueryError::InvalidFilterSyntax`]
//! first. Literals become typed [`Value`]s and are never turned back into query
//! text; storage collaborators bind them as parameters.
//!
//! # Example
//!
//! ```rust
//! use seekpage::query::{parse_filter, FilterOperator, Value};
//! use seekpage::registry::{FieldDef, FieldRegistry, FieldType};
//!
//! let registry = FieldRegistry::builder("users")
//!     .field(FieldDef::new("id", FieldType::Identifier).sortable())
//!     .field(FieldDef::new("age", FieldType::Integer).filterable())
//!     .build()
//!     .unwrap();
//!
//! let filter = parse_filter("age >= 18", &registry).unwrap().unwrap();
//! assert_eq!(filter.clauses()[0].operator, FilterOperator::GreaterThanOrEqual);
//! assert_eq!(filter.clauses()[0].value, Value::Integer(18));
//! ```

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{QueryError, Value};
use crate::registry::{FieldRegistry, FieldType};

/// Longest accepted `filter` parameter, in bytes
pub const MAX_FILTER_LEN: usize = 1024;

/// Most clauses one filter may contain
pub const MAX_FILTER_CLAUSES: usize = 16;

/// Comparison operators of the filter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "LIKE")]
    Like,
}

impl FilterOperator {
    /// Whether a field of type `ty` may be compared with this operator
    #[must_use]
    pub fn applies_to(&self, ty: &FieldType) -> bool {
        match self {
            Self::Equal | Self::NotEqual => true,
            Self::Like => matches!(ty, FieldType::String),
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => ty.is_orderable(),
        }
    }

    /// SQL spelling of the operator
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Like => "LIKE",
        }
    }

    /// Whether an ordering between a column and a literal satisfies the operator
    ///
    /// `LIKE` is not an ordering test and always answers `false` here.
    #[must_use]
    pub const fn accepts_ordering(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => matches!(ordering, Ordering::Equal),
            Self::NotEqual => !matches!(ordering, Ordering::Equal),
            Self::GreaterThan => matches!(ordering, Ordering::Greater),
            Self::GreaterThanOrEqual => !matches!(ordering, Ordering::Less),
            Self::LessThan => matches!(ordering, Ordering::Less),
            Self::LessThanOrEqual => !matches!(ordering, Ordering::Greater),
            Self::Like => false,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
        }
    }
}

/// One validated `field OP literal` comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// Validated conjunction of clauses
///
/// `Display` prints normalized filter text that parses back into the same
/// expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterExpression {
    clauses: Vec<Clause>,
}

impl FilterExpression {
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

/// Parse a request's `filter` parameter
///
/// Empty input means no filter and yields `Ok(None)`.
pub fn parse_filter(
    raw: &str,
    registry: &FieldRegistry,
) -> Result<Option<FilterExpression>, QueryError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    if raw.len() > MAX_FILTER_LEN {
        return Err(QueryError::InvalidFilterSyntax {
            token: format!("filter longer than {MAX_FILTER_LEN} bytes"),
        });
    }

    let tokens = tokenize(raw)?;
    let raw_clauses = parse_clauses(&tokens)?;

    let clauses = raw_clauses
        .into_iter()
        .map(|clause| validate(clause, registry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(FilterExpression { clauses }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Literal {
    Text(String),
    Number(String),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Field(String),
    Operator(FilterOperator),
    Literal(Literal),
    And,
}

/// A token plus the source text it was read from, for error messages
#[derive(Debug)]
struct Spanned<'a> {
    token: Token,
    text: &'a str,
}

fn syntax(token: impl Into<String>) -> QueryError {
    QueryError::InvalidFilterSyntax {
        token: token.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Spanned<'_>>, QueryError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                let word = &input[start..pos];
                if word.eq_ignore_ascii_case("and") {
                    Token::And
                } else if word.eq_ignore_ascii_case("like") {
                    Token::Operator(FilterOperator::Like)
                } else if word.eq_ignore_ascii_case("true") {
                    Token::Literal(Literal::Boolean(true))
                } else if word.eq_ignore_ascii_case("false") {
                    Token::Literal(Literal::Boolean(false))
                } else {
                    Token::Field(word.to_string())
                }
            }
            b'0'..=b'9' | b'-' => {
                pos += 1;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                // Reject `-`, `1.5`, `12abc`: numbers are plain integers.
                if (c == b'-' && pos == start + 1)
                    || (pos < bytes.len()
                        && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'.' || bytes[pos] == b'_'))
                {
                    let end = next_boundary(bytes, pos);
                    return Err(syntax(&input[start..end]));
                }
                Token::Literal(Literal::Number(input[start..pos].to_string()))
            }
            b'\'' => {
                pos += 1;
                let mut text = String::new();
                loop {
                    let Some(rest) = input.get(pos..) else {
                        return Err(syntax(&input[start..]));
                    };
                    let Some(quote) = rest.find('\'') else {
                        return Err(syntax(&input[start..]));
                    };
                    text.push_str(&rest[..quote]);
                    pos += quote + 1;
                    if bytes.get(pos) == Some(&b'\'') {
                        text.push('\'');
                        pos += 1;
                    } else {
                        break;
                    }
                }
                Token::Literal(Literal::Text(text))
            }
            b'=' => {
                pos += 1;
                Token::Operator(FilterOperator::Equal)
            }
            b'!' => {
                if bytes.get(pos + 1) != Some(&b'=') {
                    return Err(syntax("!"));
                }
                pos += 2;
                Token::Operator(FilterOperator::NotEqual)
            }
            b'>' | b'<' => {
                let or_equal = bytes.get(pos + 1) == Some(&b'=');
                pos += if or_equal { 2 } else { 1 };
                Token::Operator(match (c, or_equal) {
                    (b'>', false) => FilterOperator::GreaterThan,
                    (b'>', true) => FilterOperator::GreaterThanOrEqual,
                    (_, false) => FilterOperator::LessThan,
                    (_, true) => FilterOperator::LessThanOrEqual,
                })
            }
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(syntax(ch.to_string()));
            }
        };

        tokens.push(Spanned {
            token,
            text: &input[start..pos],
        });
    }

    Ok(tokens)
}

/// End of the run of non-whitespace starting at `pos`, on a char boundary
fn next_boundary(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos].is_ascii() {
        pos += 1;
    }
    pos
}

struct RawClause<'a> {
    field: String,
    operator: FilterOperator,
    literal: Literal,
    literal_text: &'a str,
}

fn parse_clauses<'a>(tokens: &[Spanned<'a>]) -> Result<Vec<RawClause<'a>>, QueryError> {
    let mut clauses = Vec::new();
    let mut iter = tokens.iter();

    loop {
        let field = match iter.next() {
            Some(Spanned {
                token: Token::Field(name),
                ..
            }) => name.clone(),
            Some(other) => return Err(syntax(other.text)),
            None => return Err(syntax("end of filter")),
        };

        let operator = match iter.next() {
            Some(Spanned {
                token: Token::Operator(op),
                ..
            }) => *op,
            Some(other) => return Err(syntax(other.text)),
            None => return Err(syntax("end of filter")),
        };

        let (literal, literal_text) = match iter.next() {
            Some(Spanned {
                token: Token::Literal(literal),
                text,
            }) => (literal.clone(), *text),
            Some(other) => return Err(syntax(other.text)),
            None => return Err(syntax("end of filter")),
        };

        if clauses.len() == MAX_FILTER_CLAUSES {
            return Err(syntax(format!(
                "{field}: more than {MAX_FILTER_CLAUSES} clauses"
            )));
        }
        clauses.push(RawClause {
            field,
            operator,
            literal,
            literal_text,
        });

        match iter.next() {
            None => return Ok(clauses),
            Some(Spanned {
                token: Token::And, ..
            }) => {}
            Some(other) => return Err(syntax(other.text)),
        }
    }
}

fn validate(raw: RawClause<'_>, registry: &FieldRegistry) -> Result<Clause, QueryError> {
    let Some(ty) = registry.filterable(&raw.field) else {
        return Err(QueryError::InvalidFilterField { field: raw.field });
    };

    if !raw.operator.applies_to(ty) {
        return Err(QueryError::InvalidFilterOperator {
            field: raw.field,
            operator: raw.operator,
        });
    }

    let Some(value) = coerce(raw.literal, ty) else {
        return Err(QueryError::InvalidFilterValue {
            field: raw.field,
            value: raw.literal_text.to_string(),
        });
    };

    Ok(Clause {
        field: raw.field,
        operator: raw.operator,
        value,
    })
}

/// Convert a literal into the field's declared type
fn coerce(literal: Literal, ty: &FieldType) -> Option<Value> {
    match (ty, literal) {
        (FieldType::String, Literal::Text(s)) => Some(Value::String(s)),
        (FieldType::Integer, Literal::Number(n)) => n.parse().ok().map(Value::Integer),
        (FieldType::Boolean, Literal::Boolean(b)) => Some(Value::Boolean(b)),
        (FieldType::Timestamp, Literal::Text(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| Value::Timestamp(t.with_timezone(&Utc))),
        (FieldType::Identifier, Literal::Text(s) | Literal::Number(s)) => {
            Some(Value::Identifier(s))
        }
        (FieldType::Enum(values), Literal::Text(s)) if values.contains(&s) => {
            Some(Value::String(s))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::users;
    use chrono::TimeZone;

    fn parse(raw: &str) -> Result<Option<FilterExpression>, QueryError> {
        parse_filter(raw, &users())
    }

    #[test]
    fn test_parses_conjunction() {
        let filter = parse("status = 'active' AND age > 18").unwrap().unwrap();
        assert_eq!(
            filter.clauses(),
            &[
                Clause {
                    field: "status".to_string(),
                    operator: FilterOperator::Equal,
                    value: Value::from("active"),
                },
                Clause {
                    field: "age".to_string(),
                    operator: FilterOperator::GreaterThan,
                    value: Value::Integer(18),
                },
            ]
        );
    }

    #[test]
    fn test_empty_input_is_no_filter() {
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let filter = parse("first_name like 'Ann%' and active = TRUE")
            .unwrap()
            .unwrap();
        assert_eq!(filter.clauses()[0].operator, FilterOperator::Like);
        assert_eq!(filter.clauses()[1].value, Value::Boolean(true));
    }

    #[test]
    fn test_all_operators_tokenize() {
        for (text, op) in [
            ("=", FilterOperator::Equal),
            ("!=", FilterOperator::NotEqual),
            (">", FilterOperator::GreaterThan),
            (">=", FilterOperator::GreaterThanOrEqual),
            ("<", FilterOperator::LessThan),
            ("<=", FilterOperator::LessThanOrEqual),
        ] {
            let filter = parse(&format!("age {text} 30")).unwrap().unwrap();
            assert_eq!(filter.clauses()[0].operator, op, "operator {text}");
        }
    }

    #[test]
    fn test_operators_without_spaces() {
        let filter = parse("age>=18 AND age<65").unwrap().unwrap();
        assert_eq!(filter.clauses().len(), 2);
        assert_eq!(filter.to_string(), "age >= 18 AND age < 65");
    }

    #[test]
    fn test_quoted_strings_unescape() {
        let filter = parse("first_name = 'O''Brien'").unwrap().unwrap();
        assert_eq!(filter.clauses()[0].value, Value::from("O'Brien"));
        assert_eq!(filter.to_string(), "first_name = 'O''Brien'");
    }

    #[test]
    fn test_injection_text_stays_a_literal() {
        let filter = parse("email = 'x''; DROP TABLE users; --'")
            .unwrap()
            .unwrap();
        assert_eq!(
            filter.clauses()[0].value,
            Value::from("x'; DROP TABLE users; --")
        );
    }

    #[test]
    fn test_negative_integers() {
        let filter = parse("age > -1").unwrap().unwrap();
        assert_eq!(filter.clauses()[0].value, Value::Integer(-1));
    }

    #[test]
    fn test_timestamp_literal() {
        let filter = parse("created_at >= '2024-01-01T00:00:00+02:00'")
            .unwrap()
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2023, 12, 31, 22, 0, 0).unwrap();
        assert_eq!(filter.clauses()[0].value, Value::Timestamp(expected));
    }

    #[test]
    fn test_identifier_accepts_string_or_number() {
        let filter = parse("id = 'usr_1' AND id != 42").unwrap().unwrap();
        assert_eq!(filter.clauses()[0].value, Value::Identifier("usr_1".to_string()));
        assert_eq!(filter.clauses()[1].value, Value::Identifier("42".to_string()));
    }

    #[test]
    fn test_like_on_enum_is_invalid_operator() {
        let result = parse("age > 18 AND status LIKE 'act%'");
        assert_eq!(
            result,
            Err(QueryError::InvalidFilterOperator {
                field: "status".to_string(),
                operator: FilterOperator::Like,
            })
        );
    }

    #[test]
    fn test_ordering_on_boolean_is_invalid_operator() {
        let result = parse("active > true");
        assert!(matches!(
            result,
            Err(QueryError::InvalidFilterOperator { field, .. }) if field == "active"
        ));
    }

    #[test]
    fn test_unknown_or_hidden_field() {
        assert_eq!(
            parse("password_hash = 'x'"),
            Err(QueryError::InvalidFilterField {
                field: "password_hash".to_string()
            })
        );
        assert!(matches!(
            parse("nickname = 'x'"),
            Err(QueryError::InvalidFilterField { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_is_invalid_value() {
        assert_eq!(
            parse("age = 'old'"),
            Err(QueryError::InvalidFilterValue {
                field: "age".to_string(),
                value: "'old'".to_string(),
            })
        );
        assert!(matches!(
            parse("status = 'deleted'"),
            Err(QueryError::InvalidFilterValue { .. })
        ));
        assert!(matches!(
            parse("created_at > 'yesterday'"),
            Err(QueryError::InvalidFilterValue { .. })
        ));
        assert!(matches!(
            parse("age = 99999999999999999999"),
            Err(QueryError::InvalidFilterValue { .. })
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for raw in [
            "age >",
            "age 18",
            "> 18",
            "age > 18 AND",
            "age > 18 OR age < 5",
            "(age > 18)",
            "age > 1.5",
            "first_name = 'unterminated",
            "age ! 3",
            "age > 18 age < 20",
            "age = -",
        ] {
            assert!(
                matches!(parse(raw), Err(QueryError::InvalidFilterSyntax { .. })),
                "expected syntax error for {raw:?}"
            );
        }
    }

    #[test]
    fn test_syntax_checked_before_fields() {
        let result = parse("nickname = 'x' AND (");
        assert!(matches!(result, Err(QueryError::InvalidFilterSyntax { .. })));
    }

    #[test]
    fn test_length_and_clause_limits() {
        let long = format!("first_name = '{}'", "a".repeat(MAX_FILTER_LEN));
        assert!(matches!(
            parse(&long),
            Err(QueryError::InvalidFilterSyntax { .. })
        ));

        let many = vec!["age > 1"; MAX_FILTER_CLAUSES + 1].join(" AND ");
        assert!(matches!(
            parse(&many),
            Err(QueryError::InvalidFilterSyntax { .. })
        ));

        let allowed = vec!["age > 1"; MAX_FILTER_CLAUSES].join(" AND ");
        assert!(parse(&allowed).is_ok());
    }

    #[test]
    fn test_non_ascii_input_does_not_panic() {
        assert!(parse("first_name = 'Zoë'").is_ok());
        assert!(matches!(
            parse("first_name = Zoë"),
            Err(QueryError::InvalidFilterSyntax { .. })
        ));
        assert!(matches!(
            parse("age > 1é"),
            Err(QueryError::InvalidFilterSyntax { .. })
        ));
    }

    #[test]
    fn test_operator_applicability() {
        let status = FieldType::Enum(vec!["a".to_string()]);
        assert!(FilterOperator::Equal.applies_to(&status));
        assert!(!FilterOperator::GreaterThan.applies_to(&status));
        assert!(FilterOperator::Like.applies_to(&FieldType::String));
        assert!(!FilterOperator::Like.applies_to(&FieldType::Identifier));
        assert!(FilterOperator::LessThan.applies_to(&FieldType::Timestamp));
    }
}
