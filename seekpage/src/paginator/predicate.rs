//! Storage-neutral predicate tree
//!
//! Both filter clauses and the keyset seek condition are expressed as
//! [`Predicate`] values. Storage collaborators translate the tree into their
//! own parameterised query form; [`Predicate::matches`] evaluates it directly
//! for in-memory sources.

use serde::Serialize;

use crate::query::{Clause, FilterOperator, Row, SortDirection, SortKey, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// `field <operator> value`, with `value` bound as a parameter
    Compare {
        field: String,
        operator: FilterOperator,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self::Compare {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Conjunction, collapsing a single member to itself
    #[must_use]
    pub fn and(mut predicates: Vec<Predicate>) -> Self {
        if predicates.len() == 1 {
            predicates.remove(0)
        } else {
            Self::And(predicates)
        }
    }

    /// "Strictly after the boundary" for keys in fetch order
    ///
    /// For keys `(c1, d1) .. (ck, dk)` and values `v1 .. vk` builds
    /// `c1 ▷ v1 OR (c1 = v1 AND (c2 ▷ v2 OR (c2 = v2 AND (.. ck ▷ vk))))`
    /// where `▷` is `>` for ascending keys and `<` for descending ones.
    /// Returns `None` when there are no keys.
    #[must_use]
    pub fn seek(keys: &[SortKey], values: &[Value]) -> Option<Self> {
        let mut pairs = keys.iter().zip(values).rev();
        let (last_key, last_value) = pairs.next()?;
        let mut chain = Self::after(last_key, last_value);

        for (key, value) in pairs {
            chain = Self::Or(vec![
                Self::after(key, value),
                Self::And(vec![
                    Self::compare(&key.field, FilterOperator::Equal, value.clone()),
                    chain,
                ]),
            ]);
        }
        Some(chain)
    }

    fn after(key: &SortKey, value: &Value) -> Self {
        let operator = match key.direction {
            SortDirection::Asc => FilterOperator::GreaterThan,
            SortDirection::Desc => FilterOperator::LessThan,
        };
        Self::compare(&key.field, operator, value.clone())
    }

    /// Evaluate against a row; comparisons on absent columns are false, as NULL is in SQL
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Compare {
                field,
                operator,
                value,
            } => {
                let Some(actual) = row.get(field) else {
                    return false;
                };
                match (operator, actual, value) {
                    (FilterOperator::Like, Value::String(text), Value::String(pattern)) => {
                        like_match(text, pattern)
                    }
                    (FilterOperator::Like, _, _) => false,
                    _ => actual
                        .partial_cmp(value)
                        .is_some_and(|ordering| operator.accepts_ordering(ordering)),
                }
            }
            Self::And(predicates) => predicates.iter().all(|p| p.matches(row)),
            Self::Or(predicates) => predicates.iter().any(|p| p.matches(row)),
        }
    }
}

impl From<&Clause> for Predicate {
    fn from(clause: &Clause) -> Self {
        Self::compare(&clause.field, clause.operator, clause.value.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternToken {
    Literal(char),
    AnyOne,
    AnyMany,
}

/// SQL `LIKE` matching: `%` is any run, `_` any single character, `\` escapes
fn like_match(text: &str, pattern: &str) -> bool {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => PatternToken::AnyMany,
            '_' => PatternToken::AnyOne,
            '\\' => PatternToken::Literal(chars.next().unwrap_or('\\')),
            other => PatternToken::Literal(other),
        });
    }

    let text: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(PatternToken::AnyMany) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(PatternToken::AnyOne) => {
                t += 1;
                p += 1;
            }
            Some(PatternToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| *token == PatternToken::AnyMany)
}
