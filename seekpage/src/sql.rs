//! PostgreSQL rendering of query descriptors
//!
//! [`render_select`] turns a [`QueryDescriptor`] into parameterised SQL text.
//! Column and table names come from the registry and are double-quoted; every
//! literal travels in [`SqlStatement::params`] and is bound, never spliced.
//!
//! With the `database` feature, [`SqlStatement::query`] binds the parameters
//! into a `sqlx` query and [`PgPageSource`] runs it against a `PgPool`.

use std::fmt::Write as _;

use serde::Serialize;

use crate::paginator::{Predicate, QueryDescriptor};
use crate::query::Value;

/// Parameterised SQL plus its positional parameters (`$1`, `$2`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Quote an identifier, doubling embedded quotes
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name
fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Render the page query for `descriptor` against `table`
///
/// ```rust
/// use seekpage::cursor::CursorCodec;
/// use seekpage::paginator::Paginator;
/// use seekpage::query::ListParams;
/// use seekpage::registry::{FieldDef, FieldRegistry, FieldType};
/// use seekpage::sql::render_select;
///
/// let registry = FieldRegistry::builder("users")
///     .field(FieldDef::new("id", FieldType::Identifier).sortable())
///     .field(FieldDef::new("age", FieldType::Integer).filterable())
///     .build()
///     .unwrap();
/// let codec = CursorCodec::new("secret");
/// let descriptor = Paginator::new(&registry, &codec)
///     .prepare(&ListParams::new().with_filter("age > 18").with_limit(10))
///     .unwrap();
///
/// let statement = render_select(&descriptor, "users");
/// assert_eq!(
///     statement.sql,
///     r#"SELECT "id", "age" FROM "users" WHERE "age" > $1 ORDER BY "id" ASC LIMIT 11"#
/// );
/// ```
#[must_use]
pub fn render_select(descriptor: &QueryDescriptor, table: &str) -> SqlStatement {
    let mut params = Vec::new();

    let columns = descriptor
        .fetch_columns()
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("SELECT {columns} FROM {}", quote_table(table));

    if let Some(predicate) = descriptor.predicate() {
        sql.push_str(" WHERE ");
        render_predicate(&predicate, &mut sql, &mut params);
    }

    let order = descriptor
        .fetch_order()
        .keys()
        .iter()
        .map(|key| format!("{} {}", quote_identifier(&key.field), key.direction.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = write!(sql, " ORDER BY {order} LIMIT {}", descriptor.fetch_limit());

    SqlStatement { sql, params }
}

fn render_predicate(predicate: &Predicate, sql: &mut String, params: &mut Vec<Value>) {
    match predicate {
        Predicate::Compare {
            field,
            operator,
            value,
        } => {
            params.push(value.clone());
            let _ = write!(
                sql,
                "{} {} ${}",
                quote_identifier(field),
                operator.as_sql(),
                params.len()
            );
        }
        Predicate::And(parts) => render_group(parts, " AND ", sql, params),
        Predicate::Or(parts) => render_group(parts, " OR ", sql, params),
    }
}

fn render_group(parts: &[Predicate], joiner: &str, sql: &mut String, params: &mut Vec<Value>) {
    sql.push('(');
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        render_predicate(part, sql, params);
    }
    sql.push(')');
}

#[cfg(feature = "database")]
mod pg {
    use std::future::Future;
    use std::sync::Arc;

    use sqlx::postgres::{PgArguments, PgPool, PgRow};
    use sqlx::Row as _;
    use tokio_util::sync::CancellationToken;

    use super::{render_select, SqlStatement};
    use crate::paginator::{PageSource, QueryDescriptor};
    use crate::query::{Row, Value};
    use crate::registry::{FieldRegistry, FieldType};

    impl SqlStatement {
        /// Bind the parameters into an executable query
        pub fn query(&self) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
            let mut query = sqlx::query(&self.sql);
            for value in &self.params {
                query = match value {
                    Value::String(s) | Value::Identifier(s) => query.bind(s.as_str()),
                    Value::Integer(n) => query.bind(*n),
                    Value::Boolean(b) => query.bind(*b),
                    Value::Timestamp(t) => query.bind(*t),
                };
            }
            query
        }
    }

    /// [`PageSource`] reading one PostgreSQL table
    ///
    /// Columns are decoded by their registry type: strings and enums as `TEXT`,
    /// integers as `BIGINT`, booleans, timestamps as `TIMESTAMPTZ` and
    /// identifiers as `TEXT`. NULL columns are left out of the row.
    ///
    /// Identifier literals and boundaries are bound as text, so the identifier
    /// column must be a text type. For `uuid` or `bigint` keys, declare the field
    /// as an `Integer`, or expose the key through a view that casts it to `TEXT`.
    #[derive(Debug, Clone)]
    pub struct PgPageSource {
        pool: PgPool,
        table: String,
        registry: Arc<FieldRegistry>,
    }

    impl PgPageSource {
        pub fn new(pool: PgPool, table: impl Into<String>, registry: Arc<FieldRegistry>) -> Self {
            Self {
                pool,
                table: table.into(),
                registry,
            }
        }

        fn decode(&self, pg_row: &PgRow, columns: &[String]) -> Result<Row, sqlx::Error> {
            let mut row = Row::new();
            for column in columns {
                let Some(def) = self.registry.field(column) else {
                    continue;
                };
                let name = column.as_str();
                let value = match &def.ty {
                    FieldType::String | FieldType::Enum(_) => {
                        pg_row.try_get::<Option<String>, _>(name)?.map(Value::String)
                    }
                    FieldType::Identifier => pg_row
                        .try_get::<Option<String>, _>(name)?
                        .map(Value::Identifier),
                    FieldType::Integer => pg_row.try_get::<Option<i64>, _>(name)?.map(Value::Integer),
                    FieldType::Boolean => pg_row.try_get::<Option<bool>, _>(name)?.map(Value::Boolean),
                    FieldType::Timestamp => pg_row
                        .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
                        .map(Value::Timestamp),
                };
                if let Some(value) = value {
                    row.insert(column.clone(), value);
                }
            }
            Ok(row)
        }
    }

    impl PageSource for PgPageSource {
        type Error = sqlx::Error;

        fn fetch(
            &self,
            descriptor: &QueryDescriptor,
            _cancel: &CancellationToken,
        ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send {
            let statement = render_select(descriptor, &self.table);
            let columns = descriptor.fetch_columns();
            async move {
                let rows = statement.query().fetch_all(&self.pool).await?;
                rows.iter().map(|r| self.decode(r, &columns)).collect()
            }
        }
    }
}

#[cfg(feature = "database")]
pub use pg::PgPageSource;
