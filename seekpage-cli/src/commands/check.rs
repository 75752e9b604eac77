use anyhow::{anyhow, Result};
use colored::Colorize;
use serde_json::json;

use seekpage::config::Config;
use seekpage::paginator::Paginator;
use seekpage::query::ListParams;
use seekpage::sql::render_select;

/// Assemble request parameters from command-line values
pub fn request(
    sort: Option<String>,
    filter: Option<String>,
    fields: Option<String>,
    limit: Option<String>,
    next_token: Option<String>,
    prev_token: Option<String>,
) -> ListParams {
    ListParams {
        sort,
        filter,
        fields,
        limit,
        next_token,
        prev_token,
    }
}

/// Validate `params` for `entity` and describe the resulting query
pub fn report(
    config: &Config,
    entity: &str,
    params: &ListParams,
    table: Option<&str>,
) -> Result<serde_json::Value> {
    let registries = config.registries()?;
    let registry = registries.get(entity).ok_or_else(|| {
        let known = registries.entities().collect::<Vec<_>>().join(", ");
        anyhow!("unknown entity '{entity}' (configured: {known})")
    })?;
    let codec = config.cursor_codec();

    let descriptor = Paginator::new(&registry, &codec)
        .prepare(params)
        .map_err(|e| {
            let code = e.code();
            anyhow::Error::new(e).context(code)
        })?;
    let statement = render_select(&descriptor, table.unwrap_or(entity));

    Ok(json!({
        "descriptor": descriptor,
        "sql": statement,
    }))
}

pub fn execute(
    config: &Config,
    entity: &str,
    params: &ListParams,
    table: Option<&str>,
) -> Result<()> {
    let report = report(config, entity, params, table)?;
    println!("{} request for '{}' is valid", "✓".green().bold(), entity);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekpage::query::QueryError;

    fn config() -> Config {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"
[pagination]
cursor_secret = "cli-test"

[entities.users]
default_sort = "age DESC"

[[entities.users.fields]]
name = "id"
type = "identifier"
sortable = true

[[entities.users.fields]]
name = "age"
type = "integer"
sortable = true
filterable = true
"#,
        )
        .unwrap();
        Config::load_from(file.path()).unwrap()
    }

    #[test]
    fn test_report_for_valid_request() {
        let params = request(None, Some("age >= 18".into()), None, Some("5".into()), None, None);
        let report = report(&config(), "users", &params, Some("app.users")).unwrap();

        assert_eq!(report["descriptor"]["limit"], 5);
        assert_eq!(
            report["sql"]["sql"],
            r#"SELECT "id", "age" FROM "app"."users" WHERE "age" >= $1 ORDER BY "age" DESC, "id" ASC LIMIT 6"#
        );
        assert_eq!(report["sql"]["params"][0]["i"], 18);
    }

    #[test]
    fn test_report_rejects_unknown_entity() {
        let err = report(&config(), "orders", &ListParams::default(), None).unwrap_err();
        assert!(err.to_string().contains("unknown entity 'orders'"));
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_report_surfaces_query_errors() {
        let params = request(Some("email".into()), None, None, None, None, None);
        let err = report(&config(), "users", &params, None).unwrap_err();
        assert_eq!(err.to_string(), "INVALID_SORT_FIELD");
        assert!(matches!(
            err.downcast_ref::<QueryError>(),
            Some(QueryError::InvalidSortField { .. })
        ));
    }
}
