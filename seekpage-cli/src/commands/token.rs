use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use seekpage::config::Config;
use seekpage::cursor::Fingerprint;
use seekpage::query::{parse_filter, parse_sort};

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Verify a cursor token and show the boundary it carries
    Inspect {
        /// Token as issued in next_token or prev_token
        #[arg(value_name = "TOKEN")]
        token: String,

        /// Also check the token against this entity's request
        #[arg(short, long)]
        entity: Option<String>,

        /// Sort of the request to check against
        #[arg(long, requires = "entity")]
        sort: Option<String>,

        /// Filter of the request to check against
        #[arg(long, requires = "entity")]
        filter: Option<String>,
    },
}

/// Request a token is checked against
pub struct Origin<'a> {
    pub entity: &'a str,
    pub sort: &'a str,
    pub filter: &'a str,
}

/// Open `token` and describe its boundary, optionally checking its fingerprint
pub fn inspect(config: &Config, token: &str, origin: Option<&Origin<'_>>) -> Result<serde_json::Value> {
    let boundary = config.cursor_codec().open(token)?;

    let keys: serde_json::Map<String, serde_json::Value> = boundary
        .keys
        .iter()
        .map(|(field, value)| (field.clone(), json!(value.to_string())))
        .collect();

    let mut report = json!({
        "direction": boundary.direction.to_string(),
        "fingerprint": boundary.fingerprint,
        "keys": keys,
    });

    if let Some(origin) = origin {
        let registries = config.registries()?;
        let registry = registries
            .get(origin.entity)
            .ok_or_else(|| anyhow!("unknown entity '{}'", origin.entity))?;
        let sort = parse_sort(origin.sort, &registry)?;
        let filter = parse_filter(origin.filter, &registry)?;
        let expected = Fingerprint::compute(registry.entity(), &sort, filter.as_ref());
        report["matches_request"] = json!(expected == boundary.fingerprint);
    }

    Ok(report)
}

pub fn execute(config: &Config, command: TokenCommands) -> Result<()> {
    match command {
        TokenCommands::Inspect {
            token,
            entity,
            sort,
            filter,
        } => {
            let origin = entity.as_deref().map(|entity| Origin {
                entity,
                sort: sort.as_deref().unwrap_or_default(),
                filter: filter.as_deref().unwrap_or_default(),
            });
            let report = inspect(config, &token, origin.as_ref())?;

            match report.get("matches_request").and_then(serde_json::Value::as_bool) {
                Some(false) => println!(
                    "{} token is authentic but was issued for a different sort or filter",
                    "!".yellow().bold()
                ),
                _ => println!("{} token is authentic", "✓".green().bold()),
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekpage::cursor::{Boundary, NavDirection};
    use seekpage::query::{QueryError, Value};

    fn config() -> Config {
        let mut config = Config::default();
        config.pagination.cursor_secret = Some("cli-test".to_string());
        config.entities.insert(
            "users".to_string(),
            seekpage::config::EntityConfig {
                identifier: "id".to_string(),
                default_sort: None,
                default_limit: None,
                max_limit: None,
                fields: vec![seekpage::config::FieldConfig {
                    name: "id".to_string(),
                    kind: seekpage::config::FieldKind::Integer,
                    sortable: true,
                    filterable: true,
                    selectable: true,
                    values: Vec::new(),
                }],
            },
        );
        config
    }

    fn token(config: &Config) -> String {
        let boundary = Boundary::new(
            Fingerprint::from_parts("users", "id DESC", ""),
            NavDirection::Backward,
            vec![("id".to_string(), Value::Integer(42))],
        );
        config.cursor_codec().encode(&boundary).unwrap()
    }

    #[test]
    fn test_inspect_shows_boundary() {
        let config = config();
        let report = inspect(&config, &token(&config), None).unwrap();
        assert_eq!(report["direction"], "backward");
        assert_eq!(report["keys"]["id"], "42");
        assert!(report.get("matches_request").is_none());
    }

    #[test]
    fn test_inspect_checks_origin() {
        let config = config();
        let token = token(&config);

        let same = Origin {
            entity: "users",
            sort: "id DESC",
            filter: "",
        };
        let report = inspect(&config, &token, Some(&same)).unwrap();
        assert_eq!(report["matches_request"], true);

        let other = Origin {
            entity: "users",
            sort: "id DESC",
            filter: "id > 3",
        };
        let report = inspect(&config, &token, Some(&other)).unwrap();
        assert_eq!(report["matches_request"], false);
    }

    #[test]
    fn test_inspect_rejects_tampered_token() {
        let config = config();
        let mut token = token(&config);
        let last = if token.ends_with('A') { "B" } else { "A" };
        token.replace_range(token.len() - 1.., last);

        let err = inspect(&config, &token, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueryError>(),
            Some(QueryError::InvalidToken)
        ));
    }
}
