use anyhow::Result;
use colored::Colorize;

use seekpage::config::Config;
use seekpage::registry::FieldDef;

fn flags(field: &FieldDef) -> String {
    let mut flags = Vec::new();
    if field.sortable {
        flags.push("sort");
    }
    if field.filterable {
        flags.push("filter");
    }
    if field.selectable {
        flags.push("select");
    }
    flags.join(",")
}

pub fn execute(config: &Config) -> Result<()> {
    let registries = config.registries()?;
    if registries.is_empty() {
        println!("{}", "No entities configured".yellow());
        return Ok(());
    }

    for name in registries.entities() {
        let Some(registry) = registries.get(name) else {
            continue;
        };
        println!(
            "{} (identifier: {}, default sort: {}, limit: {}/{})",
            name.bold(),
            registry.identifier(),
            registry.default_sort(),
            registry.default_limit(),
            registry.max_limit()
        );
        for field in registry.fields() {
            println!(
                "  {:<24} {:<12} {}",
                field.name,
                field.ty.to_string().cyan(),
                flags(field).dimmed()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekpage::registry::FieldType;

    #[test]
    fn test_flags() {
        let field = FieldDef::new("age", FieldType::Integer).sortable();
        assert_eq!(flags(&field), "sort,select");
        assert_eq!(flags(&field.hidden()), "sort");
    }
}
