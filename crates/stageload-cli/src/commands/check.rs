use std::path::Path;

use anyhow::{Context, Result};
use stageload_engine::config::{parser, validator};
use stageload_engine::DeleteWindowResolver;
use stageload_types::{LoadStrategy, TableSpec};

/// Execute the `check` command: parse and validate a tables file.
pub fn execute(tables_path: &Path) -> Result<()> {
    let config = parser::parse_config(tables_path)
        .with_context(|| format!("Failed to parse tables file: {}", tables_path.display()))?;

    validator::validate_config(&config)?;
    let environment = config.effective_environment()?;
    println!("Tables file:       OK");
    println!(
        "Dataset:           {}",
        environment.apply(&config.dataset)
    );
    println!("Environment:       {environment}");

    let resolver = DeleteWindowResolver::new(config.identity_field.clone());
    for table in &config.tables {
        print_table(table, &resolver, config.identity.as_ref());
    }

    println!("\nAll checks passed.");
    Ok(())
}

fn print_table(
    table: &TableSpec,
    resolver: &DeleteWindowResolver,
    identity: Option<&stageload_types::ClientIdentity>,
) {
    let strategy = table
        .strategy
        .as_ref()
        .map_or("none (stage only)", LoadStrategy::name);
    println!(
        "{:18} {} (granularity {})",
        format!("{}:", table.name),
        strategy,
        table.granularity
    );

    if let Some(LoadStrategy::Replace { filters }) = &table.strategy {
        match resolver.resolve(identity, filters.where_string().as_deref()) {
            Some(predicate) => println!("{:18} delete WHERE {predicate}", ""),
            None => println!("{:18} no window filter, deletes skipped", ""),
        }
    }
}
