//! Semantic validation for a parsed tables file.

use std::collections::HashSet;

use anyhow::{bail, Result};
use stageload_types::LoadStrategy;

use crate::config::types::LoadConfig;

/// Validate a parsed tables file, reporting every problem at once.
///
/// A replace table without a window filter is accepted (its deletes are
/// skipped) but logged as a warning.
///
/// # Errors
///
/// Returns an error listing all validation failures.
pub fn validate_config(config: &LoadConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported tables file version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.dataset.trim().is_empty() {
        errors.push("Dataset must not be empty".to_string());
    }

    if config.identity_field.trim().is_empty() {
        errors.push("identity_field must not be empty".to_string());
    }

    if let Some(identity) = &config.identity {
        if identity.key().trim().is_empty() {
            errors.push("identity must not be blank when set".to_string());
        }
    }

    if config.tables.is_empty() {
        errors.push("At least one table must be defined".to_string());
    }

    let mut seen = HashSet::new();
    for (i, table) in config.tables.iter().enumerate() {
        if !table.name.trim().is_empty() && !seen.insert(table.name.as_str()) {
            errors.push(format!("Table '{}' is defined more than once", table.name));
        }
        if let Err(e) = table.validate() {
            for problem in e.problems {
                errors.push(format!("tables[{i}] '{}': {problem}", table.name));
            }
        }
        if let Some(LoadStrategy::Replace { filters }) = &table.strategy {
            if filters.where_string().is_none() {
                tracing::warn!(
                    table = table.name,
                    "Replace table has no window filter; deletes will be skipped"
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Tables file validation failed:\n  - {}", errors.join("\n  - "));
    }
}
