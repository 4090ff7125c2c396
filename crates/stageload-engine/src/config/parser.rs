//! Tables YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::LoadConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();

    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        if let Ok(val) = std::env::var(&cap[1]) {
            val
        } else {
            missing.push(cap[1].to_string());
            String::new()
        }
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

/// Parse a tables YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<LoadConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: LoadConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse tables YAML")?;
    Ok(config)
}

/// Parse a tables YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<LoadConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tables file: {}", path.display()))?;
    parse_config_str(&content)
}
