//! Tables file model.

use serde::{Deserialize, Serialize};
use stageload_types::identity::DEFAULT_IDENTITY_FIELD;
use stageload_types::{ClientIdentity, Environment, TableSpec};

/// Environment variable overriding the file's `environment`.
pub const ENVIRONMENT_VAR: &str = "STAGELOAD_ENV";

fn default_identity_field() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

/// Top-level tables file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    pub version: String,
    /// Target dataset, before the environment suffix.
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
    /// Client the loads run for; omitted for unscoped loads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ClientIdentity>,
    pub tables: Vec<TableSpec>,
}

impl LoadConfig {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Environment after applying an override value (normally
    /// `STAGELOAD_ENV`).
    ///
    /// # Errors
    ///
    /// Returns an error if the override is not a known environment.
    pub fn environment_with_override(&self, value: Option<&str>) -> anyhow::Result<Environment> {
        match value {
            Some(v) => v
                .parse::<Environment>()
                .map_err(|e: String| anyhow::anyhow!("{ENVIRONMENT_VAR}: {e}")),
            None => Ok(self.environment.unwrap_or_default()),
        }
    }

    /// Environment from `STAGELOAD_ENV`, falling back to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if `STAGELOAD_ENV` holds an unknown environment.
    pub fn effective_environment(&self) -> anyhow::Result<Environment> {
        let value = std::env::var(ENVIRONMENT_VAR).ok();
        self.environment_with_override(value.as_deref())
    }
}
