//! Load error model.

use std::fmt;

/// Orchestrator step a collaborator failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStep {
    /// Checking whether the target table exists.
    TableExists,
    /// Creating the staging object.
    Stage,
    /// Populating the staging object from the data source.
    Fetch,
    /// Copying a staging object into a table.
    Copy,
    /// Merging the temp table into the target.
    Merge,
    /// Dropping the merge temp table.
    DeleteTable,
    /// Deleting the replace window from the target.
    DeleteRows,
}

impl fmt::Display for LoadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TableExists => "table_exists",
            Self::Stage => "stage",
            Self::Fetch => "fetch",
            Self::Copy => "copy",
            Self::Merge => "merge",
            Self::DeleteTable => "delete_table",
            Self::DeleteRows => "delete_rows",
        };
        f.write_str(s)
    }
}

/// Error returned by a load invocation.
///
/// `Config` is raised before any collaborator is called. `Step` wraps the
/// first collaborator failure; steps completed before it are not undone.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Missing or invalid setup.
    #[error("configuration error: {0}")]
    Config(String),
    /// A collaborator call failed.
    #[error("{step} failed for table '{table}': {source}")]
    Step {
        table: String,
        step: LoadStep,
        source: anyhow::Error,
    },
}

impl LoadError {
    /// `map_err` adapter tagging a collaborator error with table and step.
    pub(crate) fn at(table: &str, step: LoadStep) -> impl FnOnce(anyhow::Error) -> Self + '_ {
        move |source| Self::Step {
            table: table.to_string(),
            step,
            source,
        }
    }

    /// The failed step, for collaborator errors.
    #[must_use]
    pub fn step(&self) -> Option<LoadStep> {
        match self {
            Self::Config(_) => None,
            Self::Step { step, .. } => Some(*step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_names_table_and_step() {
        let err = LoadError::at("orders", LoadStep::Merge)(anyhow::anyhow!("quota exceeded"));
        let msg = err.to_string();
        assert_eq!(msg, "merge failed for table 'orders': quota exceeded");
        assert_eq!(err.step(), Some(LoadStep::Merge));
    }

    #[test]
    fn step_error_exposes_source() {
        let err = LoadError::at("orders", LoadStep::Fetch)(anyhow::anyhow!("timeout"));
        let source = std::error::Error::source(&err).expect("source must be set");
        assert_eq!(source.to_string(), "timeout");
    }

    #[test]
    fn config_error_has_no_step() {
        let err = LoadError::Config("warehouse is required".into());
        assert_eq!(err.to_string(), "configuration error: warehouse is required");
        assert_eq!(err.step(), None);
    }

    #[test]
    fn step_display_is_snake_case() {
        assert_eq!(LoadStep::TableExists.to_string(), "table_exists");
        assert_eq!(LoadStep::DeleteRows.to_string(), "delete_rows");
    }
}
