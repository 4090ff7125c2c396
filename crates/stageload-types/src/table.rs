//! Target table description and load strategy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::ReplaceFilter;

/// Partitioning hint for a table. Informational only; the loader never
/// derives behavior from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    None,
    Day,
    Week,
    Month,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        };
        f.write_str(s)
    }
}

/// Opaque schema descriptor, handed unchanged to the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema(serde_json::Value);

impl TableSchema {
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// No schema at all. Any other value, `{}` included, is passed through.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

/// How staged rows land in the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Add rows; never delete.
    Append,
    /// Delete the configured window, then add rows.
    Replace {
        #[serde(default)]
        filters: ReplaceFilter,
    },
    /// Upsert through a temp table keyed on `join_fields`.
    Merge {
        join_fields: Vec<String>,
        #[serde(default)]
        do_not_update_fields: Vec<String>,
    },
    /// Empty the table and reload it.
    Truncate,
}

impl LoadStrategy {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Replace { .. } => "replace",
            Self::Merge { .. } => "merge",
            Self::Truncate => "truncate",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A table spec that cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid table spec '{table}': {}", .problems.join("; "))]
pub struct InvalidTableSpec {
    pub table: String,
    pub problems: Vec<String>,
}

/// A warehouse table and its load contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    #[serde(default)]
    pub granularity: Granularity,
    pub schema: TableSchema,
    /// `None` stages data without touching the warehouse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<LoadStrategy>,
}

impl TableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            name: name.into(),
            granularity: Granularity::None,
            schema,
            strategy: None,
        }
    }

    #[must_use]
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Rendered replace window, if this is a replace table with a non-empty
    /// filter.
    #[must_use]
    pub fn replace_window(&self) -> Option<String> {
        match &self.strategy {
            Some(LoadStrategy::Replace { filters }) => filters.where_string(),
            _ => None,
        }
    }

    /// Check this table can be loaded, reporting every problem at once.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTableSpec`] if the name is blank, the schema is
    /// null, or a merge field list contains blank entries. An empty
    /// `join_fields` is allowed; the merge then keys on the identity field.
    pub fn validate(&self) -> Result<(), InvalidTableSpec> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name must not be empty".to_string());
        }
        if self.schema.is_null() {
            problems.push("schema must not be null".to_string());
        }
        if let Some(LoadStrategy::Merge {
            join_fields,
            do_not_update_fields,
        }) = &self.strategy
        {
            if join_fields.iter().any(|f| f.trim().is_empty()) {
                problems.push("merge join fields must not be blank".to_string());
            }
            if do_not_update_fields.iter().any(|f| f.trim().is_empty()) {
                problems.push("merge do_not_update_fields must not be blank".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(InvalidTableSpec {
                table: self.name.clone(),
                problems,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterClause;

    fn schema() -> TableSchema {
        TableSchema::new(serde_json::json!({"fields": [{"name": "id", "type": "STRING"}]}))
    }

    #[test]
    fn strategy_uses_mode_tag() {
        let strategy = LoadStrategy::Merge {
            join_fields: vec!["id".into()],
            do_not_update_fields: vec![],
        };
        let json = serde_json::to_value(&strategy).unwrap();
        assert_eq!(json["mode"], "merge");
        assert_eq!(json["join_fields"], serde_json::json!(["id"]));
    }

    #[test]
    fn unit_strategies_parse_from_tag_only() {
        let append: LoadStrategy =
            serde_json::from_value(serde_json::json!({"mode": "append"})).unwrap();
        let truncate: LoadStrategy =
            serde_json::from_value(serde_json::json!({"mode": "truncate"})).unwrap();
        assert_eq!(append, LoadStrategy::Append);
        assert_eq!(truncate, LoadStrategy::Truncate);
    }

    #[test]
    fn replace_without_filters_defaults_to_empty_window() {
        let strategy: LoadStrategy =
            serde_json::from_value(serde_json::json!({"mode": "replace"})).unwrap();
        assert_eq!(
            strategy,
            LoadStrategy::Replace {
                filters: ReplaceFilter::default()
            }
        );
    }

    #[test]
    fn spec_without_strategy_is_a_noop_load() {
        let spec: TableSpec = serde_json::from_value(serde_json::json!({
            "name": "orders",
            "schema": {"fields": []}
        }))
        .unwrap();
        assert_eq!(spec.strategy, None);
        assert_eq!(spec.granularity, Granularity::None);
    }

    #[test]
    fn spec_requires_schema_key() {
        let result: Result<TableSpec, _> =
            serde_json::from_value(serde_json::json!({"name": "orders"}));
        assert!(result.is_err());
    }

    #[test]
    fn replace_window_renders_filters() {
        let spec = TableSpec::new("orders", schema()).with_strategy(LoadStrategy::Replace {
            filters: ReplaceFilter::new(vec![FilterClause::raw("date = '2024-01-01'")]),
        });
        assert_eq!(spec.replace_window().as_deref(), Some("date = '2024-01-01'"));
    }

    #[test]
    fn append_has_no_replace_window() {
        let spec = TableSpec::new("orders", schema()).with_strategy(LoadStrategy::Append);
        assert_eq!(spec.replace_window(), None);
    }

    #[test]
    fn validate_accepts_well_formed_spec() {
        let spec = TableSpec::new("orders", schema())
            .with_granularity(Granularity::Day)
            .with_strategy(LoadStrategy::Truncate);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn validate_reports_all_problems() {
        let spec = TableSpec::new("  ", TableSchema::new(serde_json::Value::Null)).with_strategy(
            LoadStrategy::Merge {
                join_fields: vec![" ".into()],
                do_not_update_fields: vec![" ".into()],
            },
        );
        let err = spec.validate().unwrap_err();
        assert_eq!(err.problems.len(), 4, "got: {err}");
        assert!(err.to_string().contains("schema must not be null"));
    }

    #[test]
    fn merge_without_join_fields_is_valid() {
        let spec = TableSpec::new("orders", schema()).with_strategy(LoadStrategy::Merge {
            join_fields: vec![],
            do_not_update_fields: vec![],
        });
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn empty_schema_object_is_passed_through() {
        for value in [serde_json::json!({}), serde_json::json!([])] {
            let spec = TableSpec::new("orders", TableSchema::new(value))
                .with_strategy(LoadStrategy::Append);
            assert!(spec.validate().is_ok());
        }
    }

    #[test]
    fn granularity_display() {
        assert_eq!(Granularity::Week.to_string(), "week");
        assert_eq!(Granularity::default().to_string(), "none");
    }
}
