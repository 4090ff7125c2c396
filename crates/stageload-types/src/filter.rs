//! Deletion-predicate fragments and the filter builder.
//!
//! A [`ReplaceFilter`] is the window a replace-load deletes before copying
//! fresh rows in. It is an immutable, ordered list of [`FilterClause`]s;
//! every `with_*` call consumes the filter and returns the extended one, so a
//! filter shared between table specs can never be mutated behind their back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Joiner between surviving clauses.
const AND: &str = " AND ";

/// One fragment of a deletion predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterClause {
    /// Expression emitted verbatim.
    Raw {
        /// SQL boolean expression.
        raw: String,
    },
    /// `<field> <operator> <value>` triple.
    Structured {
        /// Column name.
        field: String,
        /// Comparison operator; empty means `=`.
        #[serde(default)]
        operator: String,
        /// Right-hand side, already quoted as SQL.
        value: String,
    },
}

impl FilterClause {
    /// Raw clause, emitted as-is.
    #[must_use]
    pub fn raw(expression: impl Into<String>) -> Self {
        Self::Raw {
            raw: expression.into(),
        }
    }

    /// Structured `field operator value` clause.
    #[must_use]
    pub fn structured(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Structured {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Render this clause, or `None` when a structured clause has an empty
    /// field or value after trimming.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Raw { raw } => Some(raw.clone()),
            Self::Structured {
                field,
                operator,
                value,
            } => {
                let field = field.trim();
                let value = value.trim();
                if field.is_empty() || value.is_empty() {
                    return None;
                }
                let operator = match operator.trim() {
                    "" => "=",
                    op => op,
                };
                Some(format!("{field} {operator} {value}"))
            }
        }
    }
}

/// Build a predicate from ordered clauses.
///
/// Returns `None` when `clauses` is empty or every clause was dropped.
#[must_use]
pub fn build(clauses: &[FilterClause]) -> Option<String> {
    let rendered: Vec<String> = clauses.iter().filter_map(FilterClause::render).collect();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join(AND))
    }
}

/// Window filter for the replace strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplaceFilter {
    clauses: Vec<FilterClause>,
}

impl ReplaceFilter {
    /// Filter over the given clauses, in order.
    #[must_use]
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    /// Filter matching every row (`1 = 1`).
    ///
    /// Use this to opt into deleting the whole identity scope; an empty
    /// filter deletes nothing.
    #[must_use]
    pub fn dummy() -> Self {
        Self::default().with_where("1", "=", "1")
    }

    #[must_use]
    pub fn with(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    #[must_use]
    pub fn with_raw(self, expression: impl Into<String>) -> Self {
        self.with(FilterClause::raw(expression))
    }

    #[must_use]
    pub fn with_where(
        self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.with(FilterClause::structured(field, operator, value))
    }

    /// `field = 'YYYY-MM-DD'`.
    #[must_use]
    pub fn with_date(self, field: impl Into<String>, date: NaiveDate) -> Self {
        self.with_where(field, "=", format!("'{date}'"))
    }

    /// `field BETWEEN 'start' AND 'end'`.
    #[must_use]
    pub fn with_date_range(
        self,
        field: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        self.with_where(field, "BETWEEN", format!("'{start}' AND '{end}'"))
    }

    /// `field IN ('d1','d2',...)`. An empty `dates` slice adds no clause.
    #[must_use]
    pub fn with_dates(self, field: impl Into<String>, dates: &[NaiveDate]) -> Self {
        if dates.is_empty() {
            return self;
        }
        let list = dates
            .iter()
            .map(|d| format!("'{d}'"))
            .collect::<Vec<_>>()
            .join(",");
        self.with_where(field, "IN", format!("({list})"))
    }

    #[must_use]
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Rendered predicate; `None` if no clause survives.
    #[must_use]
    pub fn where_string(&self) -> Option<String> {
        build(&self.clauses)
    }
}

impl From<Vec<FilterClause>> for ReplaceFilter {
    fn from(clauses: Vec<FilterClause>) -> Self {
        Self::new(clauses)
    }
}
