//! Delete-window resolution for replace loads.

use stageload_types::identity::DEFAULT_IDENTITY_FIELD;
use stageload_types::ClientIdentity;

/// Predicate used when no identity scopes the delete.
const UNSCOPED: &str = "1 = 1";

/// Combines the tenant scope with a table's replace window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteWindowResolver {
    identity_field: String,
}

impl Default for DeleteWindowResolver {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_FIELD)
    }
}

impl DeleteWindowResolver {
    #[must_use]
    pub fn new(identity_field: impl Into<String>) -> Self {
        Self {
            identity_field: identity_field.into(),
        }
    }

    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// `<scope> AND <table_filter>`, where scope is the identity predicate or
    /// `1 = 1`.
    ///
    /// Fails closed: without a table filter there is no window, and `None` is
    /// returned instead of a predicate covering every row in scope.
    #[must_use]
    pub fn resolve(
        &self,
        identity: Option<&ClientIdentity>,
        table_filter: Option<&str>,
    ) -> Option<String> {
        let table_filter = table_filter?;
        let scope = identity.map_or_else(
            || UNSCOPED.to_string(),
            |id| id.scope_predicate(&self.identity_field),
        );
        Some(format!("{scope} AND {table_filter}"))
    }
}
