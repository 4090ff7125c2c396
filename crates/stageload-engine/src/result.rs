//! Outcome of a successful load.

/// What one `process_table` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Logical table name.
    pub table: String,
    /// Qualified target, `dataset.table`.
    pub target: String,
    /// Strategy name, `None` for staging-only tables.
    pub strategy: Option<&'static str>,
    pub target_existed: bool,
    pub rows_staged: u64,
    /// Predicate of the replace delete, when one was issued.
    pub deleted_window: Option<String>,
    pub objects_copied: usize,
    pub merged: bool,
}

impl LoadReport {
    pub(crate) fn new(
        table: &str,
        target: String,
        strategy: Option<&'static str>,
        target_existed: bool,
        rows_staged: u64,
    ) -> Self {
        Self {
            table: table.to_string(),
            target,
            strategy,
            target_existed,
            rows_staged,
            deleted_window: None,
            objects_copied: 0,
            merged: false,
        }
    }

    /// Whether the warehouse was changed at all.
    #[must_use]
    pub fn mutated(&self) -> bool {
        self.deleted_window.is_some() || self.objects_copied > 0
    }
}
