//! Collaborator contracts the orchestrator drives.
//!
//! [`Warehouse`] executes table operations, [`ObjectStore`] owns staging
//! blobs, and [`DataSource`] fills a staging blob with fetched records. All
//! three are blocking and must be `Send + Sync` so one instance can be shared
//! as `Arc<dyn …>` by invocations running on different threads.

use std::fmt;

use stageload_types::{ClientIdentity, DateRange, TableSchema, TableSpec};

/// A table inside a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
    pub schema: TableSchema,
}

impl TableRef {
    #[must_use]
    pub fn new(dataset: impl Into<String>, table: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
            schema,
        }
    }

    /// `dataset.table`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.dataset, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// Handle to a blob in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub name: String,
    pub content_type: String,
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Flags for [`Warehouse::copy_object_to_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    /// Empty the target before loading.
    pub truncate: bool,
    /// Delete the object once its rows are loaded.
    pub delete_object_after: bool,
}

/// Keys for [`Warehouse::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeKeys {
    /// Columns a source row is matched on.
    pub join_fields: Vec<String>,
    /// Columns left untouched when a matched row is updated.
    pub exclude_from_update: Vec<String>,
}

/// Warehouse operations.
pub trait Warehouse: Send + Sync {
    /// # Errors
    ///
    /// Returns the warehouse error if the lookup fails.
    fn table_exists(&self, table: &TableRef) -> anyhow::Result<bool>;

    /// Load the rows in `object` into `target`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the warehouse error if the load job fails.
    fn copy_object_to_table(
        &self,
        object: &ObjectHandle,
        target: &TableRef,
        options: CopyOptions,
    ) -> anyhow::Result<()>;

    /// Upsert `source` into `target`. With `full_replace`, target rows
    /// missing from `source` are removed as well.
    ///
    /// # Errors
    ///
    /// Returns the warehouse error if the merge statement fails.
    fn merge(
        &self,
        source: &TableRef,
        target: &TableRef,
        keys: &MergeKeys,
        full_replace: bool,
    ) -> anyhow::Result<()>;

    /// # Errors
    ///
    /// Returns the warehouse error if the table cannot be dropped.
    fn delete_table(&self, table: &TableRef) -> anyhow::Result<()>;

    /// Delete the rows of `table` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns the warehouse error if the delete statement fails.
    fn delete(&self, table: &TableRef, predicate: &str) -> anyhow::Result<()>;
}

/// Staging blob storage.
pub trait ObjectStore: Send + Sync {
    /// # Errors
    ///
    /// Returns the store error if the handle cannot be created.
    fn create(&self, name: &str, content_type: &str) -> anyhow::Result<ObjectHandle>;

    /// # Errors
    ///
    /// Returns the store error if the object cannot be removed.
    fn delete(&self, object: &ObjectHandle) -> anyhow::Result<()>;
}

/// Fetches records for one table and writes them to a staging object.
pub trait DataSource: Send + Sync {
    /// The table this source loads.
    fn table(&self) -> &TableSpec;

    /// Write the records for `window` into `object` and return how many were
    /// written. Zero is a valid outcome.
    ///
    /// # Errors
    ///
    /// Returns the source error if fetching or writing fails.
    fn fetch_and_stage(
        &self,
        object: &ObjectHandle,
        identity: Option<&ClientIdentity>,
        window: &DateRange,
    ) -> anyhow::Result<u64>;
}
