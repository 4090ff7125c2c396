//! Invocation-scoped ephemeral resources.
//!
//! Each load owns one staging object and, for merges into an existing table,
//! one temp table. Both are named `<base>_<uuid v4>` and cleaned up when their
//! guard drops, unless the warehouse has already taken them over. Cleanup on
//! drop is best effort: failures are logged and never mask the load result.

use uuid::Uuid;

use crate::warehouse::{ObjectHandle, ObjectStore, TableRef, Warehouse};

/// Content type of every staging object: newline-delimited JSON records.
pub const STAGING_CONTENT_TYPE: &str = "application/json";

/// `<base>_<uuid>`. Collisions are not guarded against.
#[must_use]
pub fn ephemeral_name(base: &str) -> String {
    format!("{base}_{}", Uuid::new_v4())
}

/// Staging object owned by one load.
pub(crate) struct StagedObject<'a> {
    store: &'a dyn ObjectStore,
    handle: ObjectHandle,
    armed: bool,
}

impl<'a> StagedObject<'a> {
    /// Create a fresh, uniquely named staging object.
    pub(crate) fn create(store: &'a dyn ObjectStore, base: &str) -> anyhow::Result<Self> {
        let handle = store.create(&ephemeral_name(base), STAGING_CONTENT_TYPE)?;
        Ok(Self {
            store,
            handle,
            armed: true,
        })
    }

    pub(crate) fn handle(&self) -> &ObjectHandle {
        &self.handle
    }

    /// The warehouse deleted the object after copying it.
    pub(crate) fn release(mut self) {
        self.armed = false;
    }
}

impl Drop for StagedObject<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.store.delete(&self.handle) {
            Ok(()) => tracing::debug!(object = %self.handle, "Discarded staging object"),
            Err(e) => tracing::warn!(
                object = %self.handle,
                error = %e,
                "Failed to discard staging object"
            ),
        }
    }
}

/// Populated merge temp table owned by one load.
pub(crate) struct TempTable<'a> {
    warehouse: &'a dyn Warehouse,
    table: TableRef,
    armed: bool,
}

impl<'a> TempTable<'a> {
    /// Take ownership of a temp table that now exists in the warehouse.
    pub(crate) fn adopt(warehouse: &'a dyn Warehouse, table: TableRef) -> Self {
        Self {
            warehouse,
            table,
            armed: true,
        }
    }

    pub(crate) fn table(&self) -> &TableRef {
        &self.table
    }

    /// Drop the temp table now, surfacing any failure.
    pub(crate) fn delete(mut self) -> anyhow::Result<()> {
        self.armed = false;
        self.warehouse.delete_table(&self.table)
    }
}

impl Drop for TempTable<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.warehouse.delete_table(&self.table) {
            Ok(()) => tracing::debug!(table = %self.table, "Dropped abandoned temp table"),
            Err(e) => tracing::warn!(
                table = %self.table,
                error = %e,
                "Failed to drop abandoned temp table"
            ),
        }
    }
}
