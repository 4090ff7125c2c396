//! In-memory collaborators that record every call.
//!
//! Backs `stageload plan` dry runs and the orchestrator tests. Calls from all
//! collaborators sharing a [`CallLog`] land in one ordered list, so the full
//! sequence of a load can be asserted or printed.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::bail;
use stageload_types::{ClientIdentity, DateRange, TableSpec};

use crate::warehouse::{
    CopyOptions, DataSource, MergeKeys, ObjectHandle, ObjectStore, TableRef, Warehouse,
};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    TableExists {
        table: String,
    },
    CreateObject {
        name: String,
        content_type: String,
    },
    Fetch {
        object: String,
        identity: Option<String>,
        window: DateRange,
    },
    Copy {
        object: String,
        table: String,
        truncate: bool,
        delete_object_after: bool,
    },
    Merge {
        source: String,
        target: String,
        join_fields: Vec<String>,
        exclude_from_update: Vec<String>,
        full_replace: bool,
    },
    DeleteTable {
        table: String,
    },
    Delete {
        table: String,
        predicate: String,
    },
    DeleteObject {
        name: String,
    },
}

/// Discriminant of [`Call`], used for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    TableExists,
    CreateObject,
    Fetch,
    Copy,
    Merge,
    DeleteTable,
    Delete,
    DeleteObject,
}

impl Call {
    #[must_use]
    pub fn kind(&self) -> CallKind {
        match self {
            Self::TableExists { .. } => CallKind::TableExists,
            Self::CreateObject { .. } => CallKind::CreateObject,
            Self::Fetch { .. } => CallKind::Fetch,
            Self::Copy { .. } => CallKind::Copy,
            Self::Merge { .. } => CallKind::Merge,
            Self::DeleteTable { .. } => CallKind::DeleteTable,
            Self::Delete { .. } => CallKind::Delete,
            Self::DeleteObject { .. } => CallKind::DeleteObject,
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableExists { table } => write!(f, "table_exists {table}"),
            Self::CreateObject { name, content_type } => {
                write!(f, "create_object {name} ({content_type})")
            }
            Self::Fetch {
                object,
                identity,
                window,
            } => write!(
                f,
                "fetch_and_stage {object} identity={} window={window}",
                identity.as_deref().unwrap_or("-")
            ),
            Self::Copy {
                object,
                table,
                truncate,
                delete_object_after,
            } => write!(
                f,
                "copy {object} -> {table} truncate={truncate} delete_object={delete_object_after}"
            ),
            Self::Merge {
                source,
                target,
                join_fields,
                exclude_from_update,
                full_replace,
            } => write!(
                f,
                "merge {source} -> {target} on [{}] exclude [{}] full_replace={full_replace}",
                join_fields.join(", "),
                exclude_from_update.join(", ")
            ),
            Self::DeleteTable { table } => write!(f, "delete_table {table}"),
            Self::Delete { table, predicate } => write!(f, "delete {table} WHERE {predicate}"),
            Self::DeleteObject { name } => write!(f, "delete_object {name}"),
        }
    }
}

/// Shared, ordered call log.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Snapshot of every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn count(&self, kind: CallKind) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    /// Calls of one kind, in order.
    #[must_use]
    pub fn of_kind(&self, kind: CallKind) -> Vec<Call> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.kind() == kind)
            .cloned()
            .collect()
    }
}

fn check_fault(failing: &HashSet<CallKind>, kind: CallKind) -> anyhow::Result<()> {
    if failing.contains(&kind) {
        bail!("injected {kind:?} failure");
    }
    Ok(())
}

/// Warehouse that tracks table existence in memory.
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    log: CallLog,
    tables: Mutex<HashSet<String>>,
    failing: HashSet<CallKind>,
}

impl RecordingWarehouse {
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Mark `dataset.table` as existing.
    #[must_use]
    pub fn with_table(self, qualified_name: impl Into<String>) -> Self {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(qualified_name.into());
        self
    }

    /// Fail every call of `kind` after recording it.
    #[must_use]
    pub fn fail_on(mut self, kind: CallKind) -> Self {
        self.failing.insert(kind);
        self
    }

    #[must_use]
    pub fn has_table(&self, qualified_name: &str) -> bool {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(qualified_name)
    }

    fn set_exists(&self, qualified_name: String, exists: bool) {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if exists {
            tables.insert(qualified_name);
        } else {
            tables.remove(&qualified_name);
        }
    }
}

impl Warehouse for RecordingWarehouse {
    fn table_exists(&self, table: &TableRef) -> anyhow::Result<bool> {
        self.log.push(Call::TableExists {
            table: table.qualified_name(),
        });
        check_fault(&self.failing, CallKind::TableExists)?;
        Ok(self.has_table(&table.qualified_name()))
    }

    fn copy_object_to_table(
        &self,
        object: &ObjectHandle,
        target: &TableRef,
        options: CopyOptions,
    ) -> anyhow::Result<()> {
        self.log.push(Call::Copy {
            object: object.name.clone(),
            table: target.qualified_name(),
            truncate: options.truncate,
            delete_object_after: options.delete_object_after,
        });
        check_fault(&self.failing, CallKind::Copy)?;
        self.set_exists(target.qualified_name(), true);
        Ok(())
    }

    fn merge(
        &self,
        source: &TableRef,
        target: &TableRef,
        keys: &MergeKeys,
        full_replace: bool,
    ) -> anyhow::Result<()> {
        self.log.push(Call::Merge {
            source: source.qualified_name(),
            target: target.qualified_name(),
            join_fields: keys.join_fields.clone(),
            exclude_from_update: keys.exclude_from_update.clone(),
            full_replace,
        });
        check_fault(&self.failing, CallKind::Merge)
    }

    fn delete_table(&self, table: &TableRef) -> anyhow::Result<()> {
        self.log.push(Call::DeleteTable {
            table: table.qualified_name(),
        });
        check_fault(&self.failing, CallKind::DeleteTable)?;
        self.set_exists(table.qualified_name(), false);
        Ok(())
    }

    fn delete(&self, table: &TableRef, predicate: &str) -> anyhow::Result<()> {
        self.log.push(Call::Delete {
            table: table.qualified_name(),
            predicate: predicate.to_string(),
        });
        check_fault(&self.failing, CallKind::Delete)
    }
}

/// Object store that only records handles.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    log: CallLog,
    failing: HashSet<CallKind>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failing: HashSet::new(),
        }
    }

    #[must_use]
    pub fn fail_on(mut self, kind: CallKind) -> Self {
        self.failing.insert(kind);
        self
    }
}

impl ObjectStore for MemoryObjectStore {
    fn create(&self, name: &str, content_type: &str) -> anyhow::Result<ObjectHandle> {
        self.log.push(Call::CreateObject {
            name: name.to_string(),
            content_type: content_type.to_string(),
        });
        check_fault(&self.failing, CallKind::CreateObject)?;
        Ok(ObjectHandle {
            name: name.to_string(),
            content_type: content_type.to_string(),
        })
    }

    fn delete(&self, object: &ObjectHandle) -> anyhow::Result<()> {
        self.log.push(Call::DeleteObject {
            name: object.name.clone(),
        });
        check_fault(&self.failing, CallKind::DeleteObject)
    }
}

/// Source that reports a fixed row count without writing anything.
#[derive(Debug)]
pub struct StaticSource {
    table: TableSpec,
    rows: u64,
    log: Option<CallLog>,
    failure: Option<String>,
}

impl StaticSource {
    #[must_use]
    pub fn new(table: TableSpec, rows: u64) -> Self {
        Self {
            table,
            rows,
            log: None,
            failure: None,
        }
    }

    /// Record fetches in `log`.
    #[must_use]
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Fail every fetch with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

impl DataSource for StaticSource {
    fn table(&self) -> &TableSpec {
        &self.table
    }

    fn fetch_and_stage(
        &self,
        object: &ObjectHandle,
        identity: Option<&ClientIdentity>,
        window: &DateRange,
    ) -> anyhow::Result<u64> {
        if let Some(log) = &self.log {
            log.push(Call::Fetch {
                object: object.name.clone(),
                identity: identity.map(|id| id.key().to_string()),
                window: *window,
            });
        }
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(self.rows)
    }
}
