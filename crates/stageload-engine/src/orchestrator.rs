//! Load orchestrator: stages fetched data and applies a table's load strategy.
//!
//! One `process_table` call runs strictly in order:
//!
//! 1. check whether the target table exists,
//! 2. create a uniquely named staging object,
//! 3. let the data source fill it,
//! 4. dispatch on the table's [`LoadStrategy`].
//!
//! The first collaborator error aborts the call. Completed warehouse steps
//! are not undone; only the invocation's staging object and temp table are
//! cleaned up on the way out.

use std::sync::Arc;

use chrono::NaiveDate;
use stageload_types::identity::DEFAULT_IDENTITY_FIELD;
use stageload_types::{ClientIdentity, DateRange, Environment, LoadStrategy, TableSpec};

use crate::errors::{LoadError, LoadStep};
use crate::result::LoadReport;
use crate::staging::{ephemeral_name, StagedObject, TempTable};
use crate::warehouse::{CopyOptions, DataSource, MergeKeys, ObjectStore, TableRef, Warehouse};
use crate::window::DeleteWindowResolver;

/// Drives staged loads against one dataset on behalf of one client.
pub struct LoadOrchestrator {
    dataset: String,
    environment: Environment,
    identity: Option<ClientIdentity>,
    resolver: DeleteWindowResolver,
    warehouse: Arc<dyn Warehouse>,
    object_store: Arc<dyn ObjectStore>,
}

/// Builder for [`LoadOrchestrator`]; required parts are checked in
/// [`build`](Self::build).
#[derive(Default)]
pub struct LoadOrchestratorBuilder {
    dataset: Option<String>,
    environment: Environment,
    identity: Option<ClientIdentity>,
    identity_field: Option<String>,
    warehouse: Option<Arc<dyn Warehouse>>,
    object_store: Option<Arc<dyn ObjectStore>>,
}

impl LoadOrchestratorBuilder {
    #[must_use]
    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Client whose rows deletes and merges are scoped to.
    #[must_use]
    pub fn identity(mut self, identity: Option<ClientIdentity>) -> Self {
        self.identity = identity;
        self
    }

    /// Column holding the client key. Defaults to
    /// [`DEFAULT_IDENTITY_FIELD`].
    #[must_use]
    pub fn identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn warehouse(mut self, warehouse: Arc<dyn Warehouse>) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    #[must_use]
    pub fn object_store(mut self, object_store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(object_store);
        self
    }

    /// # Errors
    ///
    /// Returns [`LoadError::Config`] if the dataset, warehouse, or object
    /// store is missing, or the dataset or identity field is blank.
    pub fn build(self) -> Result<LoadOrchestrator, LoadError> {
        let dataset = self
            .dataset
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| LoadError::Config("dataset is required".into()))?;
        let warehouse = self
            .warehouse
            .ok_or_else(|| LoadError::Config("warehouse is required".into()))?;
        let object_store = self
            .object_store
            .ok_or_else(|| LoadError::Config("object store is required".into()))?;
        let identity_field = self
            .identity_field
            .unwrap_or_else(|| DEFAULT_IDENTITY_FIELD.to_string());
        if identity_field.trim().is_empty() {
            return Err(LoadError::Config("identity field must not be blank".into()));
        }

        Ok(LoadOrchestrator {
            dataset,
            environment: self.environment,
            identity: self.identity,
            resolver: DeleteWindowResolver::new(identity_field),
            warehouse,
            object_store,
        })
    }
}

impl LoadOrchestrator {
    #[must_use]
    pub fn builder() -> LoadOrchestratorBuilder {
        LoadOrchestratorBuilder::default()
    }

    /// Dataset name after the environment suffix is applied.
    #[must_use]
    pub fn effective_dataset(&self) -> String {
        self.environment.apply(&self.dataset)
    }

    /// Load `source`'s table for `start..=end`; missing bounds default to
    /// tomorrow (local time).
    ///
    /// # Errors
    ///
    /// See [`process_range`](Self::process_range).
    pub fn process_table(
        &self,
        source: &dyn DataSource,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<LoadReport, LoadError> {
        let today = chrono::Local::now().date_naive();
        self.process_range(source, &DateRange::resolve(start, end, today))
    }

    /// Load `source`'s table for `window`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Config`] if the table spec is invalid, before any
    /// collaborator is called, and [`LoadError::Step`] for the first
    /// collaborator failure.
    pub fn process_range(
        &self,
        source: &dyn DataSource,
        window: &DateRange,
    ) -> Result<LoadReport, LoadError> {
        let spec = source.table();
        spec.validate()
            .map_err(|e| LoadError::Config(e.to_string()))?;
        let name = spec.name.as_str();

        let target = TableRef::new(self.effective_dataset(), name, spec.schema.clone());
        let target_existed = self
            .warehouse
            .table_exists(&target)
            .map_err(LoadError::at(name, LoadStep::TableExists))?;

        let staged = StagedObject::create(
            self.object_store.as_ref(),
            &self.environment.apply(name),
        )
        .map_err(LoadError::at(name, LoadStep::Stage))?;

        let rows = source
            .fetch_and_stage(staged.handle(), self.identity.as_ref(), window)
            .map_err(LoadError::at(name, LoadStep::Fetch))?;

        tracing::debug!(
            table = name,
            target = %target,
            target_existed,
            rows,
            window = %window,
            "Staged source data"
        );

        let mut report = LoadReport::new(
            name,
            target.qualified_name(),
            spec.strategy.as_ref().map(LoadStrategy::name),
            target_existed,
            rows,
        );

        match &spec.strategy {
            None => {
                tracing::debug!(table = name, "No load strategy, leaving target untouched");
            }
            Some(LoadStrategy::Merge {
                join_fields,
                do_not_update_fields,
            }) => {
                if rows > 0 {
                    let keys = self.merge_keys(join_fields, do_not_update_fields);
                    self.merge(spec, staged, &target, target_existed, &keys, &mut report)?;
                }
            }
            Some(strategy @ (LoadStrategy::Append | LoadStrategy::Replace { .. })) => {
                let objects = if rows > 0 { vec![staged] } else { Vec::new() };
                if let LoadStrategy::Replace { filters } = strategy {
                    if target_existed {
                        report.deleted_window =
                            self.delete_window(name, &target, filters.where_string().as_deref())?;
                    }
                }
                report.objects_copied = self.copy_all(name, objects, &target, false)?;
            }
            Some(LoadStrategy::Truncate) => {
                let objects = if rows > 0 { vec![staged] } else { Vec::new() };
                report.objects_copied = self.copy_all(name, objects, &target, true)?;
            }
        }

        tracing::debug!(
            table = name,
            copied = report.objects_copied,
            merged = report.merged,
            "Load finished"
        );
        Ok(report)
    }

    /// Join fields plus the identity field, without duplicates.
    fn merge_keys(&self, join_fields: &[String], do_not_update: &[String]) -> MergeKeys {
        let mut fields = join_fields.to_vec();
        let identity_field = self.resolver.identity_field();
        if !fields.iter().any(|f| f == identity_field) {
            fields.push(identity_field.to_string());
        }
        MergeKeys {
            join_fields: fields,
            exclude_from_update: do_not_update.to_vec(),
        }
    }

    /// Copy into a temp table and merge it into an existing target; copy
    /// straight into the target when there is nothing to merge against.
    fn merge(
        &self,
        spec: &TableSpec,
        staged: StagedObject<'_>,
        target: &TableRef,
        target_existed: bool,
        keys: &MergeKeys,
        report: &mut LoadReport,
    ) -> Result<(), LoadError> {
        let name = spec.name.as_str();

        if !target_existed {
            self.copy(name, staged, target, false)?;
            report.objects_copied = 1;
            return Ok(());
        }

        let temp_ref = TableRef::new(
            target.dataset.clone(),
            ephemeral_name(name),
            spec.schema.clone(),
        );
        self.copy(name, staged, &temp_ref, false)?;
        report.objects_copied = 1;
        let temp = TempTable::adopt(self.warehouse.as_ref(), temp_ref);

        self.warehouse
            .merge(temp.table(), target, keys, false)
            .map_err(LoadError::at(name, LoadStep::Merge))?;
        report.merged = true;

        temp.delete()
            .map_err(LoadError::at(name, LoadStep::DeleteTable))
    }

    /// Delete the replace window from `target`. Returns the predicate used,
    /// or `None` when no window filter is configured and the delete was
    /// skipped.
    fn delete_window(
        &self,
        name: &str,
        target: &TableRef,
        table_filter: Option<&str>,
    ) -> Result<Option<String>, LoadError> {
        let verbose = !self.environment.is_production();

        let Some(predicate) = self.resolver.resolve(self.identity.as_ref(), table_filter) else {
            if verbose {
                tracing::info!(table = name, "No delete filter, skipping delete");
            }
            return Ok(None);
        };

        if verbose {
            tracing::info!(table = name, predicate = %predicate, "Deleting replace window");
        }
        self.warehouse
            .delete(target, &predicate)
            .map_err(LoadError::at(name, LoadStep::DeleteRows))?;
        Ok(Some(predicate))
    }

    /// Copy each object into `target`; with `truncate_first`, only the first
    /// copy truncates. Returns the number of objects copied.
    fn copy_all(
        &self,
        name: &str,
        objects: Vec<StagedObject<'_>>,
        target: &TableRef,
        truncate_first: bool,
    ) -> Result<usize, LoadError> {
        let mut copied = 0;
        for (i, object) in objects.into_iter().enumerate() {
            self.copy(name, object, target, truncate_first && i == 0)?;
            copied += 1;
        }
        Ok(copied)
    }

    fn copy(
        &self,
        name: &str,
        object: StagedObject<'_>,
        target: &TableRef,
        truncate: bool,
    ) -> Result<(), LoadError> {
        self.warehouse
            .copy_object_to_table(
                object.handle(),
                target,
                CopyOptions {
                    truncate,
                    delete_object_after: true,
                },
            )
            .map_err(LoadError::at(name, LoadStep::Copy))?;
        object.release();
        Ok(())
    }
}
