use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use stageload_engine::config::{parser, validator};
use stageload_engine::recording::{CallLog, MemoryObjectStore, RecordingWarehouse, StaticSource};
use stageload_engine::LoadOrchestrator;
use stageload_types::ClientIdentity;

/// Arguments of the `plan` command.
pub struct PlanArgs {
    pub tables_path: PathBuf,
    pub table: String,
    pub target_exists: bool,
    pub rows: u64,
    pub identity: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Execute the `plan` command: dry-run one table load against recording
/// collaborators and print every call it would make.
pub fn execute(args: &PlanArgs) -> Result<()> {
    let config = parser::parse_config(&args.tables_path).with_context(|| {
        format!(
            "Failed to parse tables file: {}",
            args.tables_path.display()
        )
    })?;
    validator::validate_config(&config)?;

    let spec = config
        .table(&args.table)
        .with_context(|| format!("Table '{}' not found in tables file", args.table))?
        .clone();
    let environment = config.effective_environment()?;
    let identity = args
        .identity
        .clone()
        .map(ClientIdentity::new)
        .or_else(|| config.identity.clone());

    let log = CallLog::default();
    let mut warehouse = RecordingWarehouse::new(log.clone());
    if args.target_exists {
        warehouse = warehouse.with_table(format!(
            "{}.{}",
            environment.apply(&config.dataset),
            spec.name
        ));
    }

    let orchestrator = LoadOrchestrator::builder()
        .dataset(config.dataset.clone())
        .environment(environment)
        .identity(identity)
        .identity_field(config.identity_field.clone())
        .warehouse(Arc::new(warehouse))
        .object_store(Arc::new(MemoryObjectStore::new(log.clone())))
        .build()?;

    let source = StaticSource::new(spec, args.rows).with_log(log.clone());
    let report = orchestrator.process_table(&source, args.start, args.end)?;

    println!(
        "Plan for {} ({}, target {}, {} rows):",
        report.table,
        report.strategy.unwrap_or("stage only"),
        if report.target_existed {
            "exists"
        } else {
            "absent"
        },
        report.rows_staged
    );
    for (i, call) in log.calls().iter().enumerate() {
        println!("  {:>2}. {call}", i + 1);
    }
    if !report.mutated() {
        println!("\nTarget table would not be modified.");
    }
    Ok(())
}
