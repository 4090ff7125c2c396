//! End-to-end load scenarios against recording collaborators.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rstest::rstest;
use stageload_engine::recording::{
    Call, CallKind, CallLog, MemoryObjectStore, RecordingWarehouse, StaticSource,
};
use stageload_engine::{LoadError, LoadOrchestrator, LoadStep};
use stageload_types::{
    ClientIdentity, DateRange, Environment, FilterClause, LoadStrategy, ReplaceFilter,
    TableSchema, TableSpec,
};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn window() -> DateRange {
    DateRange::new(date("2024-01-01"), date("2024-01-01"))
}

fn table(strategy: Option<LoadStrategy>) -> TableSpec {
    let spec = TableSpec::new(
        "orders",
        TableSchema::new(serde_json::json!({"fields": [{"name": "id", "type": "STRING"}]})),
    );
    match strategy {
        Some(s) => spec.with_strategy(s),
        None => spec,
    }
}

fn merge() -> LoadStrategy {
    LoadStrategy::Merge {
        join_fields: vec!["id".into()],
        do_not_update_fields: vec!["created_at".into()],
    }
}

fn replace(filter: ReplaceFilter) -> LoadStrategy {
    LoadStrategy::Replace { filters: filter }
}

struct Harness {
    log: CallLog,
    orchestrator: LoadOrchestrator,
}

impl Harness {
    fn new(target_exists: bool, identity: Option<&str>) -> Self {
        Self::with_warehouse(target_exists, identity, |w| w)
    }

    fn with_warehouse(
        target_exists: bool,
        identity: Option<&str>,
        customize: impl FnOnce(RecordingWarehouse) -> RecordingWarehouse,
    ) -> Self {
        let log = CallLog::default();
        let mut warehouse = RecordingWarehouse::new(log.clone());
        if target_exists {
            warehouse = warehouse.with_table("raw.orders");
        }
        let orchestrator = LoadOrchestrator::builder()
            .dataset("raw")
            .identity(identity.map(ClientIdentity::new))
            .warehouse(Arc::new(customize(warehouse)))
            .object_store(Arc::new(MemoryObjectStore::new(log.clone())))
            .build()
            .expect("orchestrator must build");
        Self { log, orchestrator }
    }

    fn run(
        &self,
        strategy: Option<LoadStrategy>,
        rows: u64,
    ) -> Result<stageload_engine::LoadReport, LoadError> {
        let source = StaticSource::new(table(strategy), rows).with_log(self.log.clone());
        self.orchestrator.process_range(&source, &window())
    }

    /// Warehouse-side calls only, excluding the existence check.
    fn mutations(&self) -> Vec<Call> {
        self.log
            .calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c.kind(),
                    CallKind::Copy | CallKind::Merge | CallKind::DeleteTable | CallKind::Delete
                )
            })
            .collect()
    }
}

#[test]
fn scenario_a_merge_into_absent_target_copies_directly() {
    let h = Harness::new(false, Some("abc"));
    let report = h.run(Some(merge()), 10).unwrap();

    let mutations = h.mutations();
    assert_eq!(mutations.len(), 1, "got: {mutations:?}");
    match &mutations[0] {
        Call::Copy {
            table,
            truncate,
            delete_object_after,
            ..
        } => {
            assert_eq!(table, "raw.orders");
            assert!(!truncate);
            assert!(delete_object_after);
        }
        other => panic!("expected copy, got {other:?}"),
    }
    assert!(!report.merged);
    assert_eq!(report.objects_copied, 1);
    assert!(!report.target_existed);
}

#[test]
fn scenario_b_replace_deletes_window_then_copies() {
    let h = Harness::new(true, Some("abc"));
    let filter = ReplaceFilter::new(vec![FilterClause::raw("date = '2024-01-01'")]);
    let report = h.run(Some(replace(filter)), 5).unwrap();

    let mutations = h.mutations();
    assert_eq!(mutations.len(), 2, "got: {mutations:?}");
    assert_eq!(
        mutations[0],
        Call::Delete {
            table: "raw.orders".into(),
            predicate: "SoftwareClientLicenseGuid_ = 'abc' AND date = '2024-01-01'".into(),
        }
    );
    assert!(matches!(
        &mutations[1],
        Call::Copy { table, truncate: false, .. } if table == "raw.orders"
    ));
    assert_eq!(
        report.deleted_window.as_deref(),
        Some("SoftwareClientLicenseGuid_ = 'abc' AND date = '2024-01-01'")
    );
}

#[test]
fn scenario_c_replace_without_window_skips_delete() {
    let h = Harness::new(true, Some("abc"));
    let report = h.run(Some(replace(ReplaceFilter::default())), 5).unwrap();

    assert_eq!(h.log.count(CallKind::Delete), 0);
    assert_eq!(h.log.count(CallKind::Copy), 1);
    assert_eq!(report.deleted_window, None);
}

#[test]
fn replace_with_only_dropped_clauses_skips_delete() {
    let h = Harness::new(true, None);
    let filter = ReplaceFilter::default().with_where("", "=", "1");
    h.run(Some(replace(filter)), 5).unwrap();
    assert_eq!(h.log.count(CallKind::Delete), 0);
}

#[test]
fn replace_deletes_even_when_no_rows_fetched() {
    let h = Harness::new(true, None);
    let filter = ReplaceFilter::default().with_date("date", date("2024-01-01"));
    h.run(Some(replace(filter)), 0).unwrap();

    assert_eq!(
        h.mutations(),
        vec![Call::Delete {
            table: "raw.orders".into(),
            predicate: "1 = 1 AND date = '2024-01-01'".into(),
        }]
    );
}

#[test]
fn replace_into_absent_target_does_not_delete() {
    let h = Harness::new(false, Some("abc"));
    h.run(Some(replace(ReplaceFilter::dummy())), 3).unwrap();
    assert_eq!(h.log.count(CallKind::Delete), 0);
    assert_eq!(h.log.count(CallKind::Copy), 1);
}

#[test]
fn append_never_deletes() {
    let h = Harness::new(true, Some("abc"));
    let report = h.run(Some(LoadStrategy::Append), 4).unwrap();
    assert_eq!(h.log.count(CallKind::Delete), 0);
    assert_eq!(report.objects_copied, 1);
}

#[test]
fn merge_with_zero_rows_is_a_noop() {
    let h = Harness::new(true, Some("abc"));
    let report = h.run(Some(merge()), 0).unwrap();
    assert!(h.mutations().is_empty(), "got: {:?}", h.mutations());
    assert!(!report.mutated());
}

#[test]
fn merge_into_existing_target_uses_temp_table() {
    let h = Harness::new(true, Some("abc"));
    let report = h.run(Some(merge()), 7).unwrap();

    let mutations = h.mutations();
    assert_eq!(mutations.len(), 3, "got: {mutations:?}");

    let Call::Copy { table: temp, truncate: false, .. } = &mutations[0] else {
        panic!("expected copy first, got {:?}", mutations[0]);
    };
    assert!(temp.starts_with("raw.orders_"), "temp table: {temp}");
    assert_ne!(temp, "raw.orders");

    assert_eq!(
        mutations[1],
        Call::Merge {
            source: temp.clone(),
            target: "raw.orders".into(),
            join_fields: vec!["id".into(), "SoftwareClientLicenseGuid_".into()],
            exclude_from_update: vec!["created_at".into()],
            full_replace: false,
        }
    );
    assert_eq!(mutations[2], Call::DeleteTable { table: temp.clone() });
    assert!(report.merged);
}

#[test]
fn merge_without_join_fields_keys_on_identity_field() {
    let h = Harness::new(true, Some("abc"));
    let strategy = LoadStrategy::Merge {
        join_fields: vec![],
        do_not_update_fields: vec![],
    };
    let report = h.run(Some(strategy), 3).unwrap();

    let merges = h.log.of_kind(CallKind::Merge);
    assert_eq!(merges.len(), 1, "got: {:?}", h.log.calls());
    assert!(matches!(
        &merges[0],
        Call::Merge { join_fields, target, full_replace: false, .. }
            if join_fields == &vec!["SoftwareClientLicenseGuid_".to_string()]
                && target == "raw.orders"
    ));
    assert!(report.merged);
}

#[test]
fn empty_schema_object_is_handed_to_warehouse() {
    let h = Harness::new(true, None);
    let spec = TableSpec::new("orders", TableSchema::new(serde_json::json!({})))
        .with_strategy(LoadStrategy::Append);
    let source = StaticSource::new(spec, 2).with_log(h.log.clone());
    let report = h.orchestrator.process_range(&source, &window()).unwrap();
    assert_eq!(report.objects_copied, 1);
}

#[rstest]
#[case(Some(LoadStrategy::Append), 0)]
#[case(Some(LoadStrategy::Truncate), 0)]
#[case(Some(LoadStrategy::Append), 1)]
#[case(Some(LoadStrategy::Truncate), 1)]
#[case(None, 1)]
fn copies_only_when_rows_were_staged(#[case] strategy: Option<LoadStrategy>, #[case] rows: u64) {
    let h = Harness::new(true, None);
    let has_strategy = strategy.is_some();
    h.run(strategy, rows).unwrap();
    let expected = usize::from(has_strategy && rows > 0);
    assert_eq!(h.log.count(CallKind::Copy), expected);
}

#[test]
fn truncate_sets_truncate_flag() {
    let h = Harness::new(true, None);
    h.run(Some(LoadStrategy::Truncate), 3).unwrap();
    assert!(matches!(
        h.log.of_kind(CallKind::Copy).as_slice(),
        [Call::Copy { truncate: true, delete_object_after: true, .. }]
    ));
}

#[test]
fn no_strategy_stages_without_mutation() {
    let h = Harness::new(true, Some("abc"));
    let report = h.run(None, 12).unwrap();
    assert!(h.mutations().is_empty());
    assert_eq!(report.strategy, None);
    assert_eq!(report.rows_staged, 12);
    // the unused staging object is discarded
    assert_eq!(h.log.count(CallKind::DeleteObject), 1);
}

#[test]
fn steps_run_in_order() {
    let h = Harness::new(true, Some("abc"));
    h.run(Some(LoadStrategy::Append), 1).unwrap();
    let kinds: Vec<CallKind> = h.log.calls().iter().map(Call::kind).collect();
    assert_eq!(
        kinds,
        vec![
            CallKind::TableExists,
            CallKind::CreateObject,
            CallKind::Fetch,
            CallKind::Copy,
        ]
    );
}

#[test]
fn staging_object_is_uniquely_named_json() {
    let h = Harness::new(false, None);
    h.run(Some(LoadStrategy::Append), 1).unwrap();
    h.run(Some(LoadStrategy::Append), 1).unwrap();
    let names: Vec<String> = h
        .log
        .of_kind(CallKind::CreateObject)
        .into_iter()
        .map(|c| match c {
            Call::CreateObject { name, content_type } => {
                assert_eq!(content_type, "application/json");
                name
            }
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| n.starts_with("orders_")));
    assert_ne!(names[0], names[1]);
}

#[test]
fn fetch_receives_identity_and_window() {
    let h = Harness::new(false, Some("abc"));
    h.run(Some(LoadStrategy::Append), 1).unwrap();
    assert!(matches!(
        h.log.of_kind(CallKind::Fetch).as_slice(),
        [Call::Fetch { identity: Some(id), window: w, .. }] if id == "abc" && *w == window()
    ));
}

#[test]
fn fetch_failure_leaves_warehouse_untouched() {
    let h = Harness::new(true, None);
    let source = StaticSource::new(table(Some(replace(ReplaceFilter::dummy()))), 5)
        .failing("api returned 503");
    let err = h.orchestrator.process_range(&source, &window()).unwrap_err();

    assert_eq!(err.step(), Some(LoadStep::Fetch));
    assert!(err.to_string().contains("api returned 503"));
    assert!(h.mutations().is_empty());
    assert_eq!(h.log.count(CallKind::DeleteObject), 1);
}

#[test]
fn existence_check_failure_aborts_before_staging() {
    let h = Harness::with_warehouse(true, None, |w| w.fail_on(CallKind::TableExists));
    let err = h.run(Some(LoadStrategy::Append), 5).unwrap_err();
    assert_eq!(err.step(), Some(LoadStep::TableExists));
    assert_eq!(h.log.count(CallKind::CreateObject), 0);
}

#[test]
fn delete_failure_stops_before_copy() {
    let h = Harness::with_warehouse(true, None, |w| w.fail_on(CallKind::Delete));
    let err = h.run(Some(replace(ReplaceFilter::dummy())), 5).unwrap_err();
    assert_eq!(err.step(), Some(LoadStep::DeleteRows));
    assert_eq!(h.log.count(CallKind::Copy), 0);
    assert_eq!(h.log.count(CallKind::DeleteObject), 1);
}

#[test]
fn copy_failure_discards_staging_object() {
    let h = Harness::with_warehouse(false, None, |w| w.fail_on(CallKind::Copy));
    let err = h.run(Some(LoadStrategy::Append), 5).unwrap_err();
    assert_eq!(err.step(), Some(LoadStep::Copy));
    assert!(err.to_string().contains("table 'orders'"));
    assert_eq!(h.log.count(CallKind::DeleteObject), 1);
}

#[test]
fn merge_failure_drops_temp_table_without_touching_target() {
    let h = Harness::with_warehouse(true, Some("abc"), |w| w.fail_on(CallKind::Merge));
    let err = h.run(Some(merge()), 5).unwrap_err();
    assert_eq!(err.step(), Some(LoadStep::Merge));

    let dropped = h.log.of_kind(CallKind::DeleteTable);
    assert_eq!(dropped.len(), 1);
    assert!(matches!(
        &dropped[0],
        Call::DeleteTable { table } if table.starts_with("raw.orders_")
    ));
}

#[test]
fn temp_table_delete_failure_is_surfaced() {
    let h = Harness::with_warehouse(true, Some("abc"), |w| w.fail_on(CallKind::DeleteTable));
    let err = h.run(Some(merge()), 5).unwrap_err();
    assert_eq!(err.step(), Some(LoadStep::DeleteTable));
    assert_eq!(h.log.count(CallKind::Merge), 1);
    assert_eq!(h.log.count(CallKind::DeleteTable), 1);
}

#[test]
fn invalid_table_spec_rejected_before_any_call() {
    let h = Harness::new(true, None);
    let spec = TableSpec::new("orders", TableSchema::new(serde_json::Value::Null))
        .with_strategy(LoadStrategy::Append);
    let source = StaticSource::new(spec, 1);
    let err = h.orchestrator.process_range(&source, &window()).unwrap_err();
    assert!(matches!(err, LoadError::Config(_)));
    assert!(h.log.calls().is_empty());
}

#[test]
fn test_environment_suffixes_dataset_and_object() {
    let log = CallLog::default();
    let orchestrator = LoadOrchestrator::builder()
        .dataset("raw")
        .environment(Environment::Test)
        .warehouse(Arc::new(RecordingWarehouse::new(log.clone())))
        .object_store(Arc::new(MemoryObjectStore::new(log.clone())))
        .build()
        .unwrap();
    let source = StaticSource::new(table(Some(LoadStrategy::Append)), 1);
    let report = orchestrator.process_range(&source, &window()).unwrap();

    assert_eq!(report.target, "raw_test.orders");
    assert!(matches!(
        log.of_kind(CallKind::CreateObject).as_slice(),
        [Call::CreateObject { name, .. }] if name.starts_with("orders_test_")
    ));
}

/// Runs a replace load without a window filter in `environment`, returning
/// everything logged at info and above.
fn replace_without_window_logs(environment: Environment) -> (String, CallLog) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = Arc::clone(&buffer);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || CaptureWriter(Arc::clone(&writer)))
        .finish();

    let log = CallLog::default();
    let orchestrator = LoadOrchestrator::builder()
        .dataset("raw")
        .environment(environment)
        .warehouse(Arc::new(
            RecordingWarehouse::new(log.clone()).with_table(format!(
                "{}.orders",
                environment.apply("raw")
            )),
        ))
        .object_store(Arc::new(MemoryObjectStore::new(log.clone())))
        .build()
        .unwrap();
    let source = StaticSource::new(table(Some(replace(ReplaceFilter::default()))), 1);

    tracing::subscriber::with_default(subscriber, || {
        orchestrator.process_range(&source, &window()).unwrap();
    });

    let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    (output, log)
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn skipped_delete_is_logged_outside_production() {
    let (output, log) = replace_without_window_logs(Environment::Test);
    assert!(output.contains("No delete filter, skipping delete"), "got: {output}");
    assert_eq!(log.count(CallKind::Delete), 0);
    assert_eq!(log.count(CallKind::Copy), 1);
}

#[test]
fn skipped_delete_is_silent_in_production() {
    let (output, log) = replace_without_window_logs(Environment::Production);
    assert!(!output.contains("No delete filter"), "got: {output}");
    assert_eq!(log.count(CallKind::Delete), 0);
    assert_eq!(log.count(CallKind::Copy), 1);
}

#[test]
fn missing_dates_default_to_tomorrow() {
    let h = Harness::new(false, None);
    let source = StaticSource::new(table(Some(LoadStrategy::Append)), 0).with_log(h.log.clone());
    h.orchestrator.process_table(&source, None, None).unwrap();

    let tomorrow = chrono::Local::now()
        .date_naive()
        .succ_opt()
        .unwrap();
    let Call::Fetch { window, .. } = &h.log.of_kind(CallKind::Fetch)[0] else {
        panic!("fetch must be recorded");
    };
    // tolerate a midnight rollover between the load and this assertion
    assert!(window.start == tomorrow || window.start == tomorrow.pred_opt().unwrap());
    assert_eq!(window.start, window.end);
}
