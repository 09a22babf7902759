use std::sync::Arc;
use std::time::Duration;

use shopfloor_tracker::schema::{RECORD_WIDTH, TRACKING_SHEET};
use shopfloor_tracker::store::StoreCall;
use shopfloor_tracker::{
    CreateLayout, LockPolicy, MemoryStore, Payload, Rejection, StoreError, UpsertEngine,
    UpsertError, UpsertOutcome, ValidationError,
};

fn header() -> Vec<String> {
    vec!["QR ID".to_string(), "Operator".to_string()]
}

/// A tracking sheet with a header and `ids` in column A from row 2 on.
fn store_with_ids(ids: &[&str]) -> Arc<MemoryStore> {
    let mut rows = vec![header()];
    rows.extend(ids.iter().map(|id| vec![id.to_string()]));
    Arc::new(MemoryStore::new().with_rows(TRACKING_SHEET, rows))
}

fn engine(store: &Arc<MemoryStore>) -> UpsertEngine {
    UpsertEngine::new(store.clone())
}

fn writes(store: &MemoryStore) -> Vec<StoreCall> {
    store
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, StoreCall::Read { .. }))
        .collect()
}

// The worked example of a first `Order ID` submission shows `O-42` in column F,
// which only the aligned layout produces. The default legacy layout puts it in
// column B instead, as existing sheets were filled; both are pinned below.
#[tokio::test]
async fn order_id_on_empty_store_appends_a_column_aligned_row() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(&store).with_layout(CreateLayout::ColumnAligned);
    let payload = Payload::default().with("orderId", "O-42");

    let outcome = engine.upsert("QR-001", "Order ID", None, &payload).await.unwrap();

    let mut expected = vec![String::new(); RECORD_WIDTH];
    expected[0] = "QR-001".to_string();
    expected[5] = "O-42".to_string();
    assert_eq!(outcome, UpsertOutcome::Created { row: expected.clone() });
    assert_eq!(
        writes(&store),
        vec![StoreCall::Append {
            sheet: TRACKING_SHEET.to_string(),
            row: expected,
        }]
    );
}

#[tokio::test]
async fn legacy_layout_splices_new_records_from_column_b() {
    let store = Arc::new(MemoryStore::new());
    let payload = Payload::default().with("orderId", "O-42");

    engine(&store).upsert("QR-001", "Order ID", None, &payload).await.unwrap();

    let rows = store.rows(TRACKING_SHEET);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), RECORD_WIDTH);
    assert_eq!(rows[0][0], "QR-001");
    assert_eq!(rows[0][1], "O-42");
    assert!(rows[0][2..].iter().all(String::is_empty));
}

#[tokio::test]
async fn staged_first_submission_creates_a_bare_legacy_row() {
    let store = Arc::new(MemoryStore::new());
    let payload = Payload::default()
        .with("status", "start")
        .with("qcInspector", "A. Singh")
        .with("qcStart", "2024-01-01T09:00");

    let outcome = engine(&store)
        .upsert("QR-009", "QC", payload.stage(), &payload)
        .await
        .unwrap();

    let mut expected = vec![String::new(); RECORD_WIDTH];
    expected[0] = "QR-009".to_string();
    assert_eq!(outcome, UpsertOutcome::Created { row: expected.clone() });
    assert_eq!(store.rows(TRACKING_SHEET), vec![expected]);
}

#[tokio::test]
async fn staged_first_submission_lands_in_its_own_columns_when_aligned() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine(&store).with_layout(CreateLayout::ColumnAligned);
    let payload = Payload::default()
        .with("status", "start")
        .with("qcInspector", "A. Singh")
        .with("qcStart", "2024-01-01T09:00");

    engine.upsert("QR-009", "QC", payload.stage(), &payload).await.unwrap();

    let row = &store.rows(TRACKING_SHEET)[0];
    assert_eq!(row.len(), RECORD_WIDTH);
    assert_eq!(row[0], "QR-009");
    assert!(row[1..11].iter().all(String::is_empty));
    assert_eq!(&row[11..13], &["A. Singh", "2024-01-01T09:00"]);
}

#[tokio::test]
async fn qc_start_on_known_id_writes_its_range_in_place() {
    let store = store_with_ids(&["QR-000", "QR-002", "QR-001"]);
    let payload = Payload::default()
        .with("status", "start")
        .with("qcInspector", "A. Singh")
        .with("qcStart", "2024-01-01T09:00");

    let outcome = engine(&store)
        .upsert("QR-001", "QC", payload.stage(), &payload)
        .await
        .unwrap();

    let values = vec!["A. Singh".to_string(), "2024-01-01T09:00".to_string()];
    match outcome {
        UpsertOutcome::Updated { range, values: written } => {
            assert_eq!(range.sheet, "getdata");
            assert_eq!(range.cells(), "L4:M4");
            assert_eq!(written, values);
        }
        other => panic!("expected an update, got {:?}", other),
    }
    assert_eq!(
        writes(&store),
        vec![StoreCall::Update {
            sheet: "getdata".to_string(),
            cells: "L4:M4".to_string(),
            row: values,
        }]
    );

    let row = &store.rows(TRACKING_SHEET)[3];
    assert_eq!(row[0], "QR-001");
    assert_eq!(row[11], "A. Singh");
    assert_eq!(row[12], "2024-01-01T09:00");
}

#[tokio::test]
async fn yes_no_fields_are_written_as_literals() {
    let store = store_with_ids(&["QR-005"]);
    let payload = Payload::default().with("movedToAssembly", true);

    engine(&store)
        .upsert("QR-005", "Moved to Assembly", None, &payload)
        .await
        .unwrap();

    assert_eq!(
        writes(&store),
        vec![StoreCall::Update {
            sheet: "getdata".to_string(),
            cells: "E2".to_string(),
            row: vec!["Yes".to_string()],
        }]
    );
}

#[tokio::test]
async fn known_ids_never_append_and_unknown_ids_never_update() {
    let store = store_with_ids(&["QR-010"]);
    let engine = engine(&store);
    let payload = Payload::default().with("packing", "Done");

    engine.upsert("QR-010", "Packing", None, &payload).await.unwrap();
    engine.upsert("QR-011", "Packing", None, &payload).await.unwrap();
    engine.upsert("QR-011", "Packing", None, &payload).await.unwrap();

    let kinds: Vec<&str> = writes(&store)
        .iter()
        .map(|call| match call {
            StoreCall::Append { .. } => "append",
            StoreCall::Update { .. } => "update",
            StoreCall::Read { .. } => "read",
        })
        .collect();
    assert_eq!(kinds, vec!["update", "append", "update"]);
}

#[tokio::test]
async fn identifier_match_is_exact_and_first_wins() {
    let store = store_with_ids(&["qr-020", "QR-020 ", "QR-020", "QR-020"]);
    let payload = Payload::default().with("orderId", "O-7");

    let outcome = engine(&store).upsert("QR-020", "Order ID", None, &payload).await.unwrap();

    match outcome {
        UpsertOutcome::Updated { range, .. } => assert_eq!(range.cells(), "F4"),
        other => panic!("expected an update, got {:?}", other),
    }
}

#[tokio::test]
async fn end_stage_leaves_start_columns_untouched() {
    let store = store_with_ids(&["QR-030"]);
    let engine = engine(&store);

    let start = Payload::default()
        .with("status", "start")
        .with("assemblyWorker", "Asha")
        .with("assemblyStart", "2024-01-01T08:00");
    engine.upsert("QR-030", "Assembly", start.stage(), &start).await.unwrap();

    let end = Payload::default()
        .with("status", "end")
        .with("assemblyEnd", "2024-01-01T11:30");
    engine.upsert("QR-030", "Assembly", end.stage(), &end).await.unwrap();

    let row = &store.rows(TRACKING_SHEET)[1];
    assert_eq!(&row[8..11], &["Asha", "2024-01-01T08:00", "2024-01-01T11:30"]);
}

#[tokio::test]
async fn rejected_submissions_never_touch_the_store() {
    let store = store_with_ids(&["QR-040"]);
    let engine = engine(&store);

    let qc_rework = Payload::default()
        .with("qcEnd", "2024-01-01T10:00")
        .with("qcResult", "Rework");
    let err = engine.upsert("QR-040", "QC", Some("end"), &qc_rework).await.unwrap_err();
    assert!(matches!(
        err,
        UpsertError::Rejected(Rejection::Invalid(ValidationError::MissingFields(ref f)))
            if f == &["rework".to_string()]
    ));

    let err = engine.upsert("QR-040", "Painting", None, &Payload::default()).await.unwrap_err();
    assert!(matches!(
        err,
        UpsertError::Rejected(Rejection::Invalid(ValidationError::UnknownOperation(_)))
    ));

    let err = engine
        .upsert("QR-040", "Rework", Some("later"), &Payload::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UpsertError::Rejected(Rejection::Invalid(ValidationError::InvalidStage { .. }))
    ));

    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn good_qc_result_is_stored_with_blank_rework() {
    let store = store_with_ids(&["QR-050"]);
    let payload = Payload::default()
        .with("qcEnd", "2024-01-01T10:00")
        .with("qcResult", "Good");

    engine(&store).upsert("QR-050", "QC", Some("end"), &payload).await.unwrap();

    assert_eq!(
        writes(&store),
        vec![StoreCall::Update {
            sheet: "getdata".to_string(),
            cells: "N2:P2".to_string(),
            row: vec!["2024-01-01T10:00".to_string(), "Good".to_string(), String::new()],
        }]
    );
}

#[tokio::test]
async fn store_failures_are_propagated() {
    let store = store_with_ids(&["QR-060"]);
    store.set_unavailable(true);
    let payload = Payload::default().with("packing", "Done");

    let err = engine(&store).upsert("QR-060", "Packing", None, &payload).await.unwrap_err();
    assert!(matches!(err, UpsertError::Store(StoreError::Unavailable(_))));
    assert_eq!(store.calls().len(), 1);
}

#[tokio::test]
async fn slow_store_times_out() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(250)));
    let engine = engine(&store).with_timeout(Duration::from_millis(20));
    let payload = Payload::default().with("packing", "Done");

    let err = engine.upsert("QR-070", "Packing", None, &payload).await.unwrap_err();
    assert!(matches!(err, UpsertError::Store(StoreError::Timeout(_))));
}

#[tokio::test]
async fn per_identifier_locking_prevents_duplicate_creates() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(20)));
    let engine = Arc::new(engine(&store).with_lock_policy(LockPolicy::PerIdentifier));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let payload = Payload::default().with("orderId", "O-1");
            engine.upsert("QR-080", "Order ID", None, &payload).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let appends = writes(&store)
        .into_iter()
        .filter(|call| matches!(call, StoreCall::Append { .. }))
        .count();
    assert_eq!(appends, 1);
    assert_eq!(store.rows(TRACKING_SHEET).len(), 1);
}

#[tokio::test]
async fn unguarded_engine_can_duplicate_concurrent_creates() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(20)));
    let engine = Arc::new(engine(&store));

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let payload = Payload::default().with("orderId", "O-1");
            engine.upsert("QR-090", "Order ID", None, &payload).await
        })
    };
    let payload = Payload::default().with("orderId", "O-2");
    engine.upsert("QR-090", "Order ID", None, &payload).await.unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(store.rows(TRACKING_SHEET).len(), 2);
}
