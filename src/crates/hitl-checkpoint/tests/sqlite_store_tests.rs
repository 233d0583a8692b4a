//! Durability and concurrency tests for the SQLite checkpoint store

use hitl_checkpoint::{
    Checkpoint, CheckpointError, CheckpointSource, CheckpointStore, PendingInterrupt,
    SqliteCheckpointStore, WorkflowState,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12).prop_map(Value::from),
        "[a-zA-Z0-9 ?!é]{0,24}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_state() -> impl Strategy<Value = WorkflowState> {
    prop::collection::btree_map("[a-z_]{1,10}", arb_json(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn state_and_payload_roundtrip_through_file(state in arb_state(), payload in arb_json()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("roundtrip.db");

            let first = Checkpoint::initial("t", "wf", state.clone(), Some("review".into()));
            let paused = first
                .successor(CheckpointSource::Interrupt)
                .with_pending(Some(PendingInterrupt::within("review", 0, payload.clone())))
                .with_resume_values(vec![payload.clone()]);
            {
                let store = SqliteCheckpointStore::connect(&path).await.unwrap();
                store.put(&first, None).await.unwrap();
                store.put(&paused, Some(0)).await.unwrap();
                store.close().await;
            }

            let reopened = SqliteCheckpointStore::connect(&path).await.unwrap();
            let loaded = reopened.get_latest("t").await.unwrap().unwrap();
            assert_eq!(loaded.state, state);
            assert_eq!(loaded.pending_interrupt.unwrap().payload, payload);
            assert_eq!(loaded.resume_values, vec![payload]);
        });
    }
}

#[tokio::test]
async fn test_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("hitl.db");

    let state = json!({"stock_name": "acme", "stock_price": 799.0, "quantity": 15});
    let first = Checkpoint::initial(
        "purchase-1",
        "purchase_stock",
        state.as_object().cloned().unwrap(),
        Some("purchase".into()),
    );
    {
        let store = SqliteCheckpointStore::connect(&path).await.unwrap();
        store.put(&first, None).await.unwrap();
    }

    let store = SqliteCheckpointStore::connect(&path).await.unwrap();
    let loaded = store.get_latest("purchase-1").await.unwrap().unwrap();
    assert_eq!(loaded, first);
}

#[tokio::test]
async fn test_concurrent_writers_only_one_wins() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("race.db");

    let store = Arc::new(SqliteCheckpointStore::connect(&path).await.unwrap());
    // A second handle on the same file stands in for another process
    let other = Arc::new(SqliteCheckpointStore::connect(&path).await.unwrap());

    let first = Checkpoint::initial("t", "wf", WorkflowState::new(), Some("approve".into()));
    store.put(&first, None).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let target: Arc<SqliteCheckpointStore> = if i % 2 == 0 { store.clone() } else { other.clone() };
        let next = first
            .successor(CheckpointSource::Resume)
            .with_resume_values(vec![json!(i)]);
        handles.push(tokio::spawn(async move { target.put(&next, Some(0)).await }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => wins += 1,
            Err(CheckpointError::Stale { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(store.list("t", None).await.unwrap().len(), 2);
}
