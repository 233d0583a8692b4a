use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hitl_checkpoint::{
    Checkpoint, CheckpointSource, CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore,
};
use serde_json::json;

fn sample(thread_id: &str) -> Checkpoint {
    let state = json!({
        "topic": "benchmarks",
        "post": "x".repeat(512),
        "iteration": 3,
        "messages": (0..20).map(|i| json!({"role": "user", "content": i})).collect::<Vec<_>>(),
    });
    Checkpoint::initial(thread_id, "bench", state.as_object().cloned().unwrap(), Some("step".into()))
}

fn memory_append_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("memory append", |b| {
        b.to_async(&runtime).iter(|| async {
            let store = InMemoryCheckpointStore::new();
            let first = sample("bench-thread");
            store.put(black_box(&first), None).await.unwrap();
            let next = first.successor(CheckpointSource::Step);
            store.put(black_box(&next), Some(0)).await.unwrap();
        });
    });
}

fn sqlite_load_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = runtime.block_on(async {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();
        store.put(&sample("bench-thread"), None).await.unwrap();
        store
    });

    c.bench_function("sqlite get_latest", |b| {
        b.to_async(&runtime).iter(|| async {
            store.get_latest(black_box("bench-thread")).await.unwrap();
        });
    });
}

criterion_group!(benches, memory_append_benchmark, sqlite_load_benchmark);
criterion_main!(benches);
