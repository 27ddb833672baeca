use domain::{CacheContent, CacheEntry, HistoryCheckpoint, TimeValue, TimeValueData};
use fg_storage::{
    CacheStore, CheckpointStore, EntryState, InMemoryCacheStore, InMemoryCheckpointStore,
    SqliteCacheStore, SqliteCheckpointStore,
};
use std::path::PathBuf;

fn values_entry(seq: u64) -> CacheEntry {
    CacheEntry {
        seq,
        source_id: "south-1".to_string(),
        created_at_ms: 1_000 + seq as i64,
        size_bytes: 64,
        content: CacheContent::TimeValues {
            values: vec![TimeValue::new("p1", seq as i64, TimeValueData::I64(seq as i64))],
        },
    }
}

fn file_entry(seq: u64) -> CacheEntry {
    CacheEntry {
        seq,
        source_id: "south-2".to_string(),
        created_at_ms: 2_000,
        size_bytes: 512,
        content: CacheContent::Raw {
            path: PathBuf::from(format!("files/report-{seq}.csv")),
        },
    }
}

async fn exercise_cache_store(store: &dyn CacheStore) {
    assert_eq!(store.max_seq().await.expect("max"), None);
    store.insert_entry(&values_entry(1)).await.expect("insert");
    store.insert_entry(&file_entry(2)).await.expect("insert");
    store.insert_entry(&values_entry(3)).await.expect("insert");

    let entries = store.list_entries().await.expect("list");
    let seqs: Vec<u64> = entries.iter().map(|e| e.entry.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert!(entries.iter().all(|e| e.state == EntryState::Pending));
    assert_eq!(entries[1].entry, file_entry(2));
    assert_eq!(store.max_seq().await.expect("max"), Some(3));

    store
        .set_state(&[2], EntryState::Errored)
        .await
        .expect("state");
    let mut moved = file_entry(2);
    moved.content = CacheContent::Raw {
        path: PathBuf::from("files-errors/report-2.csv"),
    };
    store
        .update_entry(&moved, EntryState::Errored)
        .await
        .expect("update");
    let removed = store.remove_entries(&[1, 99]).await.expect("remove");
    assert_eq!(removed, 1);

    let entries = store.list_entries().await.expect("list");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].state, EntryState::Errored);
    assert_eq!(entries[0].entry, moved);
    assert_eq!(entries[1].state, EntryState::Pending);
}

#[tokio::test]
async fn in_memory_cache_store_keeps_order_and_state() {
    let store = InMemoryCacheStore::new();
    exercise_cache_store(&store).await;
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn sqlite_cache_store_keeps_order_and_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteCacheStore::open(&dir.path().join("north-1/cache.db"))
        .await
        .expect("open");
    exercise_cache_store(&store).await;
}

#[tokio::test]
async fn sqlite_cache_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cache.db");
    {
        let store = SqliteCacheStore::open(&path).await.expect("open");
        store.insert_entry(&values_entry(7)).await.expect("insert");
        store.insert_entry(&values_entry(8)).await.expect("insert");
        store.pool.close().await;
    }
    let store = SqliteCacheStore::open(&path).await.expect("reopen");
    let entries = store.list_entries().await.expect("list");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry, values_entry(7));
    assert_eq!(store.max_seq().await.expect("max"), Some(8));
}

async fn exercise_checkpoint_store(store: &dyn CheckpointStore) {
    assert!(
        store
            .get_checkpoint("hourly", "all")
            .await
            .expect("get")
            .is_none()
    );
    let mut checkpoint = HistoryCheckpoint {
        scan_mode_id: "hourly".to_string(),
        item_id: "all".to_string(),
        max_instant_ms: 10_000,
        interval_index: 0,
    };
    store.upsert_checkpoint(&checkpoint).await.expect("upsert");
    checkpoint.max_instant_ms = 20_000;
    checkpoint.interval_index = 3;
    store.upsert_checkpoint(&checkpoint).await.expect("upsert");
    store
        .upsert_checkpoint(&HistoryCheckpoint {
            scan_mode_id: "daily".to_string(),
            item_id: "item-1".to_string(),
            max_instant_ms: 5,
            interval_index: 0,
        })
        .await
        .expect("upsert");

    let stored = store
        .get_checkpoint("hourly", "all")
        .await
        .expect("get")
        .expect("checkpoint");
    assert_eq!(stored, checkpoint);
    assert_eq!(store.list_checkpoints().await.expect("list").len(), 2);

    assert_eq!(store.remove_scan_mode("hourly").await.expect("remove"), 1);
    let remaining = store.list_checkpoints().await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].scan_mode_id, "daily");
}

#[tokio::test]
async fn in_memory_checkpoint_store_upserts() {
    exercise_checkpoint_store(&InMemoryCheckpointStore::new()).await;
}

#[tokio::test]
async fn sqlite_checkpoint_store_upserts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteCheckpointStore::open(&dir.path().join("south-1/cache.db"))
        .await
        .expect("open");
    exercise_checkpoint_store(&store).await;
}
