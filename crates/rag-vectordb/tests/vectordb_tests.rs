//! Store-level tests for rag-vectordb: both backends against the same
//! VectorStore contract, plus persistence across reopen.

use rag_core::{DbType, EngineConfig, Metadata, MetadataValue, RetrievalError};
use rag_vectordb::{
    distance::DistanceMetric, open_store, CollectionHandle, CollectionMeta, LocalVectorStore,
    MemoryVectorStore, UpsertBatch, VectorDbError, VectorStore,
};
use std::sync::Arc;
use tempfile::TempDir;

fn meta() -> CollectionMeta {
    CollectionMeta::new("unit-model", 4, DistanceMetric::Cosine).with_description("test docs")
}

fn batch(items: &[(&str, [f32; 4])]) -> UpsertBatch {
    let mut b = UpsertBatch::default();
    for (id, v) in items {
        let mut md = Metadata::new();
        md.insert("source".into(), MetadataValue::from(format!("{id}.md")));
        b.push(*id, v.to_vec(), format!("content of {id}"), md);
    }
    b
}

async fn exercise_contract(store: &dyn VectorStore) {
    let handle = store.get_or_create_collection("docs", &meta()).await.unwrap();
    assert_eq!(store.count(&handle).await.unwrap(), 0);

    let empty = store.query(&handle, &[vec![1.0, 0.0, 0.0, 0.0]], 5).await.unwrap();
    assert_eq!(empty.len(), 1);
    assert!(empty[0].ids.is_empty());

    store
        .upsert(&handle, batch(&[("a", [1.0, 0.0, 0.0, 0.0]), ("b", [0.0, 1.0, 0.0, 0.0]), ("c", [0.9, 0.1, 0.0, 0.0])]))
        .await
        .unwrap();
    assert_eq!(store.count(&handle).await.unwrap(), 3);

    let resp = store.query(&handle, &[vec![1.0, 0.0, 0.0, 0.0]], 2).await.unwrap();
    let hits = resp.into_iter().next().unwrap().into_hits().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "a");
    assert_eq!(hits[1].id, "c");
    assert_eq!(hits[0].document, "content of a");
    assert_eq!(hits[0].metadata["source"], MetadataValue::from("a.md"));

    // same id again: replaced, not duplicated
    store.upsert(&handle, batch(&[("a", [0.0, 0.0, 1.0, 0.0])])).await.unwrap();
    assert_eq!(store.count(&handle).await.unwrap(), 3);
}

#[tokio::test]
async fn test_memory_store_contract() {
    let store = MemoryVectorStore::new();
    exercise_contract(&store).await;
    assert_eq!(store.backend_name(), "memory");
}

#[tokio::test]
async fn test_local_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = LocalVectorStore::open(dir.path()).unwrap();
    exercise_contract(&store).await;
    assert!(dir.path().join("docs").join("records.json").exists());
}

#[tokio::test]
async fn test_local_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = LocalVectorStore::open(dir.path()).unwrap();
        let handle = store.get_or_create_collection("docs", &meta()).await.unwrap();
        store.upsert(&handle, batch(&[("a", [1.0, 0.0, 0.0, 0.0])])).await.unwrap();
    }
    let store = LocalVectorStore::open(dir.path()).unwrap();
    let handle = store.get_or_create_collection("docs", &meta()).await.unwrap();
    assert_eq!(store.count(&handle).await.unwrap(), 1);
    let stored = store.collection_meta(&handle).await.unwrap();
    assert_eq!(stored.embedding_model, "unit-model");
    assert_eq!(stored.description, "test docs");
}

#[tokio::test]
async fn test_unknown_handle_is_not_found() {
    let store = MemoryVectorStore::new();
    let err = store.count(&CollectionHandle::new("ghost")).await.unwrap_err();
    assert!(matches!(err, VectorDbError::CollectionNotFound(_)));
    assert!(matches!(RetrievalError::from(err), RetrievalError::StoreUnavailable(_)));
}

#[tokio::test]
async fn test_model_mixing_rejected() {
    let store = MemoryVectorStore::new();
    store.get_or_create_collection("docs", &meta()).await.unwrap();
    let other = CollectionMeta::new("other-model", 4, DistanceMetric::Cosine);
    let err = store.get_or_create_collection("docs", &other).await.unwrap_err();
    assert!(matches!(RetrievalError::from(err), RetrievalError::Validation(_)));
}

#[tokio::test]
async fn test_duplicate_ids_leave_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = LocalVectorStore::open(dir.path()).unwrap();
    let handle = store.get_or_create_collection("docs", &meta()).await.unwrap();
    store.upsert(&handle, batch(&[("a", [1.0, 0.0, 0.0, 0.0])])).await.unwrap();

    let err = store
        .upsert(&handle, batch(&[("dup", [0.0, 1.0, 0.0, 0.0]), ("dup", [0.0, 0.0, 1.0, 0.0])]))
        .await
        .unwrap_err();
    assert!(matches!(err, VectorDbError::InvalidBatch(_)));
    assert_eq!(store.count(&handle).await.unwrap(), 1);

    let reopened = LocalVectorStore::open(dir.path()).unwrap();
    let handle = reopened.get_or_create_collection("docs", &meta()).await.unwrap();
    assert_eq!(reopened.count(&handle).await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_collection_name() {
    let store = MemoryVectorStore::new();
    assert!(store.get_or_create_collection("../escape", &meta()).await.is_err());
}

#[tokio::test]
async fn test_open_store_by_db_type() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::default();
    config.db_type = DbType::Memory;
    assert_eq!(open_store(&config).unwrap().backend_name(), "memory");

    config.db_type = DbType::Local;
    config.data_dir = Some(dir.path().join("store"));
    assert_eq!(open_store(&config).unwrap().backend_name(), "local");
    assert!(dir.path().join("store").is_dir());
}

#[tokio::test]
async fn test_concurrent_readers_and_writer() {
    let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
    let handle = store.get_or_create_collection("docs", &meta()).await.unwrap();
    store.upsert(&handle, batch(&[("seed", [1.0, 0.0, 0.0, 0.0])])).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            if i % 4 == 0 {
                let id = format!("w{i}");
                store.upsert(&handle, batch(&[(id.as_str(), [0.0, 1.0, 0.0, 0.0])])).await.unwrap();
            } else {
                let resp = store.query(&handle, &[vec![1.0, 0.0, 0.0, 0.0]], 3).await.unwrap();
                let hits = resp.into_iter().next().unwrap().into_hits().unwrap();
                assert_eq!(hits[0].id, "seed");
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(store.count(&handle).await.unwrap(), 3);
}

#[tokio::test]
async fn test_invalid_name_maps_to_config_error() {
    let store = MemoryVectorStore::new();
    let err = store.get_or_create_collection("a/b", &meta()).await.unwrap_err();
    assert!(matches!(RetrievalError::from(err), RetrievalError::Config(_)));
}
