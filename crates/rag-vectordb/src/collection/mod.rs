//! Collection management: batch upserts and nearest-neighbour queries over
//! documents and their embeddings.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use parking_lot::{Mutex, RwLock};
use rag_core::Metadata;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorDbError};
use crate::index::{FlatIndex, VectorIndex};
use crate::meta::CollectionMeta;
use crate::store::{FileStore, QueryResponse, UpsertBatch};

const META_FILE: &str = "collection.json";
const RECORDS_FILE: &str = "records.json";

/// Internal record stored in the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    id: String,
    vector: Vec<f32>,
    document: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCollection {
    name: String,
    meta: CollectionMeta,
}

struct State {
    records: HashMap<String, Record>,
    index: Box<dyn VectorIndex>,
}

/// A named set of (document, embedding) records with index-backed search.
///
/// Every record id maps to exactly one vector of the collection's dimension.
/// Upserts are all-or-nothing: the whole batch is validated first, and for
/// persistent collections the post-upsert snapshot is on disk before any
/// in-memory state changes. Writers are serialized on their own lock, so
/// readers only wait while a batch is applied in memory, never on disk I/O.
pub struct Collection {
    name: String,
    meta: CollectionMeta,
    state: RwLock<State>,
    writer: Mutex<()>,
    files: Option<FileStore>,
}

impl Collection {
    /// Create a new in-memory collection.
    pub fn new(name: impl Into<String>, meta: CollectionMeta) -> Self {
        let index = Box::new(FlatIndex::new(meta.dimension, meta.metric));
        Self {
            name: name.into(),
            meta,
            state: RwLock::new(State { records: HashMap::new(), index }),
            writer: Mutex::new(()),
            files: None,
        }
    }

    /// Open (or create) a persistent collection rooted at `path`.
    ///
    /// An existing collection keeps its stored metadata; the requested
    /// metadata must be compatible with it.
    pub fn open(name: impl Into<String>, meta: CollectionMeta, path: PathBuf) -> Result<Self> {
        let name = name.into();
        let files = FileStore::new(path);

        let meta = match files.get(META_FILE)? {
            Some(bytes) => {
                let stored: StoredCollection = serde_json::from_slice(&bytes)
                    .map_err(|e| VectorDbError::Serialization(format!("{META_FILE}: {e}")))?;
                stored.meta.check_compatible(&meta)?;
                stored.meta
            }
            None => {
                let stored = StoredCollection { name: name.clone(), meta };
                let bytes = serde_json::to_vec_pretty(&stored)
                    .map_err(|e| VectorDbError::Serialization(e.to_string()))?;
                files.put(META_FILE, &bytes)?;
                tracing::info!(collection = %name, path = %files.base_path().display(), "created collection");
                stored.meta
            }
        };

        let mut coll = Self::new(name, meta);
        coll.recover(&files)?;
        coll.files = Some(files);
        Ok(coll)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &CollectionMeta {
        &self.meta
    }

    /// Get the dimension of vectors in this collection.
    pub fn dimension(&self) -> usize {
        self.meta.dimension
    }

    /// Get record count.
    pub fn count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Insert-or-replace every record of the batch, or none of them.
    pub fn upsert(&self, batch: UpsertBatch) -> Result<usize> {
        batch.validate(self.meta.dimension)?;
        let records: Vec<Record> = batch.ids.into_iter()
            .zip(batch.vectors)
            .zip(batch.documents)
            .zip(batch.metadatas)
            .map(|(((id, vector), document), metadata)| Record { id, vector, document, metadata })
            .collect();
        let n = records.len();

        let _writer = self.writer.lock();
        if let Some(ref files) = self.files {
            // only writers mutate state and they hold `writer`, so the
            // snapshot cannot go stale before it is applied below
            let bytes = {
                let state = self.state.read();
                let incoming: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
                let mut snapshot: Vec<&Record> = state.records.values()
                    .filter(|r| !incoming.contains(r.id.as_str()))
                    .chain(records.iter())
                    .collect();
                snapshot.sort_by(|a, b| a.id.cmp(&b.id));
                serde_json::to_vec(&snapshot)
                    .map_err(|e| VectorDbError::Serialization(e.to_string()))?
            };
            files.put(RECORDS_FILE, &bytes)?;
        }

        let mut state = self.state.write();
        for record in records {
            state.index.insert(&record.id, &record.vector)?;
            state.records.insert(record.id.clone(), record);
        }
        Ok(n)
    }

    /// The `n_results` nearest records to `vector`, ascending distance.
    pub fn query(&self, vector: &[f32], n_results: usize) -> Result<QueryResponse> {
        let state = self.state.read();
        let hits = state.index.search(vector, n_results)?;

        let mut resp = QueryResponse::with_capacity(hits.len());
        for (id, distance) in hits.ids.into_iter().zip(hits.distances) {
            let record = state.records.get(&id);
            resp.documents.push(record.map(|r| r.document.clone()));
            resp.metadatas.push(record.map(|r| {
                r.metadata.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
            }));
            resp.ids.push(id);
            resp.distances.push(distance);
        }
        Ok(resp)
    }

    fn recover(&mut self, files: &FileStore) -> Result<()> {
        let Some(bytes) = files.get(RECORDS_FILE)? else {
            return Ok(());
        };
        let records: Vec<Record> = serde_json::from_slice(&bytes)
            .map_err(|e| VectorDbError::Serialization(format!("{RECORDS_FILE}: {e}")))?;
        let state = self.state.get_mut();
        for record in records {
            state.index.insert(&record.id, &record.vector)?;
            state.records.insert(record.id.clone(), record);
        }
        tracing::debug!(collection = %self.name, count = state.records.len(), "recovered collection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use rag_core::MetadataValue;

    fn meta() -> CollectionMeta {
        CollectionMeta::new("test-model", 3, DistanceMetric::Cosine)
    }

    fn batch(items: &[(&str, [f32; 3], &str)]) -> UpsertBatch {
        let mut b = UpsertBatch::default();
        for (id, vec, doc) in items {
            b.push(*id, vec.to_vec(), *doc, Metadata::new());
        }
        b
    }

    #[test]
    fn test_upsert_and_query() {
        let coll = Collection::new("docs", meta());
        coll.upsert(batch(&[("a", [1.0, 0.0, 0.0], "alpha"), ("b", [0.0, 1.0, 0.0], "beta")])).unwrap();
        assert_eq!(coll.count(), 2);
        let resp = coll.query(&[1.0, 0.1, 0.0], 2).unwrap();
        assert_eq!(resp.ids, vec!["a", "b"]);
        assert_eq!(resp.documents[0].as_deref(), Some("alpha"));
        assert!(resp.distances[0] <= resp.distances[1]);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let coll = Collection::new("docs", meta());
        coll.upsert(batch(&[("a", [1.0, 0.0, 0.0], "old")])).unwrap();
        coll.upsert(batch(&[("a", [0.0, 1.0, 0.0], "new")])).unwrap();
        assert_eq!(coll.count(), 1);
        let resp = coll.query(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(resp.documents[0].as_deref(), Some("new"));
        assert!(resp.distances[0] < 1e-6);
    }

    #[test]
    fn test_bad_batch_leaves_collection_untouched() {
        let coll = Collection::new("docs", meta());
        coll.upsert(batch(&[("a", [1.0, 0.0, 0.0], "alpha")])).unwrap();

        let mut bad = batch(&[("b", [0.0, 1.0, 0.0], "beta")]);
        bad.push("c", vec![1.0, 2.0], "short", Metadata::new());
        assert!(matches!(coll.upsert(bad), Err(VectorDbError::DimensionMismatch { .. })));

        let dup = batch(&[("d", [0.0, 0.0, 1.0], "x"), ("d", [0.0, 0.0, 1.0], "y")]);
        assert!(matches!(coll.upsert(dup), Err(VectorDbError::InvalidBatch(_))));

        assert_eq!(coll.count(), 1);
        assert_eq!(coll.query(&[0.0, 1.0, 0.0], 5).unwrap().ids, vec!["a"]);
    }

    #[test]
    fn test_query_empty_collection() {
        let coll = Collection::new("docs", meta());
        assert!(coll.query(&[1.0, 0.0, 0.0], 5).unwrap().ids.is_empty());
    }

    #[test]
    fn test_persistent_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("docs");
        {
            let coll = Collection::open("docs", meta().with_description("faq"), path.clone()).unwrap();
            let mut b = batch(&[("a", [1.0, 0.0, 0.0], "alpha")]);
            b.metadatas[0].insert("source".into(), MetadataValue::from("faq.md"));
            coll.upsert(b).unwrap();
        }
        let coll = Collection::open("docs", meta(), path).unwrap();
        assert_eq!(coll.count(), 1);
        assert_eq!(coll.meta().description, "faq");
        let resp = coll.query(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(resp.ids, vec!["a"]);
        assert_eq!(resp.metadatas[0].as_ref().unwrap()["source"], "faq.md");
    }

    #[test]
    fn test_reopen_with_other_model_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("docs");
        Collection::open("docs", meta(), path.clone()).unwrap();
        let other = CollectionMeta::new("other-model", 3, DistanceMetric::Cosine);
        assert!(matches!(Collection::open("docs", other, path), Err(VectorDbError::MetaMismatch(_))));
    }

    #[test]
    fn test_readers_do_not_wait_on_a_pending_writer() {
        let dir = tempfile::TempDir::new().unwrap();
        let coll = Collection::open("docs", meta(), dir.path().join("docs")).unwrap();
        coll.upsert(batch(&[("a", [1.0, 0.0, 0.0], "alpha")])).unwrap();

        // a writer busy persisting its snapshot holds only the writer lock
        let _busy = coll.writer.lock();
        assert_eq!(coll.count(), 1);
        assert_eq!(coll.query(&[1.0, 0.0, 0.0], 1).unwrap().ids, vec!["a"]);
    }

    #[test]
    fn test_corrupt_records_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("docs");
        Collection::open("docs", meta(), path.clone()).unwrap();
        std::fs::write(path.join(RECORDS_FILE), b"not json").unwrap();
        assert!(matches!(Collection::open("docs", meta(), path), Err(VectorDbError::Serialization(_))));
    }
}
