//! The vector store port and its backends.
//!
//! - [`MemoryVectorStore`]: process-local, for tests and ephemeral use.
//! - [`LocalVectorStore`]: one directory per collection under a root path,
//!   survives restarts.

mod file_store;
mod local;
mod memory;

pub use file_store::FileStore;
pub use local::LocalVectorStore;
pub use memory::MemoryVectorStore;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;
use rag_core::{DbType, EngineConfig, Metadata, MetadataValue};
use serde_json::{Map, Value};

use crate::collection::Collection;
use crate::error::{Result, VectorDbError};
use crate::meta::CollectionMeta;

/// Opaque reference to a collection obtained from
/// [`VectorStore::get_or_create_collection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: String,
}

impl CollectionHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Column-aligned upsert payload.
#[derive(Debug, Clone, Default)]
pub struct UpsertBatch {
    pub ids: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl UpsertBatch {
    pub fn push(
        &mut self,
        id: impl Into<String>,
        vector: Vec<f32>,
        document: impl Into<String>,
        metadata: Metadata,
    ) {
        self.ids.push(id.into());
        self.vectors.push(vector);
        self.documents.push(document.into());
        self.metadatas.push(metadata);
    }

    /// Check the whole batch before anything is written.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        let n = self.ids.len();
        if self.vectors.len() != n || self.documents.len() != n || self.metadatas.len() != n {
            return Err(VectorDbError::InvalidBatch(format!(
                "misaligned columns: {} ids, {} vectors, {} documents, {} metadatas",
                n,
                self.vectors.len(),
                self.documents.len(),
                self.metadatas.len()
            )));
        }
        let mut seen = HashSet::with_capacity(n);
        for (id, vector) in self.ids.iter().zip(&self.vectors) {
            if id.is_empty() {
                return Err(VectorDbError::InvalidBatch("empty id".into()));
            }
            if !seen.insert(id.as_str()) {
                return Err(VectorDbError::InvalidBatch(format!("duplicate id {id:?} in batch")));
            }
            if vector.len() != dimension {
                return Err(VectorDbError::DimensionMismatch {
                    expected: dimension,
                    got: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(VectorDbError::InvalidBatch(format!("non-finite value in vector for {id:?}")));
            }
        }
        Ok(())
    }
}

/// Raw columnar response to a single query vector, ordered by ascending
/// distance and aligned by index.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub ids: Vec<String>,
    pub distances: Vec<f32>,
    pub documents: Vec<Option<String>>,
    pub metadatas: Vec<Option<Map<String, Value>>>,
}

/// One validated nearest-neighbour match.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: String,
    pub distance: f32,
    pub document: String,
    pub metadata: Metadata,
}

impl QueryResponse {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            ids: Vec::with_capacity(n),
            distances: Vec::with_capacity(n),
            documents: Vec::with_capacity(n),
            metadatas: Vec::with_capacity(n),
        }
    }

    /// Convert into typed hits, failing on anything a well-behaved store
    /// would never return.
    pub fn into_hits(self) -> Result<Vec<StoreHit>> {
        let n = self.ids.len();
        if self.distances.len() != n || self.documents.len() != n || self.metadatas.len() != n {
            return Err(VectorDbError::MalformedResponse(format!(
                "misaligned columns: {} ids, {} distances, {} documents, {} metadatas",
                n,
                self.distances.len(),
                self.documents.len(),
                self.metadatas.len()
            )));
        }

        let mut hits = Vec::with_capacity(n);
        let mut prev = f32::NEG_INFINITY;
        let rows = self.ids.into_iter()
            .zip(self.distances)
            .zip(self.documents)
            .zip(self.metadatas);
        for (((id, distance), document), metadata) in rows {
            if distance.is_nan() || distance < 0.0 {
                return Err(VectorDbError::MalformedResponse(format!("invalid distance {distance} for {id:?}")));
            }
            if distance < prev {
                return Err(VectorDbError::MalformedResponse("distances not in ascending order".into()));
            }
            prev = distance;
            let document = document
                .ok_or_else(|| VectorDbError::MalformedResponse(format!("missing document for {id:?}")))?;
            let metadata = match metadata {
                None => Metadata::new(),
                Some(map) => map.into_iter()
                    .map(|(k, v)| match MetadataValue::from_json(&v) {
                        Some(value) => Ok((k, value)),
                        None => Err(VectorDbError::MalformedResponse(format!(
                            "non-scalar metadata {k:?} for {id:?}"
                        ))),
                    })
                    .collect::<Result<Metadata>>()?,
            };
            hits.push(StoreHit { id, distance, document, metadata });
        }
        Ok(hits)
    }
}

/// Capability interface over a vector store backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend identifier for stats and logs.
    fn backend_name(&self) -> &'static str;

    /// Open the named collection, creating it with `meta` if it does not
    /// exist. An existing collection must have compatible metadata.
    async fn get_or_create_collection(&self, name: &str, meta: &CollectionMeta) -> Result<CollectionHandle>;

    async fn collection_meta(&self, handle: &CollectionHandle) -> Result<CollectionMeta>;

    /// All-or-nothing insert-or-replace.
    async fn upsert(&self, handle: &CollectionHandle, batch: UpsertBatch) -> Result<()>;

    /// One response per query vector.
    async fn query(
        &self,
        handle: &CollectionHandle,
        query_vectors: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<QueryResponse>>;

    async fn count(&self, handle: &CollectionHandle) -> Result<usize>;
}

/// Build the store adapter selected by `config.db_type`.
pub fn open_store(config: &EngineConfig) -> Result<Arc<dyn VectorStore>> {
    match config.db_type {
        DbType::Memory => Ok(Arc::new(MemoryVectorStore::new())),
        DbType::Local => Ok(Arc::new(LocalVectorStore::open(config.resolved_data_dir())?)),
    }
}

/// Open collections keyed by name, shared by the backends.
#[derive(Default)]
pub(crate) struct Registry {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl Registry {
    pub(crate) fn get(&self, handle: &CollectionHandle) -> Result<Arc<Collection>> {
        self.collections
            .read()
            .get(handle.name())
            .cloned()
            .ok_or_else(|| VectorDbError::CollectionNotFound(handle.name().to_string()))
    }

    pub(crate) fn get_or_try_insert(
        &self,
        name: &str,
        meta: &CollectionMeta,
        open: impl FnOnce() -> Result<Collection>,
    ) -> Result<Arc<Collection>> {
        if let Some(coll) = self.collections.read().get(name) {
            coll.meta().check_compatible(meta)?;
            return Ok(coll.clone());
        }
        let mut colls = self.collections.write();
        if let Some(coll) = colls.get(name) {
            coll.meta().check_compatible(meta)?;
            return Ok(coll.clone());
        }
        let coll = Arc::new(open()?);
        colls.insert(name.to_string(), coll.clone());
        Ok(coll)
    }
}

/// Collection names double as directory names.
pub(crate) fn validate_collection_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(VectorDbError::InvalidConfig(format!("invalid collection name {name:?}")))
    }
}

pub(crate) fn query_collection(
    coll: &Collection,
    query_vectors: &[Vec<f32>],
    n_results: usize,
) -> Result<Vec<QueryResponse>> {
    query_vectors.iter().map(|v| coll.query(v, n_results)).collect()
}
