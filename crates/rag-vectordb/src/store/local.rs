use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;

use super::{query_collection, validate_collection_name, CollectionHandle, QueryResponse, Registry, UpsertBatch, VectorStore};
use crate::collection::Collection;
use crate::error::{Result, VectorDbError};
use crate::meta::CollectionMeta;

/// Persistent vector store: `<root>/<collection>/{collection.json,records.json}`.
///
/// Every collection call runs on the blocking pool, so a read waiting on a
/// collection lock never stalls the async worker and callers' timeouts
/// still fire.
pub struct LocalVectorStore {
    root: PathBuf,
    registry: Arc<Registry>,
}

impl LocalVectorStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened local vector store");
        Ok(Self {
            root,
            registry: Arc::new(Registry::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VectorDbError::Storage(format!("blocking task failed: {e}")))?
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn get_or_create_collection(&self, name: &str, meta: &CollectionMeta) -> Result<CollectionHandle> {
        validate_collection_name(name)?;
        let registry = self.registry.clone();
        let path = self.root.join(name);
        let name = name.to_string();
        let meta = meta.clone();
        blocking(move || {
            registry.get_or_try_insert(&name, &meta, || Collection::open(name.clone(), meta.clone(), path))?;
            Ok(CollectionHandle::new(name))
        })
        .await
    }

    async fn collection_meta(&self, handle: &CollectionHandle) -> Result<CollectionMeta> {
        Ok(self.registry.get(handle)?.meta().clone())
    }

    async fn upsert(&self, handle: &CollectionHandle, batch: UpsertBatch) -> Result<()> {
        let coll = self.registry.get(handle)?;
        blocking(move || coll.upsert(batch).map(|_| ())).await
    }

    async fn query(
        &self,
        handle: &CollectionHandle,
        query_vectors: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<QueryResponse>> {
        let coll = self.registry.get(handle)?;
        let query_vectors = query_vectors.to_vec();
        blocking(move || query_collection(&coll, &query_vectors, n_results)).await
    }

    async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        let coll = self.registry.get(handle)?;
        blocking(move || Ok(coll.count())).await
    }
}
