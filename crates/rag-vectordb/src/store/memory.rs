use async_trait::async_trait;

use super::{query_collection, validate_collection_name, CollectionHandle, QueryResponse, Registry, UpsertBatch, VectorStore};
use crate::collection::Collection;
use crate::error::Result;
use crate::meta::CollectionMeta;

/// In-memory vector store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryVectorStore {
    registry: Registry,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_or_create_collection(&self, name: &str, meta: &CollectionMeta) -> Result<CollectionHandle> {
        validate_collection_name(name)?;
        self.registry
            .get_or_try_insert(name, meta, || Ok(Collection::new(name, meta.clone())))?;
        Ok(CollectionHandle::new(name))
    }

    async fn collection_meta(&self, handle: &CollectionHandle) -> Result<CollectionMeta> {
        Ok(self.registry.get(handle)?.meta().clone())
    }

    async fn upsert(&self, handle: &CollectionHandle, batch: UpsertBatch) -> Result<()> {
        self.registry.get(handle)?.upsert(batch)?;
        Ok(())
    }

    async fn query(
        &self,
        handle: &CollectionHandle,
        query_vectors: &[Vec<f32>],
        n_results: usize,
    ) -> Result<Vec<QueryResponse>> {
        let coll = self.registry.get(handle)?;
        query_collection(&coll, query_vectors, n_results)
    }

    async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        Ok(self.registry.get(handle)?.count())
    }
}
