//! The retrieval engine: query embedding, store lookup, distance to
//! similarity conversion, threshold filtering and batched ingestion.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use rag_core::{Document, EngineConfig, Result, RetrievalError, SearchResult};
use rag_vectordb::{open_store, CollectionHandle, CollectionMeta, UpsertBatch, VectorStore};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::embedding::{embedder_for, Embedder};
use crate::stats::CollectionStats;

/// Orchestrates the embedder and the vector store for one collection.
///
/// Searches run concurrently; `add_documents` calls are serialized by a
/// writer lock so batches never interleave. Every collaborator call is
/// bounded by `config.timeout()`. A timed-out ingestion has unknown outcome:
/// verify with [`RetrievalEngine::get_stats`] or re-ingest (upserts are
/// idempotent).
pub struct RetrievalEngine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    handle: OnceCell<CollectionHandle>,
    writer: Mutex<()>,
}

impl RetrievalEngine {
    /// Build an engine over explicit collaborators. The collection itself is
    /// opened lazily on the first operation.
    pub fn new(config: EngineConfig, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() == 0 {
            return Err(RetrievalError::Config(format!(
                "embedder {} reports zero dimension",
                embedder.model_id()
            )));
        }
        Ok(Self {
            config,
            embedder,
            store,
            handle: OnceCell::new(),
            writer: Mutex::new(()),
        })
    }

    /// Build the store and in-process embedder named by the configuration.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config)?;
        let embedder = embedder_for(&config)?;
        Self::new(config, embedder, store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Search with the configured `top_k` and similarity threshold.
    pub async fn search_default(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search(query, self.config.top_k, self.config.similarity_threshold).await
    }

    /// Up to `top_k` matches with `similarity >= threshold`, most similar
    /// first. No match is `Ok(vec![])`, never an error.
    pub async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(RetrievalError::Validation("top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RetrievalError::Validation(format!("threshold {threshold} outside [0, 1]")));
        }
        if query.trim().is_empty() {
            return Err(RetrievalError::Embedding("empty query".into()));
        }

        let handle = self.handle().await?;
        let vectors = self.embed(vec![query.to_string()]).await?;
        let responses = self
            .with_timeout("vector query", self.store.query(handle, &vectors, top_k))
            .await?;
        let response = responses
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::StoreUnavailable("store returned no response for the query".into()))?;
        let hits = response.into_hits()?;
        if hits.len() > top_k {
            return Err(RetrievalError::StoreUnavailable(format!(
                "store returned {} results for n_results={top_k}",
                hits.len()
            )));
        }

        let candidates = hits.len();
        let metric = self.config.metric;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| {
                let similarity = metric.to_similarity(hit.distance);
                (similarity >= threshold).then(|| SearchResult {
                    id: hit.id,
                    content: hit.document,
                    metadata: hit.metadata,
                    similarity,
                    distance: hit.distance,
                })
            })
            .collect();

        debug!(
            collection = %self.config.collection_name,
            top_k,
            threshold,
            candidates,
            returned = results.len(),
            "search"
        );
        Ok(results)
    }

    /// Embed and upsert the whole batch in one call each. Returns the number
    /// of documents written; an empty batch is a no-op.
    pub async fn add_documents(&self, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        validate_batch(documents).inspect_err(|e| warn!(error = %e, "rejected document batch"))?;

        let _writer = self.writer.lock().await;
        let handle = self.handle().await?;

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embed(texts).await?;

        let mut batch = UpsertBatch::default();
        for (doc, vector) in documents.iter().zip(vectors) {
            batch.push(doc.id.clone(), vector, doc.content.clone(), doc.metadata.clone());
        }
        self.with_timeout("upsert", self.store.upsert(handle, batch))
            .await
            .inspect_err(|e| warn!(collection = %self.config.collection_name, error = %e, "document batch failed"))?;

        info!(
            collection = %self.config.collection_name,
            count = documents.len(),
            "added documents"
        );
        Ok(documents.len())
    }

    pub async fn get_stats(&self) -> Result<CollectionStats> {
        let handle = self.handle().await?;
        let total_documents = self.with_timeout("count", self.store.count(handle)).await?;
        let meta = self
            .with_timeout("collection metadata", self.store.collection_meta(handle))
            .await?;
        Ok(CollectionStats {
            total_documents,
            collection_name: handle.name().to_string(),
            embedding_model: meta.embedding_model,
            dimension: meta.dimension,
            metric: meta.metric,
            backend: self.store.backend_name().to_string(),
            description: meta.description,
        })
    }

    /// Open the collection once and reuse the handle. The store's recorded
    /// metric must be the one similarity conversion is configured for.
    async fn handle(&self) -> Result<&CollectionHandle> {
        self.handle
            .get_or_try_init(|| async {
                let requested = CollectionMeta::new(
                    self.embedder.model_id(),
                    self.embedder.dimension(),
                    self.config.metric,
                )
                .with_description(self.config.description.clone());
                let handle = self
                    .with_timeout(
                        "open collection",
                        self.store.get_or_create_collection(&self.config.collection_name, &requested),
                    )
                    .await?;
                let stored = self
                    .with_timeout("collection metadata", self.store.collection_meta(&handle))
                    .await?;
                if stored.metric != self.config.metric {
                    return Err(RetrievalError::Validation(format!(
                        "collection {} uses {} distance, engine is configured for {}",
                        handle.name(),
                        stored.metric,
                        self.config.metric
                    )));
                }
                info!(
                    collection = %handle.name(),
                    backend = self.store.backend_name(),
                    model = %stored.embedding_model,
                    "collection ready"
                );
                Ok(handle)
            })
            .await
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let vectors = self.with_timeout("embedding", self.embedder.embed(&texts)).await?;
        if vectors.len() != expected {
            return Err(RetrievalError::Embedding(format!(
                "embedder returned {} vectors for {expected} texts",
                vectors.len()
            )));
        }
        let dim = self.embedder.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(RetrievalError::Embedding(format!(
                "embedder returned a {}-dimensional vector, collection expects {dim}",
                bad.len()
            )));
        }
        Ok(vectors)
    }

    async fn with_timeout<T, E>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        RetrievalError: From<E>,
    {
        let after = self.config.timeout();
        match tokio::time::timeout(after, fut).await {
            Ok(res) => res.map_err(RetrievalError::from),
            Err(_) => {
                warn!(operation, timeout_ms = after.as_millis() as u64, "collaborator call timed out");
                Err(RetrievalError::Timeout { operation, after })
            }
        }
    }
}

fn validate_batch(documents: &[Document]) -> Result<()> {
    let mut seen = HashSet::with_capacity(documents.len());
    for doc in documents {
        if doc.id.trim().is_empty() {
            return Err(RetrievalError::Validation("document id must not be empty".into()));
        }
        if !seen.insert(doc.id.as_str()) {
            return Err(RetrievalError::Validation(format!("duplicate id {:?} in batch", doc.id)));
        }
    }
    Ok(())
}
