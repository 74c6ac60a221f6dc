use rag_core::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size and configuration of the engine's active collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_documents: usize,
    pub collection_name: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub backend: String,
    pub description: String,
}

impl fmt::Display for CollectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} documents, {} [{}d, {}]",
            self.collection_name,
            self.backend,
            self.total_documents,
            self.embedding_model,
            self.dimension,
            self.metric
        )
    }
}
