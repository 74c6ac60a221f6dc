//! Collection-level metadata.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{Result, VectorDbError};

/// Everything a collection pins at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub embedding_model: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub description: String,
}

impl CollectionMeta {
    pub fn new(embedding_model: impl Into<String>, dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            dimension,
            metric,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// A stored collection may only be reopened with the same model,
    /// dimension and metric. The description is informational.
    pub fn check_compatible(&self, requested: &CollectionMeta) -> Result<()> {
        if self.embedding_model != requested.embedding_model {
            return Err(VectorDbError::MetaMismatch(format!(
                "collection embeds with {}, caller uses {}",
                self.embedding_model, requested.embedding_model
            )));
        }
        if self.dimension != requested.dimension {
            return Err(VectorDbError::DimensionMismatch {
                expected: self.dimension,
                got: requested.dimension,
            });
        }
        if self.metric != requested.metric {
            return Err(VectorDbError::MetaMismatch(format!(
                "collection metric is {}, caller expects {}",
                self.metric, requested.metric
            )));
        }
        Ok(())
    }
}
