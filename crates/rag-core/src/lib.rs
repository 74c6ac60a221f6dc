//! Shared data model, error taxonomy and configuration for the semantic
//! retrieval workspace.

pub mod config;
pub mod error;
pub mod metric;
pub mod types;

pub use config::{DbType, DriftConfig, EmbeddingModel, EngineConfig, RagConfig, ServerConfig};
pub use error::{RetrievalError, Result};
pub use metric::DistanceMetric;
pub use types::{Document, Metadata, MetadataValue, SearchResult};
