//! Retrieval engine: turns free-text queries into ranked, threshold-filtered
//! document matches, and owns batched ingestion.

pub mod embedding;
pub mod engine;
pub mod stats;

pub use embedding::{embedder_for, Embedder, HashingEmbedder};
pub use engine::RetrievalEngine;
pub use stats::CollectionStats;
