use crate::error::Result;
use super::IndexHits;

/// Nearest-neighbour index over string-keyed vectors of one dimension.
///
/// Implementations synchronise internally; every method takes `&self`.
pub trait VectorIndex: Send + Sync {
    /// Insert, or replace the vector already stored under `id`.
    fn insert(&self, id: &str, vector: &[f32]) -> Result<()>;

    /// At most `top_k` ids, ascending distance.
    fn search(&self, query: &[f32], top_k: usize) -> Result<IndexHits>;

    fn len(&self) -> usize;
}
