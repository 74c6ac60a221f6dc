//! Nearest-neighbour indexes keyed by record id.

mod flat;
mod traits;

pub use flat::FlatIndex;
pub use traits::VectorIndex;

/// Parallel `ids` / `distances`, closest first.
#[derive(Debug, Clone, Default)]
pub struct IndexHits {
    pub ids: Vec<String>,
    pub distances: Vec<f32>,
}

impl IndexHits {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { ids: Vec::with_capacity(n), distances: Vec::with_capacity(n) }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
