use std::collections::HashMap;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use crate::distance::{self, DistanceMetric};
use crate::error::{Result, VectorDbError};
use super::{IndexHits, traits::VectorIndex};

/// Exact nearest-neighbour index: every search scans every row.
///
/// Rows keep insertion order and replacing a vector keeps its row. Equal
/// distances rank by row order.
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    rows: RwLock<Rows>,
}

#[derive(Default)]
struct Rows {
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    position: HashMap<String, usize>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self::with_capacity(dimension, metric, 0)
    }

    pub fn with_capacity(dimension: usize, metric: DistanceMetric, capacity: usize) -> Self {
        let rows = Rows {
            ids: Vec::with_capacity(capacity),
            vectors: Vec::with_capacity(capacity),
            position: HashMap::with_capacity(capacity),
        };
        Self { dimension, metric, rows: RwLock::new(rows) }
    }

    fn checked(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if vector.len() != self.dimension {
            return Err(VectorDbError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        let mut v = vector.to_vec();
        // cosine and ip rows are stored unit-length so `1 - dot` stays in [0, 2]
        if matches!(self.metric, DistanceMetric::Cosine | DistanceMetric::Ip) {
            distance::normalize_vector(&mut v);
        }
        Ok(v)
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&self, id: &str, vector: &[f32]) -> Result<()> {
        let v = self.checked(vector)?;
        let mut rows = self.rows.write();
        match rows.position.get(id).copied() {
            Some(row) => rows.vectors[row] = v,
            None => {
                let row = rows.ids.len();
                rows.ids.push(id.to_string());
                rows.vectors.push(v);
                rows.position.insert(id.to_string(), row);
            }
        }
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<IndexHits> {
        let q = self.checked(query)?;
        let rows = self.rows.read();
        let k = top_k.min(rows.ids.len());
        if k == 0 {
            return Ok(IndexHits::empty());
        }

        let mut scored: Vec<(OrderedFloat<f32>, usize)> = rows.vectors.iter()
            .enumerate()
            .map(|(row, v)| (OrderedFloat(distance::compute_distance(self.metric, &q, v)), row))
            .collect();
        if k < scored.len() {
            scored.select_nth_unstable(k - 1);
            scored.truncate(k);
        }
        scored.sort_unstable();

        let mut hits = IndexHits::with_capacity(k);
        for (d, row) in scored {
            hits.ids.push(rows.ids[row].clone());
            hits.distances.push(d.into_inner());
        }
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.rows.read().ids.len()
    }
}
