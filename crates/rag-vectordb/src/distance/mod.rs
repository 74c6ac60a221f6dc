//! Raw distance kernels. Conversion to similarity lives on
//! [`DistanceMetric::to_similarity`].

pub use rag_core::DistanceMetric;

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Scale to unit length. Zero vectors are left as they are.
pub fn normalize_vector(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Non-negative distance, lower is closer.
///
/// Cosine and inner product inputs must already be unit length, which makes
/// them the same `1 - dot` kernel.
pub fn compute_distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    let d = match metric {
        DistanceMetric::L2 => squared_euclidean(a, b),
        DistanceMetric::Cosine | DistanceMetric::Ip => 1.0 - dot(a, b),
    };
    // rounding can leave identical vectors just below zero
    d.max(0.0)
}
