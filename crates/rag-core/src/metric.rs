//! Distance metric of a collection and its distance -> similarity conversion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Supported distance metrics.
///
/// Every metric produces a non-negative distance where smaller is closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in [0, 2].
    #[default]
    Cosine,
    /// Squared euclidean distance.
    L2,
    /// `1 - dot(a, b)` over unit-length vectors; the index normalizes them.
    Ip,
}

impl DistanceMetric {
    /// Convert a raw store distance into a similarity in [0, 1].
    ///
    /// Cosine and inner product use `1 - distance`; L2 uses `1 / (1 + distance)`.
    /// The result is clamped, so an anti-correlated cosine match reports 0.
    pub fn to_similarity(self, distance: f32) -> f32 {
        let similarity = match self {
            Self::Cosine | Self::Ip => 1.0 - distance,
            Self::L2 => 1.0 / (1.0 + distance.max(0.0)),
        };
        similarity.clamp(0.0, 1.0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
            Self::Ip => "ip",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" | "cos" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            "ip" | "dot" | "inner_product" => Ok(Self::Ip),
            other => Err(RetrievalError::Config(format!("unknown distance metric: {other}"))),
        }
    }
}
