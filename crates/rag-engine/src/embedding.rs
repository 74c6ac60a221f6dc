//! Embedding port and the built-in hashing embedder.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use rag_core::{EmbeddingModel, EngineConfig, Result, RetrievalError};
use regex::Regex;

/// Maps text to fixed-length vectors, deterministically per model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded in collection metadata.
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// One vector per input text, same order. An empty input list is an error.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "i", "in", "is", "it", "me", "my", "of", "on", "or", "our", "that", "the", "this", "to",
    "we", "what", "when", "where", "which", "who", "why", "with", "you", "your",
];

static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Deterministic bag-of-words embedder using FNV-1a feature hashing.
///
/// Not semantically deep, but identical text always yields identical unit
/// vectors and shared vocabulary raises cosine similarity, which is what
/// ingestion, drift baselines and tests need without an external model.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let raw: Vec<&str> = RE_TOKEN.find_iter(&lower).map(|m| m.as_str()).collect();
        let content: Vec<String> = raw.iter()
            .filter(|t| !STOPWORDS.contains(*t))
            .map(|t| stem(t))
            .collect();
        if content.is_empty() {
            // all stopwords: still embed something distinguishable
            raw.iter().map(|t| t.to_string()).collect()
        } else {
            content
        }
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RetrievalError::Embedding("cannot embed empty text".into()));
        }
        let mut features = self.tokens(trimmed);
        if features.is_empty() {
            features.push(trimmed.to_lowercase());
        }

        let mut v = vec![0f32; self.dimension];
        for feature in &features {
            let h = fnv1a(feature.as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

fn stem(token: &str) -> String {
    if token.len() > 4 && token.ends_with("ies") {
        format!("{}y", &token[..token.len() - 3])
    } else if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        EmbeddingModel::Hashing.model_id()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(RetrievalError::Embedding("empty input list".into()));
        }
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// The in-process embedder for `config.embedding_model`.
///
/// Transformer models run outside this process; callers wire their own
/// [`Embedder`] for them through `RetrievalEngine::new`.
pub fn embedder_for(config: &EngineConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding_model {
        EmbeddingModel::Hashing => Ok(Arc::new(HashingEmbedder::new(config.embedding_dimension))),
        model @ (EmbeddingModel::MiniLmL6V2 | EmbeddingModel::BgeSmallEnV15) => Err(RetrievalError::Embedding(
            format!("model {model} is not available in-process; supply an Embedder for it"),
        )),
    }
}
