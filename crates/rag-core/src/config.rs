use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, RetrievalError};
use crate::metric::DistanceMetric;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub drift: DriftConfig,
}

/// Which vector store adapter backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// Process-local, nothing survives a restart.
    Memory,
    /// Directory-per-collection persistent store under `data_dir`.
    #[default]
    #[serde(alias = "persistent")]
    Local,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for DbType {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "local" | "persistent" => Ok(Self::Local),
            other => Err(RetrievalError::Config(format!("unknown db_type: {other}"))),
        }
    }
}

/// Embedding model identifiers understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EmbeddingModel {
    #[serde(rename = "sentence-transformers", alias = "all-MiniLM-L6-v2")]
    MiniLmL6V2,
    #[serde(rename = "bge-small-en", alias = "BAAI/bge-small-en-v1.5")]
    BgeSmallEnV15,
    /// Deterministic feature-hashing model that runs in-process.
    #[default]
    #[serde(rename = "hashing")]
    Hashing,
}

impl EmbeddingModel {
    /// Identifier recorded in collection metadata.
    pub fn model_id(self) -> &'static str {
        match self {
            Self::MiniLmL6V2 => "all-MiniLM-L6-v2",
            Self::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            Self::Hashing => "hashing-bow-v1",
        }
    }

    /// Output dimension fixed by the model, `None` when configurable.
    pub fn fixed_dimension(self) -> Option<usize> {
        match self {
            Self::MiniLmL6V2 | Self::BgeSmallEnV15 => Some(384),
            Self::Hashing => None,
        }
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_id())
    }
}

impl FromStr for EmbeddingModel {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sentence-transformers" | "all-MiniLM-L6-v2" => Ok(Self::MiniLmL6V2),
            "bge-small-en" | "BAAI/bge-small-en-v1.5" => Ok(Self::BgeSmallEnV15),
            "hashing" | "hashing-bow-v1" => Ok(Self::Hashing),
            other => Err(RetrievalError::Config(format!("unknown embedding_model: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub db_type: DbType,
    pub embedding_model: EmbeddingModel,
    pub embedding_dimension: usize,
    pub collection_name: String,
    pub description: String,
    pub metric: DistanceMetric,
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub data_dir: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_type: DbType::Local,
            embedding_model: EmbeddingModel::Hashing,
            embedding_dimension: 384,
            collection_name: "documents".into(),
            description: "Document embeddings for semantic retrieval".into(),
            metric: DistanceMetric::Cosine,
            top_k: 5,
            similarity_threshold: 0.7,
            data_dir: None,
            timeout_ms: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Root directory of the persistent store.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("rag-search"))
                .unwrap_or_else(|| PathBuf::from(".rag-search"))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection_name.trim().is_empty() {
            return Err(RetrievalError::Config("collection_name must not be empty".into()));
        }
        if self.top_k == 0 {
            return Err(RetrievalError::Config("top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RetrievalError::Config(format!(
                "similarity_threshold {} outside [0, 1]",
                self.similarity_threshold
            )));
        }
        if self.timeout_ms == 0 {
            return Err(RetrievalError::Config("timeout_ms must be positive".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(RetrievalError::Config("embedding_dimension must be positive".into()));
        }
        if let Some(fixed) = self.embedding_model.fixed_dimension() {
            if fixed != self.embedding_dimension {
                return Err(RetrievalError::Config(format!(
                    "{} produces {fixed}-dimensional vectors, embedding_dimension is {}",
                    self.embedding_model, self.embedding_dimension
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub top_k: usize,
    pub default_expected_similarity: f32,
    /// Largest tolerated drop from a recorded baseline similarity.
    pub alert_threshold: f32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            default_expected_similarity: 0.7,
            alert_threshold: 0.15,
        }
    }
}

impl RagConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RetrievalError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// File (or defaults), then `RAG_*` environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(
            db_type = %config.engine.db_type,
            model = %config.engine.embedding_model,
            collection = %config.engine.collection_name,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let engine = &mut self.engine;
        if let Some(v) = lookup("RAG_DB_TYPE") {
            engine.db_type = v.parse()?;
        }
        if let Some(v) = lookup("RAG_EMBEDDING_MODEL") {
            engine.embedding_model = v.parse()?;
        }
        if let Some(v) = lookup("RAG_COLLECTION") {
            engine.collection_name = v;
        }
        if let Some(v) = lookup("RAG_DATA_DIR") {
            engine.data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("RAG_TOP_K") {
            engine.top_k = parse_env("RAG_TOP_K", &v)?;
        }
        if let Some(v) = lookup("RAG_SIMILARITY_THRESHOLD") {
            engine.similarity_threshold = parse_env("RAG_SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("RAG_TIMEOUT_MS") {
            engine.timeout_ms = parse_env("RAG_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.drift.top_k == 0 {
            return Err(RetrievalError::Config("drift.top_k must be positive".into()));
        }
        if self.drift.alert_threshold < 0.0 {
            return Err(RetrievalError::Config("drift.alert_threshold must not be negative".into()));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RetrievalError::Config(format!("{key}: invalid value {value:?}")))
}
