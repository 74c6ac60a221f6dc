use rag_core::RetrievalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Collection metadata mismatch: {0}")]
    MetaMismatch(String),
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Malformed store response: {0}")]
    MalformedResponse(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VectorDbError>;

impl From<VectorDbError> for RetrievalError {
    fn from(err: VectorDbError) -> Self {
        match err {
            VectorDbError::DimensionMismatch { .. }
            | VectorDbError::MetaMismatch(_)
            | VectorDbError::InvalidBatch(_) => RetrievalError::Validation(err.to_string()),
            VectorDbError::InvalidConfig(_) => RetrievalError::Config(err.to_string()),
            _ => RetrievalError::StoreUnavailable(err.to_string()),
        }
    }
}
