use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout { operation: &'static str, after: Duration },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Stable machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embedding(_) => "embedding_error",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Validation(_) => "validation_error",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
