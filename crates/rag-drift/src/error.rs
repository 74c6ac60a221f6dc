use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriftError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error in {source_name}: {message}")]
    Parse { source_name: String, message: String },
    #[error("Invalid suite: {0}")]
    InvalidSuite(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DriftError>;
