//! Decoder error types

use thiserror::Error;

/// Errors produced while decoding one raw record.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Record is not valid JSON
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// CRI line is missing one of its four fields
    #[error("invalid cri format: {0}")]
    Cri(&'static str),

    /// Postgres line does not match the expected shape
    #[error("invalid postgres format: {0}")]
    Postgres(&'static str),

    /// Decoder name not recognized in configuration
    #[error("unknown decoder {0:?}")]
    UnknownDecoder(String),

    /// `auto` reached the dispatch layer without being resolved
    #[error("auto decoder must be resolved before dispatch")]
    Unresolved,
}

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;
