//! Memory-subsystem error type.

use thiserror::Error;

use crate::embed::EmbedError;

/// Errors produced by `ga-memory`.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("embedding backend failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("unknown memory node {0}")]
    UnknownNode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] ga_core::GaError),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
