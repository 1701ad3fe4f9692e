//! Output-subsystem error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by `ga-output`.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no checkpoints found under {0}")]
    NoCheckpoints(PathBuf),

    #[error("malformed checkpoint {path}: {reason}")]
    MalformedCheckpoint { path: PathBuf, reason: String },

    #[error(transparent)]
    Core(#[from] ga_core::GaError),
}

pub type OutputResult<T> = Result<T, OutputError>;
