//! Shared error type.
//!
//! Sub-crates define their own error enums and either convert into `GaError`
//! via `From` impls or wrap it as one variant.  Both patterns are acceptable;
//! prefer whichever keeps error sites clean.

use thiserror::Error;

/// The top-level error type for `ga-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum GaError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shorthand result type for all `ga-*` crates.
pub type GaResult<T> = Result<T, GaError>;
