//! LLM-subsystem error type.

use thiserror::Error;

/// Errors produced by `ga-llm`.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("missing api key {0}")]
    MissingKey(&'static str),

    #[error("unsupported provider type {0:?}")]
    UnsupportedProvider(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Transient failures are retried; permanent ones go straight to the
    /// caller's failsafe.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Malformed(_) => true,
            LlmError::MissingKey(_) | LlmError::UnsupportedProvider(_) => false,
        }
    }
}

pub type LlmResult<T> = Result<T, LlmError>;
