//! Agent-subsystem error type.

use thiserror::Error;

/// Errors produced by `ga-agent`.  These surface only at construction and
/// lookup time; the tick pipeline itself degrades instead of failing.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent {0:?} not found")]
    UnknownAgent(String),

    #[error("agent {0:?} has neither an action nor a starting coordinate")]
    MissingCoord(String),

    #[error(transparent)]
    Memory(#[from] ga_memory::MemoryError),

    #[error(transparent)]
    Maze(#[from] ga_maze::MazeError),

    #[error(transparent)]
    Core(#[from] ga_core::GaError),
}

pub type AgentResult<T> = Result<T, AgentError>;
