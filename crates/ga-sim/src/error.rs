//! Simulation-driver error type.

use thiserror::Error;

/// Errors produced by `ga-sim`.  All of them are fatal at startup; the tick
/// loop itself only propagates checkpoint-write failures.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("world configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Agent(#[from] ga_agent::AgentError),

    #[error(transparent)]
    Maze(#[from] ga_maze::MazeError),

    #[error(transparent)]
    Memory(#[from] ga_memory::MemoryError),

    #[error(transparent)]
    Llm(#[from] ga_llm::LlmError),

    #[error(transparent)]
    Output(#[from] ga_output::OutputError),

    #[error(transparent)]
    Core(#[from] ga_core::GaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
