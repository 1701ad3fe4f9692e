//! Maze-subsystem error type.

use thiserror::Error;

use crate::tile::Coord;

/// Errors produced by `ga-maze`.
#[derive(Debug, Error)]
pub enum MazeError {
    #[error("coordinate {0} outside the {1}x{2} grid")]
    OutOfBounds(Coord, u32, u32),

    #[error("maze config error: {0}")]
    Config(String),
}

pub type MazeResult<T> = Result<T, MazeError>;
