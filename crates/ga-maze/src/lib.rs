//! `ga-maze` — the shared 2-D tile world.
//!
//! # Crate layout
//!
//! | Module   | Contents                                                     |
//! |----------|--------------------------------------------------------------|
//! | [`tile`] | `Coord`, `AddressLevel`, `Tile` (events + address path)      |
//! | [`maze`] | `Maze`, `MazeDoc` (loader DTO), address→coord index, scope   |
//! | [`path`] | breadth-first `find_path` over the walkable subgraph         |
//! | [`error`]| `MazeError`, `MazeResult<T>`                                 |
//!
//! The maze is loaded once at simulation start and mutated in place as
//! agents move: tiles never leave the grid, only their event sets change.

pub mod error;
pub mod maze;
pub mod path;
pub mod tile;


pub use error::{MazeError, MazeResult};
pub use maze::{Maze, MazeDoc, ScopeConfig, ScopeMode};
pub use tile::{AddressLevel, Coord, Tile};
