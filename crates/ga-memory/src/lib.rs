//! `ga-memory` — everything an agent remembers.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`spatial`]   | `SpatialTree` — per-agent world tree + named shortcuts   |
//! | [`schedule`]  | `Plan`, `Schedule` — the daily plan and its decomposition|
//! | [`action`]    | `Action` — the currently executing event pair            |
//! | [`embed`]     | `Embedder` trait + deterministic `HashEmbedder`          |
//! | [`index`]     | `VectorIndex` — cosine store with JSON persistence       |
//! | [`associate`] | `Concept`, `Associate` — typed memory with ranked recall |
//! | [`error`]     | `MemoryError`, `MemoryResult<T>`                         |

pub mod action;
pub mod associate;
pub mod embed;
pub mod error;
pub mod index;
pub mod schedule;
pub mod spatial;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use associate::{Associate, AssociateParams, Concept, ConceptKind, MemoryLists, Relation};
pub use embed::{EmbedError, Embedder, HashEmbedder};
pub use error::{MemoryError, MemoryResult};
pub use index::{NodeMeta, VectorIndex};
pub use schedule::{Plan, Schedule};
pub use spatial::{SpatialNode, SpatialSeed, SpatialTree};
