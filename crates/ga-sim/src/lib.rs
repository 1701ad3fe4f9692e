//! `ga-sim` — the simulation driver.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                    |
//! |------------|-------------------------------------------------------------|
//! | [`config`] | world/agent config DTOs, deep-merge, provider wiring        |
//! | [`server`] | `SimulationServer` — tick loop, checkpoints, resume         |
//! | [`error`]  | `SimError`, `SimResult<T>`                                  |
//!
//! Configs are deserialization-only: the loader produces the live model
//! (`Game`, `Agent`s, `Clock`) and a separate serializer produces per-tick
//! snapshots.  API keys never enter a snapshot.

pub mod config;
pub mod error;
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{AgentEntry, MazeRef, TimeConfig, WorldConfig};
pub use error::{SimError, SimResult};
pub use server::{SimulationServer, SnapshotDoc};
