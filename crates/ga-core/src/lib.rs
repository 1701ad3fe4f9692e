//! `ga-core` — foundational types for the `ga` town simulator.
//!
//! This crate is a dependency of every other `ga-*` crate.  It intentionally
//! has no `ga-*` dependencies and a minimal external surface (`chrono`,
//! `rand`, `serde`, `thiserror`).
//!
//! # What lives here
//!
//! | Module           | Contents                                             |
//! |------------------|------------------------------------------------------|
//! | [`time`]         | `Clock` (simulated datetime + stride), stamp parsing |
//! | [`event`]        | `Event` (subject/predicate/object tuple + address)   |
//! | [`rng`]          | `AgentRng` (deterministic per-agent RNG)             |
//! | [`conversation`] | `ConversationLog` (canonical chat transcript)        |
//! | [`error`]        | `GaError`, `GaResult`                                |

pub mod conversation;
pub mod error;
pub mod event;
pub mod rng;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use conversation::{ConversationEntry, ConversationLog};
pub use error::{GaError, GaResult};
pub use event::Event;
pub use rng::AgentRng;
pub use time::{Clock, daily_duration, parse_datetime};
