//! `ga-agent` — the thinking part of the town.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                   |
//! |-------------|------------------------------------------------------------|
//! | [`agent`]   | `Agent` — state + the per-tick cognition pipeline          |
//! | [`activity`]| terminal activities (painting/music/life-rule) + throttle  |
//! | [`game`]    | `Game` — owns agents by index, runs chats and waits        |
//! | [`error`]   | `AgentError`, `AgentResult<T>`                             |
//!
//! The tick contract is absolute: [`Game::agent_think`] always produces a
//! plan (possibly a no-op).  LLM failures fall to prompt failsafes, memory
//! failures to transient concepts, pathfinding failures to staying put.

pub mod activity;
pub mod agent;
pub mod error;
pub mod game;

#[cfg(test)]
mod tests;

pub use activity::ActivityThrottle;
pub use agent::{
    Agent, AgentSeed, AgentSnapshot, AgentStatus, AssociateSeed, PerceptConfig, ThinkConfig,
};
pub use error::{AgentError, AgentResult};
pub use game::{AgentSpawn, EmojiTag, Game, ThinkPlan, ThinkResult};
