//! `ga-llm` — language-model plumbing.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`provider`] | `Provider` sum type (OpenAI / Ollama / ZhipuAI / Scripted)|
//! | [`client`]   | `LlmClient` — retry loop, failsafes, per-caller stats     |
//! | [`case`]     | `PromptCase<T>` — prompt + typed parser + failsafe        |
//! | [`parse`]    | tolerant regex-cascade scanning of model output           |
//! | [`embedder`] | `LlmEmbedder` — the `ga-memory` embedding seam over HTTP  |
//! | [`error`]    | `LlmError`, `LlmResult<T>`                                |
//!
//! The contract with callers is narrow: build a [`PromptCase`], hand it to
//! [`LlmClient::completion`] with a caller tag, and always get a value back —
//! the tag's failsafe when the model or the parser gives up.

pub mod case;
pub mod client;
pub mod embedder;
pub mod error;
pub mod parse;
pub mod provider;

#[cfg(test)]
mod tests;

pub use case::PromptCase;
pub use client::{CallStats, LlmClient, LlmSummary};
pub use embedder::LlmEmbedder;
pub use error::{LlmError, LlmResult};
pub use provider::{ApiKeys, Provider, ProviderConfig, ScriptedProvider};
