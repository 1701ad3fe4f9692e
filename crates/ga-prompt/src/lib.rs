//! `ga-prompt` — everything between agent state and the LLM.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`templates`] | `TemplateLibrary` — `${field}` substitution over files   |
//! | [`scratch`]   | `Scratch`, profile, scheduling/place/describe prompts    |
//! | [`social`]    | chat/wait decisions, utterances, summaries               |
//! | [`reflect`]   | poignancy, reflection, recall, terminal generators       |
//!
//! Every prompt builder returns a [`ga_llm::PromptCase`]: prompt text, a
//! tolerant parser, and the value to fall back on when the model gives up.
//! Callers tag the call site when handing the case to the client, which is
//! how usage shows up in the step log.

pub mod reflect;
pub mod scratch;
pub mod social;
pub mod templates;


pub use scratch::{AgentProfile, Scratch, tidy_event_describe};
pub use social::{ChatContext, UtteranceContext, WaitContext};
pub use templates::TemplateLibrary;
