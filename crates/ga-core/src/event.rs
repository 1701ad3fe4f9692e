//! The `Event` tuple: who is doing what, where.
//!
//! Events are the unit of perception and memory.  They live on maze tiles
//! (one per subject per tile), inside actions, and wrapped in memory
//! concepts.  Equality and hashing cover the full
//! `(subject, predicate, object, describe, address)` identity so that a tile
//! can deduplicate repeated observations of the same state.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Default predicate for a freshly observed subject.
pub const PREDICATE_NOW: &str = "此时";
/// Default predicate while performing an action.
pub const PREDICATE_DOING: &str = "正在";
/// Predicate marking an ongoing conversation.
pub const PREDICATE_CHAT: &str = "对话";
/// Predicate for an installed wait action.
pub const PREDICATE_WAIT: &str = "waiting to start";
/// Default object: the subject is unoccupied.
pub const OBJECT_IDLE: &str = "空闲";
/// Object for a sleeping agent.
pub const OBJECT_SLEEP: &str = "睡觉";
/// Predicate for a game object occupied by a sleeper.
pub const PREDICATE_OCCUPIED: &str = "被占用";

/// An immutable subject/predicate/object statement with an optional free-text
/// description, an address path, and a display emoji.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default)]
    describe: String,
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default)]
    pub emoji: String,
}

impl Event {
    /// An idle self-event: `<subject> 此时 空闲`.
    pub fn idle(subject: impl Into<String>, address: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: PREDICATE_NOW.to_string(),
            object: OBJECT_IDLE.to_string(),
            describe: String::new(),
            address,
            emoji: String::new(),
        }
    }

    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        address: Vec<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            describe: String::new(),
            address,
            emoji: String::new(),
        }
    }

    pub fn with_describe(mut self, describe: impl Into<String>) -> Self {
        self.describe = describe.into();
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = emoji.into();
        self
    }

    // ── Matching ──────────────────────────────────────────────────────────

    /// `true` iff every given component matches.  `None` components are
    /// wildcards.
    pub fn fit(
        &self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> bool {
        if subject.is_some_and(|s| self.subject != s) {
            return false;
        }
        if predicate.is_some_and(|p| self.predicate != p) {
            return false;
        }
        if object.is_some_and(|o| self.object != o) {
            return false;
        }
        true
    }

    // ── Description ───────────────────────────────────────────────────────

    /// The stored free-text description, possibly empty.
    pub fn raw_describe(&self) -> &str {
        &self.describe
    }

    /// A readable description: the free text if present, otherwise
    /// `predicate object`.  With `with_subject`, the subject is prepended
    /// unless it already appears in the text; without it, a leading
    /// `<subject> ` is stripped.
    pub fn describe(&self, with_subject: bool) -> String {
        let mut describe = if self.describe.is_empty() {
            format!("{} {}", self.predicate, self.object)
        } else {
            self.describe.clone()
        };
        if with_subject {
            if !describe.contains(&self.subject) {
                return format!("{} {}", self.subject, describe);
            }
        } else {
            let prefix = format!("{} ", self.subject);
            if let Some(rest) = describe.strip_prefix(&prefix) {
                describe = rest.to_string();
            }
        }
        describe
    }

    /// The address path joined with `:` — the form used as an index key.
    pub fn address_key(&self) -> String {
        self.address.join(":")
    }

    /// Replace predicate/object/describe in place, restoring the idle
    /// defaults when a component is absent.
    pub fn update(
        &mut self,
        predicate: Option<&str>,
        object: Option<&str>,
        describe: Option<&str>,
    ) {
        self.predicate = predicate.unwrap_or(PREDICATE_NOW).to_string();
        self.object = object.unwrap_or(OBJECT_IDLE).to_string();
        if let Some(d) = describe {
            self.describe = d.to_string();
        }
    }

    fn identity(&self) -> (&str, &str, &str, &str, String) {
        (
            &self.subject,
            &self.predicate,
            &self.object,
            &self.describe,
            self.address_key(),
        )
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.describe.is_empty() {
            write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        } else {
            write!(f, "{}", self.describe)?;
        }
        if !self.address.is_empty() {
            write!(f, " @ {}", self.address_key())?;
        }
        Ok(())
    }
}
