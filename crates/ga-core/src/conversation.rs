//! The canonical conversation transcript.
//!
//! Every finished chat is appended under the tick's start stamp.  The wire
//! shape matches the checkpoint contract:
//!
//! ```json
//! { "20240213-09:30": [ { "甲 -> 乙 @ 小镇，公园": [["甲", "…"], ["乙", "…"]] } ] }
//! ```
//!
//! Multiple chats at the same tick preserve insertion order.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One recorded chat: a `A -> B @ addr` header plus (speaker, utterance) lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationEntry {
    pub header: String,
    pub lines: Vec<(String, String)>,
}

impl Serialize for ConversationEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.header, &self.lines)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConversationEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = IndexMap::<String, Vec<(String, String)>>::deserialize(deserializer)?;
        let (header, lines) = map
            .into_iter()
            .next()
            .ok_or_else(|| D::Error::custom("empty conversation entry"))?;
        Ok(Self { header, lines })
    }
}

/// All conversations of a simulation, keyed by tick start stamp.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    entries: IndexMap<String, Vec<ConversationEntry>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chat under `stamp`, preserving insertion order within the tick.
    pub fn record(&mut self, stamp: impl Into<String>, entry: ConversationEntry) {
        self.entries.entry(stamp.into()).or_default().push(entry);
    }

    pub fn at(&self, stamp: &str) -> Option<&[ConversationEntry]> {
        self.entries.get(stamp).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ConversationEntry>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
