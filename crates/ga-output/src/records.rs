//! Append-only side-channel record files.
//!
//! The external content generators (image, music, cellular automaton)
//! consume JSON lists of `{时间, 智能体, <内容>}` objects; reflection gets
//! the same treatment with an optional evidence list.  Each file is loaded
//! once, appended to in memory with de-duplication, and rewritten whole at
//! tick end.  A corrupt existing file is recreated rather than fatal.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::OutputResult;
use crate::paths::ResultsRoot;

/// The three terminal-driven generators.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ActivityKind {
    Painting,
    Music,
    Quantum,
}

impl ActivityKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            ActivityKind::Painting => "paint-records",
            ActivityKind::Music => "music-records",
            ActivityKind::Quantum => "quantum-computing-records",
        }
    }

    /// The game object that triggers this activity.
    pub fn terminal(self) -> &'static str {
        match self {
            ActivityKind::Painting => "全能艺术终端",
            ActivityKind::Music => "全能音乐终端",
            ActivityKind::Quantum => "全能生命模拟终端",
        }
    }
}

/// One generator record.  The content key varies per activity
/// (`绘画内容` / `音乐内容` / `量子计算内容`), so serialization is driven by
/// the owning file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityEntry {
    pub time: String,
    pub agent: String,
    pub content: String,
}

/// One reflection record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionEntry {
    #[serde(rename = "时间")]
    pub time: String,
    #[serde(rename = "智能体")]
    pub agent: String,
    #[serde(rename = "反思内容")]
    pub content: String,
    #[serde(rename = "证据", default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

// ── File loading shared by both record shapes ─────────────────────────────────

/// Read a JSON list, recovering from a missing or corrupt file with an empty
/// one.  Corruption is logged, never fatal.
fn load_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match fs::read_to_string(path) {
        Err(_) => Vec::new(),
        Ok(text) => match serde_json::from_str(&text) {
            Ok(list) => list,
            Err(err) => {
                warn!(path = %path.display(), %err, "corrupt record file, recreating");
                Vec::new()
            }
        },
    }
}

fn save_list<T: Serialize>(path: &Path, list: &[T]) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(list)?)?;
    Ok(())
}

// ── RecordFile ────────────────────────────────────────────────────────────────

/// An activity record file with its kind-specific content key.
pub struct RecordFile {
    kind: ActivityKind,
    path: PathBuf,
    entries: Vec<ActivityEntry>,
    dirty: bool,
}

impl RecordFile {
    pub fn open(root: &ResultsRoot, kind: ActivityKind, sim: &str) -> Self {
        let path = root.activity_records(kind, sim);
        let raw: Vec<serde_json::Map<String, serde_json::Value>> = load_list(&path);
        let key = Self::content_key(kind);
        let entries = raw
            .into_iter()
            .filter_map(|map| {
                Some(ActivityEntry {
                    time: map.get("时间")?.as_str()?.to_string(),
                    agent: map.get("智能体")?.as_str()?.to_string(),
                    content: map.get(key)?.as_str()?.to_string(),
                })
            })
            .collect();
        Self { kind, path, entries, dirty: false }
    }

    fn content_key(kind: ActivityKind) -> &'static str {
        match kind {
            ActivityKind::Painting => "绘画内容",
            ActivityKind::Music => "音乐内容",
            ActivityKind::Quantum => "量子计算内容",
        }
    }

    pub fn kind(&self) -> ActivityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    /// Append unless an identical record already exists.  Returns whether
    /// the entry was added.
    pub fn append(&mut self, entry: ActivityEntry) -> bool {
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        self.dirty = true;
        true
    }

    /// Rewrite the file if anything changed since the last save.
    pub fn save(&mut self) -> OutputResult<()> {
        if !self.dirty || self.entries.is_empty() {
            return Ok(());
        }
        let key = Self::content_key(self.kind);
        let rows: Vec<serde_json::Value> = self
            .entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "时间": e.time,
                    "智能体": e.agent,
                    key: e.content,
                })
            })
            .collect();
        save_list(&self.path, &rows)?;
        self.dirty = false;
        Ok(())
    }
}

// ── ReflectionFile ────────────────────────────────────────────────────────────

/// The reflection-records file.
pub struct ReflectionFile {
    path: PathBuf,
    entries: Vec<ReflectionEntry>,
    dirty: bool,
}

impl ReflectionFile {
    pub fn open(root: &ResultsRoot, sim: &str) -> Self {
        let path = root.reflection_records(sim);
        let entries = load_list(&path);
        Self { path, entries, dirty: false }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, entry: ReflectionEntry) -> bool {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.time == entry.time && e.agent == entry.agent && e.content == entry.content);
        if duplicate {
            return false;
        }
        self.entries.push(entry);
        self.dirty = true;
        true
    }

    pub fn save(&mut self) -> OutputResult<()> {
        if !self.dirty || self.entries.is_empty() {
            return Ok(());
        }
        save_list(&self.path, &self.entries)?;
        self.dirty = false;
        Ok(())
    }
}

// ── RecordSink ────────────────────────────────────────────────────────────────

/// All side-channel files of one simulation, handed mutably through the tick.
pub struct RecordSink {
    pub painting: RecordFile,
    pub music: RecordFile,
    pub quantum: RecordFile,
    pub reflection: ReflectionFile,
}

impl RecordSink {
    pub fn open(root: &ResultsRoot, sim: &str) -> Self {
        Self {
            painting: RecordFile::open(root, ActivityKind::Painting, sim),
            music: RecordFile::open(root, ActivityKind::Music, sim),
            quantum: RecordFile::open(root, ActivityKind::Quantum, sim),
            reflection: ReflectionFile::open(root, sim),
        }
    }

    pub fn activity(&mut self, kind: ActivityKind) -> &mut RecordFile {
        match kind {
            ActivityKind::Painting => &mut self.painting,
            ActivityKind::Music => &mut self.music,
            ActivityKind::Quantum => &mut self.quantum,
        }
    }

    /// Persist every non-empty file.  Called once per tick.
    pub fn save_all(&mut self) -> OutputResult<()> {
        self.painting.save()?;
        self.music.save()?;
        self.quantum.save()?;
        self.reflection.save()?;
        Ok(())
    }
}
