//! The per-agent vector index.
//!
//! A deliberately small cosine-similarity store: node id → (text, embedding,
//! metadata).  Persisted as a single JSON document under the agent's
//! `associate/` storage directory so a checkpointed simulation can resume
//! with its memories intact.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::associate::ConceptKind;
use crate::embed::{EmbedError, Embedder};
use crate::error::MemoryResult;

/// Metadata carried by every indexed node.  Timestamps use the
/// second-resolution stamp format so the persisted index matches the
/// checkpoint contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeMeta {
    pub kind: ConceptKind,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// `:`-joined address path.
    pub address: String,
    pub poignancy: u8,
    pub create: String,
    pub expire: String,
    pub access: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    pub meta: NodeMeta,
}

#[derive(Default, Serialize, Deserialize)]
struct PersistDoc {
    next_id: u64,
    nodes: IndexMap<String, NodeRecord>,
}

// ── VectorIndex ───────────────────────────────────────────────────────────────

/// Vector store with cosine retrieval, owned by exactly one agent.
pub struct VectorIndex {
    embedder: Box<dyn Embedder>,
    nodes: IndexMap<String, NodeRecord>,
    next_id: u64,
    path: PathBuf,
}

impl VectorIndex {
    /// Open (or create) the index persisted under `dir/index.json`.
    pub fn open(dir: impl AsRef<Path>, embedder: Box<dyn Embedder>) -> MemoryResult<Self> {
        let path = dir.as_ref().join("index.json");
        let doc: PersistDoc = if path.is_file() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            PersistDoc::default()
        };
        Ok(Self {
            embedder,
            nodes: doc.nodes,
            next_id: doc.next_id,
            path,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Embed `text` and insert a node.  Returns the assigned id.
    pub fn add(&mut self, text: &str, meta: NodeMeta) -> Result<String, EmbedError> {
        let embedding = self.embedder.embed(text)?;
        self.next_id += 1;
        let id = format!("node_{}", self.next_id);
        self.nodes.insert(
            id.clone(),
            NodeRecord { text: text.to_string(), embedding, meta },
        );
        Ok(id)
    }

    pub fn remove(&mut self, ids: &[String]) {
        for id in ids {
            self.nodes.shift_remove(id);
        }
    }

    /// Overwrite a node's access stamp; no-op for unknown ids.
    pub fn touch_access(&mut self, id: &str, stamp: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.meta.access = stamp.to_string();
        }
    }

    /// Drop nodes created in the future or already expired, returning the
    /// removed ids.  `now` is the second-resolution stamp of the current
    /// instant — stamp strings compare chronologically.
    pub fn cleanup(&mut self, now: &str) -> Vec<String> {
        let doomed: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.meta.create.as_str() > now || n.meta.expire.as_str() < now)
            .map(|(id, _)| id.clone())
            .collect();
        if !doomed.is_empty() {
            debug!(count = doomed.len(), "expired memory nodes dropped");
            self.remove(&doomed);
        }
        doomed
    }

    // ── Retrieval ─────────────────────────────────────────────────────────

    /// Cosine-score `text` against the allow-listed nodes that pass `filter`,
    /// returning up to `top_k` `(id, score)` pairs, best first.  Ties break
    /// on id so retrieval is deterministic.
    pub fn retrieve(
        &self,
        text: &str,
        top_k: usize,
        allowlist: &[String],
        filter: impl Fn(&NodeMeta) -> bool,
    ) -> Result<Vec<(String, f32)>, EmbedError> {
        let query = self.embedder.embed(text)?;
        let allowed: FxHashSet<&str> = allowlist.iter().map(String::as_str).collect();
        let mut scored: Vec<(String, f32)> = self
            .nodes
            .iter()
            .filter(|(id, node)| allowed.contains(id.as_str()) && filter(&node.meta))
            .map(|(id, node)| (id.clone(), cosine(&query, &node.embedding)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    // ── Persistence ───────────────────────────────────────────────────────

    /// Write the index to its backing file (parent dirs created as needed).
    pub fn save(&self) -> MemoryResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let doc = PersistDoc {
            next_id: self.next_id,
            nodes: self.nodes.clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}
