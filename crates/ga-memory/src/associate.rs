//! Associative long-term memory.
//!
//! Concepts are typed wrappers around events — something seen (`event`),
//! something concluded (`thought`), or something said (`chat`) — with a
//! poignancy score and a TTL.  The store keeps three newest-first id lists,
//! one per kind, over a shared per-agent [`VectorIndex`].
//!
//! Focus retrieval blends three signals per candidate: how recently it was
//! accessed, how similar it is to the query, and how poignant it was when
//! formed.  Each signal is min-max normalized into `[0, weight]` and the
//! weighted sum ranks the survivors, whose access stamps are then refreshed.

use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ga_core::Event;
use ga_core::time::STAMP_SECONDS;

use crate::embed::Embedder;
use crate::error::MemoryResult;
use crate::index::{NodeMeta, NodeRecord, VectorIndex};

/// Default concept lifetime.
const TTL_DAYS: i64 = 30;

// ── ConceptKind ───────────────────────────────────────────────────────────────

/// The three arms of memory.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptKind {
    Event,
    Thought,
    Chat,
}

impl std::fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConceptKind::Event => "event",
            ConceptKind::Thought => "thought",
            ConceptKind::Chat => "chat",
        })
    }
}

// ── Concept ───────────────────────────────────────────────────────────────────

/// A memory node.  `transient` concepts were never indexed (embedding
/// failure or frame-local idle percepts) and live only within the tick that
/// produced them.
#[derive(Clone, Debug)]
pub struct Concept {
    pub node_id: String,
    pub kind: ConceptKind,
    pub event: Event,
    pub poignancy: u8,
    pub create: NaiveDateTime,
    pub expire: NaiveDateTime,
    pub access: NaiveDateTime,
    pub transient: bool,
}

impl Concept {
    /// Rehydrate from an indexed record.
    pub fn from_record(node_id: &str, record: &NodeRecord) -> MemoryResult<Self> {
        let meta = &record.meta;
        let event = Event::new(
            meta.subject.clone(),
            meta.predicate.clone(),
            meta.object.clone(),
            meta.address
                .split(':')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
        .with_describe(record.text.clone());
        Ok(Self {
            node_id: node_id.to_string(),
            kind: meta.kind,
            event,
            poignancy: meta.poignancy,
            create: ga_core::parse_datetime(&meta.create)?,
            expire: ga_core::parse_datetime(&meta.expire)?,
            access: ga_core::parse_datetime(&meta.access)?,
            transient: false,
        })
    }

    /// A concept that exists only inside the current tick.
    pub fn transient(
        node_id: impl Into<String>,
        kind: ConceptKind,
        event: Event,
        poignancy: u8,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            event,
            poignancy,
            create: now,
            expire: now + Duration::days(TTL_DAYS),
            access: now,
            transient: true,
        }
    }

    pub fn describe(&self) -> String {
        self.event.describe(true)
    }
}

// ── Store configuration ───────────────────────────────────────────────────────

/// Tunables of the associate store; all fields have config-file defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociateParams {
    #[serde(default = "d_retention")]
    pub retention: usize,
    /// `-1` means unlimited.
    #[serde(default = "d_max_memory")]
    pub max_memory: i64,
    #[serde(default = "d_max_importance")]
    pub max_importance: usize,
    #[serde(default = "d_recency_decay")]
    pub recency_decay: f64,
    #[serde(default = "d_recency_weight")]
    pub recency_weight: f64,
    #[serde(default = "d_relevance_weight")]
    pub relevance_weight: f64,
    #[serde(default = "d_importance_weight")]
    pub importance_weight: f64,
}

fn d_retention() -> usize {
    8
}
fn d_max_memory() -> i64 {
    -1
}
fn d_max_importance() -> usize {
    10
}
fn d_recency_decay() -> f64 {
    0.995
}
fn d_recency_weight() -> f64 {
    0.5
}
fn d_relevance_weight() -> f64 {
    3.0
}
fn d_importance_weight() -> f64 {
    2.0
}

impl Default for AssociateParams {
    fn default() -> Self {
        Self {
            retention: d_retention(),
            max_memory: d_max_memory(),
            max_importance: d_max_importance(),
            recency_decay: d_recency_decay(),
            recency_weight: d_recency_weight(),
            relevance_weight: d_relevance_weight(),
            importance_weight: d_importance_weight(),
        }
    }
}

/// Newest-first id lists, one per concept kind.  This is the shape persisted
/// inside agent snapshots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryLists {
    #[serde(default)]
    pub event: Vec<String>,
    #[serde(default)]
    pub thought: Vec<String>,
    #[serde(default)]
    pub chat: Vec<String>,
}

impl MemoryLists {
    pub fn get(&self, kind: ConceptKind) -> &Vec<String> {
        match kind {
            ConceptKind::Event => &self.event,
            ConceptKind::Thought => &self.thought,
            ConceptKind::Chat => &self.chat,
        }
    }

    fn get_mut(&mut self, kind: ConceptKind) -> &mut Vec<String> {
        match kind {
            ConceptKind::Event => &mut self.event,
            ConceptKind::Thought => &mut self.thought,
            ConceptKind::Chat => &mut self.chat,
        }
    }

    fn drop_ids(&mut self, ids: &[String]) {
        for list in [&mut self.event, &mut self.thought, &mut self.chat] {
            list.retain(|id| !ids.contains(id));
        }
    }
}

/// A focus node together with its associated events and thoughts.
pub struct Relation {
    pub node: Concept,
    pub events: Vec<Concept>,
    pub thoughts: Vec<Concept>,
}

// ── Associate ─────────────────────────────────────────────────────────────────

/// One agent's associative memory.
pub struct Associate {
    index: VectorIndex,
    memory: MemoryLists,
    params: AssociateParams,
    tmp_seq: u64,
}

impl Associate {
    /// Open the store persisted under `dir`, seeding the id lists from a
    /// checkpoint when resuming.
    pub fn open(
        dir: impl AsRef<std::path::Path>,
        embedder: Box<dyn Embedder>,
        params: AssociateParams,
        memory: Option<MemoryLists>,
    ) -> MemoryResult<Self> {
        Ok(Self {
            index: VectorIndex::open(dir, embedder)?,
            memory: memory.unwrap_or_default(),
            params,
            tmp_seq: 0,
        })
    }

    pub fn nodes_num(&self) -> usize {
        self.index.len()
    }

    pub fn memory(&self) -> &MemoryLists {
        &self.memory
    }

    pub fn params(&self) -> &AssociateParams {
        &self.params
    }

    /// Flush the vector index to disk.
    pub fn save(&self) -> MemoryResult<()> {
        self.index.save()
    }

    // ── Insertion ─────────────────────────────────────────────────────────

    /// Insert a concept.  On embedder/store failure a transient concept is
    /// returned instead so the cognition pipeline never stalls on memory.
    pub fn add_node(
        &mut self,
        kind: ConceptKind,
        event: &Event,
        poignancy: u8,
        create: Option<NaiveDateTime>,
        expire: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Concept {
        let create = create.unwrap_or(now);
        let expire = expire.unwrap_or(create + Duration::days(TTL_DAYS));
        let stamp = |dt: NaiveDateTime| dt.format(STAMP_SECONDS).to_string();
        let meta = NodeMeta {
            kind,
            subject: event.subject.clone(),
            predicate: event.predicate.clone(),
            object: event.object.clone(),
            address: event.address_key(),
            poignancy,
            create: stamp(create),
            expire: stamp(expire),
            access: stamp(create),
        };

        let describe = event.describe(true);
        match self.index.add(&describe, meta) {
            Ok(id) => {
                let list = self.memory.get_mut(kind);
                list.insert(0, id.clone());
                // Evict the oldest overflow past the memory cap.
                if self.params.max_memory > 0 {
                    let cap = self.params.max_memory as usize;
                    while self.memory.get(kind).len() > cap {
                        if let Some(oldest) = self.memory.get_mut(kind).pop() {
                            self.index.remove(&[oldest]);
                        }
                    }
                }
                self.find_concept(&id)
                    .unwrap_or_else(|| Concept::transient(id, kind, event.clone(), poignancy, now))
            }
            Err(err) => {
                warn!(%err, %kind, "memory insert failed, returning transient concept");
                self.tmp_seq += 1;
                Concept::transient(
                    format!("tmp_{}", self.tmp_seq),
                    kind,
                    event.clone(),
                    poignancy,
                    now,
                )
            }
        }
    }

    pub fn find_concept(&self, node_id: &str) -> Option<Concept> {
        let record = self.index.get(node_id)?;
        Concept::from_record(node_id, record).ok()
    }

    // ── Type-list retrieval ───────────────────────────────────────────────

    /// Newest `retention` concepts of `kind`; with `text`, the most similar
    /// `retention` instead.  Retrieval failures degrade to an empty list.
    fn retrieve_kind(&self, kind: ConceptKind, text: Option<&str>) -> Vec<Concept> {
        let ids = self.memory.get(kind);
        if ids.is_empty() {
            return Vec::new();
        }
        match text {
            None => ids
                .iter()
                .take(self.params.retention)
                .filter_map(|id| self.find_concept(id))
                .collect(),
            Some(text) => {
                let scored = match self.index.retrieve(
                    text,
                    self.params.retention,
                    ids,
                    |meta| meta.kind == kind,
                ) {
                    Ok(scored) => scored,
                    Err(err) => {
                        warn!(%err, %kind, "memory retrieval failed");
                        return Vec::new();
                    }
                };
                scored
                    .iter()
                    .filter_map(|(id, _)| self.find_concept(id))
                    .collect()
            }
        }
    }

    pub fn retrieve_events(&self, text: Option<&str>) -> Vec<Concept> {
        self.retrieve_kind(ConceptKind::Event, text)
    }

    pub fn retrieve_thoughts(&self, text: Option<&str>) -> Vec<Concept> {
        self.retrieve_kind(ConceptKind::Thought, text)
    }

    /// Chat recall; with a name, looks for conversations with that agent via
    /// the `对话 <name>` phrase.
    pub fn retrieve_chats(&self, name: Option<&str>) -> Vec<Concept> {
        let text = name.map(|n| format!("对话 {n}"));
        self.retrieve_kind(ConceptKind::Chat, text.as_deref())
    }

    /// The focus node together with its related events and thoughts.
    pub fn get_relation(&self, node: &Concept) -> Relation {
        let describe = node.describe();
        Relation {
            node: node.clone(),
            events: self.retrieve_events(Some(&describe)),
            thoughts: self.retrieve_thoughts(Some(&describe)),
        }
    }

    // ── Focus retrieval ───────────────────────────────────────────────────

    /// Ranked retrieval for several queries, unioned by node id.
    pub fn retrieve_focus(
        &mut self,
        focus: &[String],
        retrieve_max: usize,
        now: NaiveDateTime,
    ) -> Vec<Concept> {
        let mut union: IndexMap<String, Concept> = IndexMap::new();
        for text in focus {
            for concept in self.focus_query(text, retrieve_max, now) {
                union.insert(concept.node_id.clone(), concept);
            }
        }
        union.into_values().collect()
    }

    /// Ranked retrieval keeping each query's results separate.
    pub fn retrieve_focus_grouped(
        &mut self,
        focus: &[String],
        retrieve_max: usize,
        now: NaiveDateTime,
    ) -> IndexMap<String, Vec<Concept>> {
        focus
            .iter()
            .map(|text| (text.clone(), self.focus_query(text, retrieve_max, now)))
            .collect()
    }

    /// One ranked query over `event ∪ thought` nodes.
    fn focus_query(&mut self, text: &str, retrieve_max: usize, now: NaiveDateTime) -> Vec<Concept> {
        let mut candidates: Vec<String> = self.memory.event.clone();
        candidates.extend(self.memory.thought.iter().cloned());
        if candidates.is_empty() {
            return Vec::new();
        }

        let scored = match self
            .index
            .retrieve(text, candidates.len(), &candidates, |_| true)
        {
            Ok(scored) => scored,
            Err(err) => {
                warn!(%err, "focus retrieval failed");
                return Vec::new();
            }
        };

        struct Candidate {
            concept: Concept,
            similarity: f64,
        }
        let mut ranked: Vec<Candidate> = scored
            .into_iter()
            .filter_map(|(id, similarity)| {
                self.find_concept(&id).map(|concept| Candidate {
                    concept,
                    similarity: similarity as f64,
                })
            })
            .collect();
        if ranked.is_empty() {
            return Vec::new();
        }

        // Rank by last access, newest first; the recency signal decays down
        // that ordering.
        ranked.sort_by(|a, b| {
            b.concept
                .access
                .cmp(&a.concept.access)
                .then_with(|| a.concept.node_id.cmp(&b.concept.node_id))
        });

        let recency: Vec<f64> = (1..=ranked.len())
            .map(|i| self.params.recency_decay.powi(i as i32))
            .collect();
        let relevance: Vec<f64> = ranked.iter().map(|c| c.similarity).collect();
        let importance: Vec<f64> = ranked.iter().map(|c| c.concept.poignancy as f64).collect();

        let recency = normalize(&recency, self.params.recency_weight);
        let relevance = normalize(&relevance, self.params.relevance_weight);
        let importance = normalize(&importance, self.params.importance_weight);

        let mut order: Vec<(usize, f64)> = (0..ranked.len())
            .map(|i| (i, recency[i] + relevance[i] + importance[i]))
            .collect();
        order.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ranked[a.0].concept.node_id.cmp(&ranked[b.0].concept.node_id))
        });
        order.truncate(retrieve_max);

        let now_stamp = now.format(STAMP_SECONDS).to_string();
        order
            .into_iter()
            .map(|(i, _)| {
                let mut concept = ranked[i].concept.clone();
                // Access refresh must reach the index, not just this copy.
                self.index.touch_access(&concept.node_id, &now_stamp);
                concept.access = now;
                concept
            })
            .collect()
    }

    // ── Expiry ────────────────────────────────────────────────────────────

    /// Drop concepts from the future or past their TTL.
    pub fn cleanup_index(&mut self, now: NaiveDateTime) {
        let removed = self.index.cleanup(&now.format(STAMP_SECONDS).to_string());
        if !removed.is_empty() {
            self.memory.drop_ids(&removed);
        }
    }

    /// Per-kind summary for the step log.
    pub fn summary(&self) -> String {
        format!(
            "nodes:{} event:{} thought:{} chat:{}",
            self.index.len(),
            self.memory.event.len(),
            self.memory.thought.len(),
            self.memory.chat.len()
        )
    }
}

/// Min-max normalize into `[0, factor]`; a constant series maps to the
/// midpoint.
fn normalize(data: &[f64], factor: f64) -> Vec<f64> {
    let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let diff = max - min;
    if diff == 0.0 {
        return vec![factor / 2.0; data.len()];
    }
    data.iter().map(|d| (d - min) * factor / diff).collect()
}
