//! World configuration DTOs and agent wiring.
//!
//! The world config names the maze, the agent roster, the provider blocks,
//! and the API keys.  Each agent's effective config is a deep merge of
//! `agent_base`, its `config_path` file, and any inline overrides — exactly
//! the precedence a roster entry would expect.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use ga_llm::{ApiKeys, LlmClient, LlmEmbedder, Provider, ProviderConfig, ScriptedProvider};
use ga_memory::{Embedder, HashEmbedder};

use crate::error::{SimError, SimResult};

/// The `time` block.
#[derive(Clone, Debug, Deserialize)]
pub struct TimeConfig {
    pub start: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { start: "20240213-09:30".to_string() }
    }
}

/// The `maze` block: where the maze file lives, relative to the static root.
#[derive(Clone, Debug, Deserialize, serde::Serialize)]
pub struct MazeRef {
    pub path: String,
}

/// One roster entry: an optional config file plus inline overrides.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AgentEntry {
    #[serde(default)]
    pub config_path: Option<String>,
    #[serde(flatten)]
    pub overrides: Value,
}

/// Top-level world config.
#[derive(Debug, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "d_stride")]
    pub stride: u32,
    #[serde(default)]
    pub time: TimeConfig,
    pub maze: MazeRef,
    #[serde(default)]
    pub agent_base: Value,
    pub agents: IndexMap<String, AgentEntry>,
    #[serde(default)]
    pub api_keys: ApiKeys,
    /// Completion provider; absent means the scripted offline provider.
    #[serde(default)]
    pub llm: Option<ProviderConfig>,
    /// Embedding provider; absent means the in-process hash embedder.
    #[serde(default)]
    pub embedding: Option<ProviderConfig>,
    #[serde(default = "d_seed")]
    pub seed: u64,
    #[serde(default)]
    pub strict_addresses: bool,
    #[serde(default = "d_record_interval")]
    pub record_interval: u32,
}

fn d_stride() -> u32 {
    10
}

fn d_seed() -> u64 {
    42
}

fn d_record_interval() -> u32 {
    30
}

impl WorldConfig {
    pub fn load(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| SimError::Config(format!("malformed {}: {e}", path.display())))
    }

    /// Build the completion client for one agent.
    pub fn make_llm(&self) -> SimResult<LlmClient> {
        let provider = match &self.llm {
            Some(cfg) => Provider::from_config(cfg, &self.api_keys)?,
            None => Provider::Scripted(ScriptedProvider::default()),
        };
        Ok(LlmClient::new(provider))
    }

    /// Build the embedding backend for one agent's associate store.
    pub fn make_embedder(&self) -> SimResult<Box<dyn Embedder>> {
        match &self.embedding {
            Some(cfg) => {
                let provider = Provider::from_config(cfg, &self.api_keys)?;
                Ok(Box::new(LlmEmbedder::new(provider)))
            }
            None => Ok(Box::new(HashEmbedder::default())),
        }
    }
}

// ── Deep merge ────────────────────────────────────────────────────────────────

/// Recursively overlay `overlay` onto `base`.  Objects merge key-wise;
/// everything else replaces.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Resolve one agent's effective config value.
pub fn effective_agent_config(
    static_root: &Path,
    agent_base: &Value,
    entry: &AgentEntry,
) -> SimResult<Value> {
    let mut merged = if agent_base.is_object() {
        agent_base.clone()
    } else {
        Value::Object(Default::default())
    };
    if let Some(rel) = &entry.config_path {
        let path = static_root.join(rel);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| SimError::Config(format!("cannot read {}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| SimError::Config(format!("malformed {}: {e}", path.display())))?;
        merge(&mut merged, value);
    }
    if entry.overrides.is_object() {
        merge(&mut merged, entry.overrides.clone());
    }
    Ok(merged)
}

/// Load the optional `selected_personas.json` allowlist.
pub fn selected_personas(path: &Path) -> Option<Vec<String>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(names) => Some(names),
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring malformed persona selection");
            None
        }
    }
}
