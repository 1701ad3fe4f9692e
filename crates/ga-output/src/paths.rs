//! The on-disk results layout.
//!
//! Everything lives under one root, overridable with `GA_RESULTS_DIR`:
//!
//! ```text
//! results/
//!   checkpoints/<sim>/simulate-<stamp>.json
//!   checkpoints/<sim>/conversation.json
//!   checkpoints/<sim>/storage/<agent>/associate/
//!   compressed/<sim>/movement.json + simulation.md
//!   paint-records/<sim>.json
//!   music-records/<sim>.json
//!   quantum-computing-records/<sim>.json
//!   reflection-records/<sim>.json
//!   selected_personas.json
//! ```

use std::path::{Path, PathBuf};

use crate::records::ActivityKind;

/// Environment variable overriding the results root.
pub const RESULTS_DIR_ENV: &str = "GA_RESULTS_DIR";

/// Anchor for every artifact path the simulation produces.
#[derive(Clone, Debug)]
pub struct ResultsRoot(PathBuf);

impl ResultsRoot {
    /// `$GA_RESULTS_DIR` if set, else `./results`.
    pub fn resolve() -> Self {
        let root = std::env::var(RESULTS_DIR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("results"));
        Self(root)
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn checkpoints(&self, sim: &str) -> PathBuf {
        self.0.join("checkpoints").join(sim)
    }

    pub fn compressed(&self, sim: &str) -> PathBuf {
        self.0.join("compressed").join(sim)
    }

    /// Per-agent vector-store directory inside the checkpoint folder.
    pub fn associate_storage(&self, sim: &str, agent: &str) -> PathBuf {
        self.checkpoints(sim)
            .join("storage")
            .join(agent)
            .join("associate")
    }

    pub fn activity_records(&self, kind: ActivityKind, sim: &str) -> PathBuf {
        self.0.join(kind.dir_name()).join(format!("{sim}.json"))
    }

    pub fn reflection_records(&self, sim: &str) -> PathBuf {
        self.0.join("reflection-records").join(format!("{sim}.json"))
    }

    /// Optional UI-provided allowlist of agent names.
    pub fn selected_personas(&self) -> PathBuf {
        self.0.join("selected_personas.json")
    }
}
