//! Per-agent spatial cognition.
//!
//! Each agent carries a hierarchical picture of the world it has seen —
//! `world → sector → arena → [objects]` — plus a map of semantic shortcuts
//! (`living_area`, `睡觉`, …) to address paths.  The tree grows lazily as
//! the agent perceives new game-object tiles.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ga_core::AgentRng;

// ── Tree shape ────────────────────────────────────────────────────────────────

/// One level of the spatial tree: either a branch of named children or the
/// terminal list of game objects in an arena.  Insertion order is preserved
/// in both arms so config-declared ordering survives round-trips.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpatialNode {
    Leaves(Vec<String>),
    Branch(IndexMap<String, SpatialNode>),
}

impl SpatialNode {
    fn is_empty(&self) -> bool {
        match self {
            SpatialNode::Leaves(l) => l.is_empty(),
            SpatialNode::Branch(b) => b.is_empty(),
        }
    }
}

/// Deserialization shape of the `spatial` block in an agent config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpatialSeed {
    pub tree: IndexMap<String, SpatialNode>,
    #[serde(default)]
    pub address: IndexMap<String, Vec<String>>,
}

// ── SpatialTree ───────────────────────────────────────────────────────────────

/// The live spatial memory built from a [`SpatialSeed`].
#[derive(Clone, Debug)]
pub struct SpatialTree {
    tree: IndexMap<String, SpatialNode>,
    shortcuts: IndexMap<String, Vec<String>>,
}

impl SpatialTree {
    pub fn new(seed: SpatialSeed) -> Self {
        let mut shortcuts = seed.address;
        // Every agent that has a living area can find its bed.
        if !shortcuts.contains_key("睡觉")
            && !shortcuts.contains_key("sleeping")
            && let Some(living) = shortcuts.get("living_area").cloned()
        {
            let mut bed = living;
            bed.push("床".to_string());
            shortcuts.insert("睡觉".to_string(), bed);
        }
        Self { tree: seed.tree, shortcuts }
    }

    /// Snapshot back into the config shape.
    pub fn to_seed(&self) -> SpatialSeed {
        SpatialSeed {
            tree: self.tree.clone(),
            address: self.shortcuts.clone(),
        }
    }

    // ── Growth ────────────────────────────────────────────────────────────

    /// Ensure `address` exists in the tree.  The last component becomes a
    /// leaf of the penultimate node; intermediate branches are created on
    /// demand.  Addresses shorter than two components are ignored.
    pub fn add_leaf(&mut self, address: &[String]) {
        fn descend(left: &[String], branch: &mut IndexMap<String, SpatialNode>) {
            match left {
                [arena, object] => {
                    let node = branch
                        .entry(arena.clone())
                        .or_insert_with(|| SpatialNode::Leaves(Vec::new()));
                    match node {
                        SpatialNode::Leaves(leaves) => {
                            if !leaves.contains(object) {
                                leaves.push(object.clone());
                            }
                        }
                        SpatialNode::Branch(inner) => {
                            inner
                                .entry(object.clone())
                                .or_insert_with(|| SpatialNode::Leaves(Vec::new()));
                        }
                    }
                }
                [head, rest @ ..] if !rest.is_empty() => {
                    let node = branch
                        .entry(head.clone())
                        .or_insert_with(|| SpatialNode::Branch(IndexMap::new()));
                    if let SpatialNode::Branch(inner) = node {
                        descend(rest, inner);
                    }
                }
                _ => {}
            }
        }
        descend(address, &mut self.tree);
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    /// The first shortcut whose key appears inside `hint`, if any.
    pub fn find_address(&self, hint: &str) -> Option<&[String]> {
        self.shortcuts
            .iter()
            .find(|(key, _)| hint.contains(key.as_str()))
            .map(|(_, path)| path.as_slice())
    }

    pub fn shortcut(&self, key: &str) -> Option<&[String]> {
        self.shortcuts.get(key).map(Vec::as_slice)
    }

    /// Child names below `address`: branch keys for interior nodes, the leaf
    /// list for arenas.  Empty when the path is absent.
    pub fn get_leaves(&self, address: &[String]) -> Vec<String> {
        let mut branch = &self.tree;
        let mut path = address;
        loop {
            match path {
                [] => return branch.keys().cloned().collect(),
                [head, rest @ ..] => match branch.get(head) {
                    Some(SpatialNode::Branch(inner)) => {
                        branch = inner;
                        path = rest;
                    }
                    Some(SpatialNode::Leaves(leaves)) => {
                        return if rest.is_empty() { leaves.clone() } else { Vec::new() };
                    }
                    None => return Vec::new(),
                },
            }
        }
    }

    /// Descend randomly through non-empty subtrees to a full object address.
    pub fn random_address(&self, rng: &mut AgentRng) -> Vec<String> {
        let mut address = Vec::new();
        let mut branch = &self.tree;
        loop {
            let roots: Vec<&String> = branch
                .iter()
                .filter(|(_, node)| !node.is_empty())
                .map(|(name, _)| name)
                .collect();
            let Some(pick) = rng.choose(&roots) else {
                return address;
            };
            address.push((*pick).clone());
            match &branch[*pick] {
                SpatialNode::Branch(inner) => branch = inner,
                SpatialNode::Leaves(leaves) => {
                    if let Some(leaf) = rng.choose(leaves) {
                        address.push(leaf.clone());
                    }
                    return address;
                }
            }
        }
    }
}
