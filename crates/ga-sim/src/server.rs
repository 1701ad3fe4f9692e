//! The tick loop: think every agent, persist the world, advance the clock.
//!
//! Checkpoints carry the state needed to resume — stride, time, step, the
//! maze reference, and every agent's snapshot — but never credentials; the
//! resume path re-reads the world config for providers and keys, then
//! overlays the latest checkpoint's agent state.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use ga_agent::{Agent, AgentSeed, AgentSpawn, Game};
use ga_core::{AgentRng, Clock, parse_datetime};
use ga_maze::{Maze, MazeDoc};
use ga_memory::Associate;
use ga_output::{
    RecordSink, ResultsRoot, checkpoint_file_name, latest_checkpoint, load_conversation,
    load_json, save_conversation, write_json_atomic,
};
use ga_prompt::{Scratch, TemplateLibrary};

use crate::config::{AgentEntry, MazeRef, WorldConfig, effective_agent_config, selected_personas};
use crate::error::{SimError, SimResult};

// ── Snapshot schema ───────────────────────────────────────────────────────────

/// One `simulate-<stamp>.json` document.
#[derive(Serialize, Deserialize)]
pub struct SnapshotDoc {
    pub stride: u32,
    /// `%Y%m%d-%H:%M` of the tick being persisted.
    pub time: String,
    /// 1-based step counter.
    pub step: u64,
    pub maze: MazeRef,
    pub agents: IndexMap<String, Value>,
}

// ── SimulationServer ──────────────────────────────────────────────────────────

pub struct SimulationServer {
    name: String,
    checkpoints_folder: PathBuf,
    clock: Clock,
    game: Game,
    records: RecordSink,
    status: IndexMap<String, AgentSpawn>,
    maze_ref: MazeRef,
    step: u64,
}

impl SimulationServer {
    /// Stand the world up from config (optionally resuming the latest
    /// checkpoint).  All failures here are fatal startup errors.
    pub fn new(
        name: impl Into<String>,
        static_root: &Path,
        results: &ResultsRoot,
        config: WorldConfig,
        resume: bool,
    ) -> SimResult<Self> {
        let name = name.into();
        let checkpoints_folder = results.checkpoints(&name);
        std::fs::create_dir_all(&checkpoints_folder)?;

        // Resume state: the latest snapshot's clock/step/agent overlays.
        let snapshot: Option<SnapshotDoc> = if resume {
            let path = latest_checkpoint(&checkpoints_folder)?;
            info!(checkpoint = %path.display(), "resuming");
            Some(load_json(&path)?)
        } else {
            None
        };

        // Stride is authoritative from the snapshot on resume.
        let stride = match &snapshot {
            Some(snap) if snap.stride != config.stride => {
                warn!(
                    snapshot = snap.stride,
                    config = config.stride,
                    "stride differs, using snapshot"
                );
                snap.stride
            }
            Some(snap) => snap.stride,
            None => config.stride,
        };
        let clock = match &snapshot {
            Some(snap) => {
                // The persisted tick already ran; pick up one stride later.
                let mut clock = Clock::new(parse_datetime(&snap.time)?, stride);
                clock.advance();
                clock
            }
            None => Clock::new(parse_datetime(&config.time.start)?, stride),
        };
        let step = snapshot.as_ref().map(|s| s.step).unwrap_or(0);

        // The maze and the conversation survive restarts via files.
        let maze_doc: MazeDoc = load_json(&static_root.join(&config.maze.path))?;
        let maze = Maze::from_doc(maze_doc, config.strict_addresses)?;
        let conversation = load_conversation(&checkpoints_folder)?;
        let mut game =
            Game::new(maze, conversation).with_record_interval(config.record_interval);

        // Roster, optionally narrowed by the UI's persona selection.
        let selected = selected_personas(&results.selected_personas());
        let roster: Vec<(String, AgentEntry)> = config
            .agents
            .iter()
            .filter(|(agent_name, _)| {
                selected
                    .as_ref()
                    .is_none_or(|list| list.contains(agent_name))
            })
            .map(|(n, e)| (n.clone(), e.clone()))
            .collect();
        if roster.is_empty() {
            return Err(SimError::Config("no agents to simulate".to_string()));
        }

        let mut status = IndexMap::new();
        for (index, (agent_name, entry)) in roster.iter().enumerate() {
            let mut merged = effective_agent_config(static_root, &config.agent_base, entry)?;
            if let Some(snap) = &snapshot
                && let Some(state) = snap.agents.get(agent_name)
            {
                crate::config::merge(&mut merged, state.clone());
            }
            let seed: AgentSeed = serde_json::from_value(merged)
                .map_err(|e| SimError::Config(format!("agent {agent_name}: {e}")))?;

            let associate = Associate::open(
                results.associate_storage(&name, agent_name),
                config.make_embedder()?,
                seed.associate.clone().unwrap_or_default().params,
                seed.associate.clone().and_then(|a| a.memory),
            )?;
            let scratch = Scratch::new(
                agent_name,
                seed.currently.clone(),
                seed.scratch.clone(),
                TemplateLibrary::bundled(),
                AgentRng::new(config.seed, index as u32 * 2 + 1),
            );
            let agent = Agent::new(
                agent_name,
                seed,
                associate,
                config.make_llm()?,
                scratch,
                AgentRng::new(config.seed, index as u32 * 2),
                &mut game.maze,
                &clock,
            )?;
            status.insert(
                agent_name.clone(),
                AgentSpawn { coord: agent.coord, path: Vec::new() },
            );
            game.add_agent(agent);
            info!(agent = %agent_name, "agent ready");
        }

        let records = RecordSink::open(results, &name);
        Ok(Self {
            name,
            checkpoints_folder,
            clock,
            game,
            records,
            status,
            maze_ref: config.maze,
            step,
        })
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn checkpoints_folder(&self) -> &Path {
        &self.checkpoints_folder
    }

    // ── Tick loop ─────────────────────────────────────────────────────────

    /// Run `steps` ticks.  Each tick thinks every agent in roster order,
    /// writes the checkpoint + conversation, persists records, and advances
    /// the clock by one stride.
    pub fn simulate(&mut self, steps: u64) -> SimResult<()> {
        let target = self.step + steps;
        while self.step < target {
            self.tick(target)?;
        }
        info!(sim = %self.name, step = self.step, "simulation finished");
        Ok(())
    }

    fn tick(&mut self, target: u64) -> SimResult<()> {
        self.step += 1;
        info!(
            "===== Simulate Step[{}/{}, time: {}] =====",
            self.step,
            target,
            self.clock.stamp()
        );

        let mut agents_doc: IndexMap<String, Value> = IndexMap::new();
        let names: Vec<String> = self.status.keys().cloned().collect();
        for name in names {
            let spawn = self.status[&name].clone();
            let result = self
                .game
                .agent_think(&name, spawn, &self.clock, &mut self.records)?;
            info!(
                agent = %name,
                currently = %result.currently,
                address = %result.address,
                model = %result.llm.model,
                "summary"
            );
            for (caller, row) in &result.llm.rows {
                tracing::debug!(agent = %name, caller = %caller, usage = %row);
            }

            // Persist state, then apply the movement jump for the next tick.
            let agent = self.game.agent(&name)?;
            agent.associate.save()?;
            let mut snapshot = serde_json::to_value(agent.to_snapshot())?;
            let slot = self.status.get_mut(&name).ok_or_else(|| {
                SimError::Config(format!("agent {name} lost its status slot"))
            })?;
            if let Some(last) = result.plan.path.last() {
                slot.coord = *last;
                slot.path = Vec::new();
            }
            if let Some(object) = snapshot.as_object_mut() {
                object.insert("coord".to_string(), serde_json::to_value(slot.coord)?);
            }
            agents_doc.insert(name, snapshot);
        }

        // Checkpoint write failures are fatal: the previous checkpoint stays
        // intact thanks to the temp+rename write.
        let stamp = self.clock.stamp();
        let doc = SnapshotDoc {
            stride: self.clock.stride_minutes(),
            time: stamp.clone(),
            step: self.step,
            maze: self.maze_ref.clone(),
            agents: agents_doc,
        };
        write_json_atomic(
            &self.checkpoints_folder.join(checkpoint_file_name(&stamp)),
            &doc,
        )?;
        save_conversation(&self.checkpoints_folder, &self.game.conversation)?;
        if let Err(err) = self.records.save_all() {
            // Side-channel files retry next tick; never fatal.
            warn!(%err, "record write failed");
        }

        self.clock.advance();
        Ok(())
    }
}
