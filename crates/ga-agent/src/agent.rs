//! The agent: state, perception, scheduling, reflection, and movement.
//!
//! One `Agent` owns everything it knows — spatial tree, schedule,
//! associative memory, prompt scratchpad, LLM client, and its deterministic
//! RNG.  It holds no reference to the game or the maze; both are passed into
//! each phase by the orchestrator, so there are no cycles to break.

use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ga_core::event::{OBJECT_SLEEP, PREDICATE_CHAT, PREDICATE_DOING, PREDICATE_OCCUPIED};
use ga_core::{AgentRng, Clock, Event};
use ga_llm::LlmClient;
use ga_maze::{AddressLevel, Coord, Maze, ScopeConfig};
use ga_memory::{
    Action, Associate, Concept, ConceptKind, MemoryLists, Plan, Schedule, SpatialSeed,
    SpatialTree,
};
use ga_output::RecordSink;
use ga_prompt::{AgentProfile, Scratch, tidy_event_describe};

use crate::activity::ActivityThrottle;
use crate::error::{AgentError, AgentResult};

// ── Configuration blocks ──────────────────────────────────────────────────────

/// The `percept` block of an agent config.
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct PerceptConfig {
    #[serde(flatten)]
    pub scope: ScopeConfig,
    /// How many nearby events one tick can take in.
    #[serde(default = "d_att_bandwidth")]
    pub att_bandwidth: usize,
}

fn d_att_bandwidth() -> usize {
    3
}

impl Default for PerceptConfig {
    fn default() -> Self {
        Self {
            scope: ScopeConfig::default(),
            att_bandwidth: d_att_bandwidth(),
        }
    }
}

/// The `think` block of an agent config.
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct ThinkConfig {
    /// Accumulated poignancy that triggers reflection.
    #[serde(default = "d_poignancy_max")]
    pub poignancy_max: u32,
    /// Ticks between think rounds; the driver takes the max across agents.
    #[serde(default = "d_interval")]
    pub interval: u32,
}

fn d_poignancy_max() -> u32 {
    15
}

fn d_interval() -> u32 {
    1
}

impl Default for ThinkConfig {
    fn default() -> Self {
        Self {
            poignancy_max: d_poignancy_max(),
            interval: d_interval(),
        }
    }
}

/// Mutable per-agent counters surfaced in checkpoints.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentStatus {
    pub poignancy: u32,
}

// ── Seed (config DTO) ─────────────────────────────────────────────────────────

/// The `associate` block: store tunables plus (on resume) the id lists.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AssociateSeed {
    #[serde(flatten)]
    pub params: ga_memory::AssociateParams,
    #[serde(default)]
    pub memory: Option<MemoryLists>,
}

/// Deserialization shape of one agent's config (and of its checkpoint
/// snapshot — a snapshot is a loadable seed).
#[derive(Debug, Deserialize)]
pub struct AgentSeed {
    #[serde(default)]
    pub currently: String,
    pub scratch: AgentProfile,
    pub spatial: SpatialSeed,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub associate: Option<AssociateSeed>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub coord: Option<Coord>,
    #[serde(default)]
    pub chats: Vec<(String, String)>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub percept: Option<PerceptConfig>,
    #[serde(default)]
    pub think: Option<ThinkConfig>,
    #[serde(default = "d_chat_iter")]
    pub chat_iter: u32,
}

fn d_chat_iter() -> u32 {
    8
}

/// Per-tick checkpoint payload for one agent.  Loadable back as a seed.
#[derive(Serialize)]
pub struct AgentSnapshot {
    pub status: AgentStatus,
    pub schedule: Schedule,
    pub associate: MemorySnapshot,
    pub chats: Vec<(String, String)>,
    pub currently: String,
    pub scratch: AgentProfile,
    pub spatial: SpatialSeed,
    pub action: Action,
    pub coord: Coord,
}

#[derive(Serialize)]
pub struct MemorySnapshot {
    pub memory: MemoryLists,
}

// ── Agent ─────────────────────────────────────────────────────────────────────

pub struct Agent {
    pub name: String,
    pub percept_cfg: PerceptConfig,
    pub think_cfg: ThinkConfig,
    pub chat_iter: u32,
    pub spatial: SpatialTree,
    pub schedule: Schedule,
    pub associate: Associate,
    pub scratch: Scratch,
    pub llm: LlmClient,
    /// The current percept frame: concepts observed this tick.
    pub concepts: Vec<Concept>,
    /// Running chat log across the whole simulation.
    pub chats: Vec<(String, String)>,
    pub status: AgentStatus,
    pub coord: Coord,
    pub path: Vec<Coord>,
    pub action: Action,
    pub throttles: ActivityThrottle,
    /// Daily minutes at the last record emission.
    pub last_record: u32,
    pub(crate) rng: AgentRng,
}

impl Agent {
    /// Build an agent from its seed, registering its presence on the maze.
    ///
    /// `associate` arrives pre-wired (storage dir + embedder) so this crate
    /// stays agnostic of providers; `scratch` likewise carries the template
    /// library and its own RNG stream.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        seed: AgentSeed,
        associate: Associate,
        llm: LlmClient,
        scratch: Scratch,
        mut rng: AgentRng,
        maze: &mut Maze,
        clock: &Clock,
    ) -> AgentResult<Self> {
        let name = name.into();
        let spatial = SpatialTree::new(seed.spatial);
        let schedule = seed.schedule.unwrap_or_default();

        // Restore the action (resume) or synthesize an idle one in place.
        let (action, coord) = match (seed.action, seed.coord) {
            (Some(action), saved_coord) => {
                let coord = maze
                    .get_address_tiles(&action.event.address, &mut rng)
                    .and_then(|tiles| {
                        let coords: Vec<Coord> = tiles.iter().copied().collect();
                        rng.choose(&coords).copied()
                    })
                    .or(saved_coord)
                    .ok_or_else(|| AgentError::MissingCoord(name.clone()))?;
                (action, coord)
            }
            (None, Some(coord)) => {
                if coord.x >= maze.width() || coord.y >= maze.height() {
                    return Err(AgentError::Maze(ga_maze::MazeError::OutOfBounds(
                        coord,
                        maze.width(),
                        maze.height(),
                    )));
                }
                let address = maze
                    .tile_at(coord)
                    .get_address(AddressLevel::GameObject)
                    .to_vec();
                let object = address.last().cloned().unwrap_or_default();
                let action = Action::new(
                    Event::idle(name.clone(), address.clone()),
                    Some(Event::idle(object, address)),
                    clock.now(),
                    0,
                );
                (action, coord)
            }
            (None, None) => return Err(AgentError::MissingCoord(name.clone())),
        };
        if coord.x >= maze.width() || coord.y >= maze.height() {
            return Err(AgentError::Maze(ga_maze::MazeError::OutOfBounds(
                coord,
                maze.width(),
                maze.height(),
            )));
        }

        let mut agent = Self {
            name,
            percept_cfg: seed.percept.unwrap_or_default(),
            think_cfg: seed.think.unwrap_or_default(),
            chat_iter: seed.chat_iter,
            spatial,
            schedule,
            associate,
            scratch,
            llm,
            concepts: Vec::new(),
            chats: seed.chats,
            status: seed.status.unwrap_or_default(),
            coord,
            path: Vec::new(),
            action,
            throttles: ActivityThrottle::default(),
            last_record: clock.daily_duration(),
            rng,
        };
        agent.move_to(maze, coord, Vec::new());
        Ok(agent)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The agent's own event of the current action.
    pub fn event(&self) -> &Event {
        &self.action.event
    }

    pub fn obj_event(&self) -> Option<&Event> {
        self.action.obj_event.as_ref()
    }

    /// Asleep iff the current event says so (either language).
    pub fn is_awake(&self) -> bool {
        let e = self.event();
        !(e.fit(Some(&self.name), Some(PREDICATE_DOING), Some(OBJECT_SLEEP))
            || e.fit(Some(&self.name), Some("is"), Some("sleeping")))
    }

    pub fn tile_address(&self, maze: &Maze) -> Vec<String> {
        maze.tile_at(self.coord)
            .get_address(AddressLevel::GameObject)
            .to_vec()
    }

    /// One-line status for social prompts: destination while moving, the
    /// current event otherwise.
    pub fn status_line(&self) -> String {
        if !self.path.is_empty() {
            format!("{} 正去往 {}", self.name, self.event().describe(false))
        } else {
            self.event().describe(true)
        }
    }

    pub fn to_snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            status: self.status,
            schedule: self.schedule.clone(),
            associate: MemorySnapshot {
                memory: self.associate.memory().clone(),
            },
            chats: self.chats.clone(),
            currently: self.scratch.currently.clone(),
            scratch: self.scratch.profile.clone(),
            spatial: self.spatial.to_seed(),
            action: self.action.clone(),
            coord: self.coord,
        }
    }

    // ── Movement ──────────────────────────────────────────────────────────

    /// Relocate to `coord`, maintaining tile event sets on both ends.
    /// Returns all events on the ground the agent touched this move.
    pub fn move_to(
        &mut self,
        maze: &mut Maze,
        coord: Coord,
        path: Vec<Coord>,
    ) -> IndexMap<Event, Coord> {
        let mut events = IndexMap::new();

        if self.coord != coord {
            // Leaving: clear our subject events and restore the idle object.
            let old = self.coord;
            let tile = maze.tile_at_mut(old);
            tile.remove_events(Some(&self.name), None);
            if tile.has_address(AddressLevel::GameObject) {
                let address = tile.get_address(AddressLevel::GameObject).to_vec();
                let object = address.last().cloned().unwrap_or_default();
                maze.update_obj(old, &Event::idle(object, address));
            }
            for event in maze.tile_at(old).events() {
                events.insert(event.clone(), old);
            }
        }

        if path.is_empty() {
            // Arriving: stamp our event onto the destination tile.
            let own = self.event().clone();
            let tile = maze.tile_at_mut(coord);
            if tile.update_events(&own) == 0 {
                tile.add_event(own);
            }
            if let Some(obj_event) = self.obj_event().cloned() {
                maze.update_obj(coord, &obj_event);
            }
            for event in maze.tile_at(coord).events() {
                events.insert(event.clone(), coord);
            }
        }

        self.coord = coord;
        self.path = path;
        events
    }

    // ── Scheduling ────────────────────────────────────────────────────────

    /// Ensure today's schedule exists, decomposing the current plan when the
    /// heuristic allows.  Returns the active `(plan, sub_plan)` indices.
    pub fn make_schedule(
        &mut self,
        clock: &Clock,
        maze: &Maze,
    ) -> Option<(usize, Option<usize>)> {
        if self.schedule.scheduled(clock.now().date()) {
            return self.ensure_decomposed(clock);
        }
        info!(agent = %self.name, "making schedule");

        // Refresh the currently-string from what memory says about today.
        if self.associate.nodes_num() > 0 {
            self.associate.cleanup_index(clock.now());
            let focus = vec![
                format!("{} 在 {} 的计划。", self.name, clock.daily_format_cn()),
                format!("在 {} 的生活中，重要的近期事件。", self.name),
            ];
            let retrieved = self.associate.retrieve_focus(&focus, 30, clock.now());
            info!(agent = %self.name, concepts = retrieved.len(), "schedule recall");
            if !retrieved.is_empty() {
                let case = self.scratch.retrieve_plan(clock, &retrieved);
                let plan_note = self.llm.completion(case, "retrieve_plan");
                let case = self.scratch.retrieve_thought(&retrieved);
                let thought_note = self.llm.completion(case, "retrieve_thought");
                let case = self.scratch.retrieve_currently(clock, &plan_note, &thought_note);
                self.scratch.currently = self.llm.completion(case, "retrieve_currently");
            }
        }

        // Wake hour, coarse outline, then the diversified hourly table.
        self.schedule.create = Some(clock.now());
        let case = self.scratch.wake_up(clock);
        let wake_up = self.llm.completion(case, "wake_up");
        let case = self.scratch.schedule_init(clock, wake_up);
        let init_schedule = self.llm.completion(case, "schedule_init");

        let mut hourly: IndexMap<String, String> = IndexMap::new();
        for _ in 0..self.schedule.max_try {
            hourly = (0..wake_up)
                .map(|h| (format!("{h}:00"), OBJECT_SLEEP.to_string()))
                .collect();
            let case = self.scratch.schedule_daily(clock, wake_up, &init_schedule);
            for (time, activity) in self.llm.completion(case, "schedule_daily") {
                hourly.insert(time, activity);
            }
            let distinct: FxHashSet<&String> = hourly.values().collect();
            if distinct.len() >= self.schedule.diversity {
                break;
            }
        }

        // Hour map → contiguous plan list in minutes since midnight.
        let mut starts: Vec<(u32, String)> = hourly
            .into_iter()
            .filter_map(|(time, activity)| {
                let (h, m) = time.split_once(':')?;
                Some((h.parse::<u32>().ok()? * 60 + m.parse::<u32>().ok()?, activity))
            })
            .collect();
        starts.sort_by_key(|(minutes, _)| *minutes);
        for (idx, (start, activity)) in starts.iter().enumerate() {
            let end = starts.get(idx + 1).map(|(s, _)| *s).unwrap_or(24 * 60);
            self.schedule.add_plan(activity.clone(), end.saturating_sub(*start));
        }

        // Remember the day's outline as a thought with an explicit TTL.
        let schedule_time = ga_core::time::format_time_cn(clock.now());
        let thought = format!(
            "这是 {} 在 {} 的计划：{}",
            self.name,
            schedule_time,
            init_schedule.join("；")
        );
        let event = Event::new(self.name.clone(), "计划", schedule_time, self.tile_address(maze))
            .with_describe(thought);
        let expire = clock.now() + Duration::days(30);
        self.add_concept(clock, ConceptKind::Thought, &event, None, Some(expire));

        self.ensure_decomposed(clock)
    }

    /// Decompose the current plan if the heuristic allows and it has not
    /// been already.
    fn ensure_decomposed(&mut self, clock: &Clock) -> Option<(usize, Option<usize>)> {
        let now = clock.daily_duration();
        let (plan_idx, _) = self.schedule.current_index(now)?;
        if Schedule::decomposable(self.schedule.plan(plan_idx)) {
            let case = self.scratch.schedule_decompose(clock, &self.schedule, plan_idx);
            let pieces = self.llm.completion(case, "schedule_decompose");
            let plan = self.schedule.plan_mut(plan_idx);
            let mut start = plan.start;
            plan.decompose = pieces
                .into_iter()
                .enumerate()
                .map(|(idx, (describe, duration))| {
                    let sub = Plan { idx, describe, start, duration, decompose: vec![] };
                    start += duration;
                    sub
                })
                .collect();
        }
        self.schedule.current_index(now)
    }

    /// Install `event` as the running action and re-plan the decomposition
    /// slice it overlaps.
    pub fn revise_schedule(
        &mut self,
        clock: &Clock,
        event: Event,
        start: NaiveDateTime,
        duration: u32,
    ) {
        self.action = Action::new(event, None, start, duration);
        let now = ga_core::daily_duration(start);
        let Some((plan_idx, _)) = self.schedule.current_index(now) else {
            return;
        };
        if self.schedule.plan(plan_idx).decompose.is_empty() {
            return;
        }
        let case = self.scratch.schedule_revise(clock, &self.action, &self.schedule);
        let mut revised = self.llm.completion(case, "schedule_revise");
        for (idx, sub) in revised.iter_mut().enumerate() {
            sub.idx = idx;
        }
        self.schedule.plan_mut(plan_idx).decompose = revised;
    }

    // ── Perception ────────────────────────────────────────────────────────

    /// Look around, grow the spatial tree, and absorb new events as memory
    /// concepts.  Idle events stay frame-local at poignancy 1.
    pub fn percept(&mut self, maze: &Maze, clock: &Clock) {
        let scope = maze.get_scope(self.coord, self.percept_cfg.scope);
        for tile in &scope {
            if tile.has_address(AddressLevel::GameObject) {
                self.spatial.add_leaf(tile.address());
            }
        }

        // Nearest-first events in our own arena only.
        let arena = maze.tile_at(self.coord).address_key(AddressLevel::Arena);
        let mut distances: IndexMap<Event, f64> = IndexMap::new();
        for tile in &scope {
            if !tile.has_events() || tile.address_key(AddressLevel::Arena) != arena {
                continue;
            }
            let dist = tile.coord().dist(self.coord);
            for event in tile.events() {
                let slot = distances.entry(event.clone()).or_insert(f64::INFINITY);
                if dist < *slot {
                    *slot = dist;
                }
            }
        }
        let mut ordered: Vec<(Event, f64)> = distances.into_iter().collect();
        ordered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        self.concepts.clear();
        let mut fresh = 0usize;
        for (idx, (event, _)) in ordered
            .into_iter()
            .take(self.percept_cfg.att_bandwidth)
            .enumerate()
        {
            let recent: FxHashSet<String> = self
                .associate
                .retrieve_events(None)
                .into_iter()
                .chain(self.associate.retrieve_chats(None))
                .map(|c| c.describe())
                .collect();
            if recent.contains(&event.describe(true)) {
                continue;
            }

            if event.fit(None, None, Some("空闲")) || event.fit(None, None, Some("idle")) {
                // Frame-local: enough to trigger social reactions, not worth
                // remembering.
                self.concepts.push(Concept::transient(
                    format!("idle_{idx}"),
                    ConceptKind::Event,
                    event,
                    1,
                    clock.now(),
                ));
            } else {
                fresh += 1;
                let kind = if event.fit(Some(&self.name), Some(PREDICATE_CHAT), None) {
                    ConceptKind::Chat
                } else {
                    ConceptKind::Event
                };
                let concept = self.add_concept(clock, kind, &event, None, None);
                self.status.poignancy += concept.poignancy as u32;
                self.concepts.push(concept);
            }
        }

        self.concepts.retain(|c| c.event.subject != self.name);
        info!(agent = %self.name, fresh, total = self.concepts.len(), "percept");
    }

    /// Score and store an event as a concept.  Idle events are hard-wired to
    /// poignancy 1; everything else asks the model.
    pub fn add_concept(
        &mut self,
        clock: &Clock,
        kind: ConceptKind,
        event: &Event,
        create: Option<NaiveDateTime>,
        expire: Option<NaiveDateTime>,
    ) -> Concept {
        let poignancy = if event.fit(None, Some("此时"), Some("空闲"))
            || event.fit(None, Some("is"), Some("idle"))
        {
            1
        } else if kind == ConceptKind::Chat {
            let case = self.scratch.poignancy_chat(clock, event);
            self.llm.completion(case, "poignancy_chat")
        } else {
            let case = self.scratch.poignancy_event(clock, event);
            self.llm.completion(case, "poignancy_event")
        };
        debug!(agent = %self.name, %event, poignancy, "add associate");
        self.associate
            .add_node(kind, event, poignancy, create, expire, clock.now())
    }

    // ── Acting ────────────────────────────────────────────────────────────

    /// Turn a raw activity description into the agent's event shape.
    pub fn make_event(&self, subject: &str, describe: &str, address: Vec<String>) -> Event {
        Event::new(subject, "此时", tidy_event_describe(subject, describe), address)
            .with_describe(describe)
    }

    /// Decide the next action from the schedule: resolve an address (via
    /// shortcuts or the sector/arena/object cascade), then describe both
    /// sides of it.
    pub fn determine_action(&mut self, clock: &Clock, maze: &Maze) -> Action {
        info!(agent = %self.name, "determining action");
        let now = clock.daily_duration();
        let (plan_describe, sub_describe, sub_start, sub_duration) =
            match self.schedule.current_plan(now) {
                Some((plan, sub)) => (
                    plan.describe.clone(),
                    sub.describe.clone(),
                    sub.start,
                    sub.duration,
                ),
                None => (String::new(), String::new(), now, 0),
            };
        let describes = (plan_describe.as_str(), sub_describe.as_str());

        let address = match self.spatial.find_address(describes.0) {
            Some(address) => address.to_vec(),
            None => {
                let tile = maze.tile_at(self.coord);
                let mut address = tile.get_address(AddressLevel::World).to_vec();
                let current_sector = tile.get_address(AddressLevel::Sector).to_vec();
                let world = address[0].clone();

                let case = self.scratch.determine_sector(
                    describes,
                    &self.spatial,
                    &world,
                    &current_sector,
                );
                address.push(self.llm.completion(case, "determine_sector"));

                let arenas = self.spatial.get_leaves(&address);
                match arenas.as_slice() {
                    [only] => address.push(only.clone()),
                    _ => {
                        let case =
                            self.scratch.determine_arena(describes, &self.spatial, &address);
                        address.push(self.llm.completion(case, "determine_arena"));
                    }
                }

                let objects = self.spatial.get_leaves(&address);
                match objects.as_slice() {
                    [] => {}
                    [only] => address.push(only.clone()),
                    _ => {
                        let case =
                            self.scratch.determine_object(describes, &self.spatial, &address);
                        address.push(self.llm.completion(case, "determine_object"));
                    }
                }
                address
            }
        };

        let object = address.last().cloned().unwrap_or_default();
        let case = self.scratch.describe_event(
            &self.name,
            &sub_describe,
            address.clone(),
            None,
        );
        let mut event = self.llm.completion(case, "describe_event");
        // The renderer shows the sub-plan text as the agent's bubble.
        event.emoji = sub_describe.clone();

        let case = self.scratch.describe_object(&object, &sub_describe);
        let obj_describe = self.llm.completion(case, "describe_object");
        let obj_event = self.make_event(&object, &obj_describe, address);

        // A degenerate slot still deserves a little time on the clock.
        let duration = if sub_duration == 0 { 5 } else { sub_duration };
        Action::new(event, Some(obj_event), clock.daily_time(sub_start), duration)
    }

    /// Teleport to a sleeping place and install the sleeping action pair.
    /// Missing sleep address is non-fatal: the agent just stays up.
    pub fn go_to_sleep(
        &mut self,
        clock: &Clock,
        maze: &mut Maze,
        plan_start: u32,
        plan_duration: u32,
    ) -> IndexMap<Event, Coord> {
        info!(agent = %self.name, "going to sleep");
        let Some(address) = self.spatial.find_address(OBJECT_SLEEP).map(<[String]>::to_vec)
        else {
            warn!(agent = %self.name, "no sleeping address, staying up");
            return IndexMap::new();
        };
        let coords: Vec<Coord> = maze
            .get_address_tiles(&address, &mut self.rng)
            .map(|tiles| tiles.iter().copied().collect())
            .unwrap_or_default();
        let Some(coord) = self.rng.choose(&coords).copied() else {
            warn!(agent = %self.name, ?address, "no sleeping tiles, staying up");
            return IndexMap::new();
        };

        let bed = address.last().cloned().unwrap_or_default();
        self.action = Action::new(
            Event::new(self.name.clone(), PREDICATE_DOING, OBJECT_SLEEP, address.clone())
                .with_emoji("😴"),
            Some(
                Event::new(bed, PREDICATE_OCCUPIED, self.name.clone(), address)
                    .with_emoji("🛌"),
            ),
            clock.daily_time(plan_start),
            plan_duration,
        );
        self.move_to(maze, coord, Vec::new())
    }

    // ── Reflection ────────────────────────────────────────────────────────

    /// Distill accumulated poignancy into new thoughts.  Gated on the
    /// configured threshold; resets the accumulator afterwards.
    pub fn reflect(&mut self, clock: &Clock, maze: &Maze, records: &mut RecordSink) {
        if self.status.poignancy < self.think_cfg.poignancy_max {
            return;
        }
        let mut nodes: Vec<Concept> = self
            .associate
            .retrieve_events(None)
            .into_iter()
            .chain(self.associate.retrieve_thoughts(None))
            .collect();
        if nodes.is_empty() {
            return;
        }
        info!(
            agent = %self.name,
            poignancy = self.status.poignancy,
            max = self.think_cfg.poignancy_max,
            concepts = nodes.len(),
            "reflecting"
        );
        nodes.sort_by(|a, b| b.access.cmp(&a.access));
        nodes.truncate(self.associate.params().max_importance);

        let case = self.scratch.reflect_focus(&nodes, 3);
        let focus = self.llm.completion(case, "reflect_focus");
        let grouped = self.associate.retrieve_focus_grouped(&focus, 30, clock.now());

        for bucket in grouped.values() {
            if bucket.is_empty() {
                continue;
            }
            let case = self.scratch.reflect_insights(bucket, 5);
            let insights = self.llm.completion(case, "reflect_insights");
            for (thought, evidence) in insights {
                self.add_thought(clock, maze, records, &thought, evidence);
            }
        }

        // Two chat-driven thoughts round out the pass.
        let case = self.scratch.reflect_chat_planing(&self.chats);
        let planing = self.llm.completion(case, "reflect_chat_planing");
        let thought = format!("对于 {} 的计划：{planing}", self.name);
        self.add_thought(clock, maze, records, &thought, Vec::new());

        let case = self.scratch.reflect_chat_memory(&self.chats);
        let memory = self.llm.completion(case, "reflect_chat_memory");
        let thought = format!("{} {memory}", self.name);
        self.add_thought(clock, maze, records, &thought, Vec::new());

        self.status.poignancy = 0;
    }

    /// Store a reflection thought in memory and in the reflection records.
    fn add_thought(
        &mut self,
        clock: &Clock,
        maze: &Maze,
        records: &mut RecordSink,
        thought: &str,
        evidence: Vec<String>,
    ) {
        records.reflection.append(ga_output::records::ReflectionEntry {
            time: clock.now().format("%Y-%m-%d %H:%M:%S").to_string(),
            agent: self.name.clone(),
            content: thought.to_string(),
            evidence,
        });
        let event = self.make_event(&self.name, thought, self.tile_address(maze));
        self.add_concept(clock, ConceptKind::Thought, &event, None, None);
    }

    // ── Reaction focus ────────────────────────────────────────────────────

    /// Pick the concept this tick's social reaction should center on.
    ///
    /// Preference order: a percept about another agent, then any non-idle
    /// percept, then (as a last resort) the nearest same-arena agent wrapped
    /// in a transient low-poignancy concept.
    pub(crate) fn choose_focus(
        &mut self,
        names: &[String],
        nearest_event: Option<Event>,
        clock: &Clock,
    ) -> Option<Concept> {
        let about_agents: Vec<&Concept> = self
            .concepts
            .iter()
            .filter(|c| names.contains(&c.event.subject))
            .collect();
        if let Some(pick) = self.rng.choose(&about_agents) {
            return Some((*pick).clone());
        }

        let non_idle: Vec<&Concept> = self
            .concepts
            .iter()
            .filter(|c| !c.describe().contains("空闲"))
            .collect();
        if let Some(pick) = self.rng.choose(&non_idle) {
            return Some((*pick).clone());
        }

        nearest_event.map(|event| {
            debug!(agent = %self.name, subject = %event.subject, "nearby focus fallback");
            Concept::transient(
                format!("nearby_{}", clock.stamp_seconds()),
                ConceptKind::Event,
                event,
                1,
                clock.now(),
            )
        })
    }

    // ── Pathfinding ───────────────────────────────────────────────────────

    /// Choose a path towards the current action's address.  Unreachable or
    /// already-there both come back empty, which the caller reads as "stay".
    pub fn find_path(
        &mut self,
        maze: &Maze,
        agent_names: &[String],
        persona_coords: &IndexMap<String, Coord>,
    ) -> Vec<Coord> {
        let address = self.event().address.clone();
        if !self.path.is_empty() {
            return self.path.clone();
        }
        if address == self.tile_address(maze) {
            return Vec::new();
        }
        if address.first().map(String::as_str) == Some("<waiting>") {
            return Vec::new();
        }

        let target_tiles: Vec<Coord> = if address.first().map(String::as_str) == Some("<persona>")
        {
            let Some(other_coord) = address.get(1).and_then(|n| persona_coords.get(n)) else {
                warn!(agent = %self.name, ?address, "target persona unknown");
                return Vec::new();
            };
            maze.get_around(*other_coord, true)
        } else {
            maze.get_address_tiles(&address, &mut self.rng)
                .map(|tiles| tiles.iter().copied().collect())
                .unwrap_or_default()
        };
        if target_tiles.is_empty() {
            warn!(agent = %self.name, ?address, "no target tiles");
            return Vec::new();
        }
        if target_tiles.contains(&self.coord) {
            return Vec::new();
        }

        // Skip tiles someone is standing on (or our own).
        let mut candidates: Vec<Coord> = target_tiles
            .into_iter()
            .filter(|t| {
                if *t == self.coord {
                    return false;
                }
                !maze
                    .tile_at(*t)
                    .events()
                    .any(|e| agent_names.iter().any(|n| *n == e.subject))
            })
            .collect();
        if candidates.is_empty() {
            warn!(agent = %self.name, "all target tiles occupied");
            return Vec::new();
        }
        if candidates.len() >= 4 {
            candidates = self.rng.sample(&candidates, 4);
        }

        let mut best: Option<Vec<Coord>> = None;
        for target in candidates {
            let path = maze.find_path(self.coord, target);
            if path.is_empty() {
                continue;
            }
            if best.as_ref().is_none_or(|b| path.len() < b.len()) {
                best = Some(path);
            }
        }
        match best {
            Some(path) => path[1..].to_vec(),
            None => Vec::new(),
        }
    }
}
