//! The game: agent ownership and everything that crosses agent boundaries.
//!
//! `Game` owns the maze, the conversation log, and all agents by index —
//! agents refer to one another only by name, so there are no back-pointers.
//! Cross-agent interactions (chats, waits) run here with split borrows of
//! the agent vector; within a tick, agents are processed strictly one at a
//! time in world-config order.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info};

use ga_core::conversation::ConversationEntry;
use ga_core::event::{PREDICATE_CHAT, PREDICATE_WAIT};
use ga_core::{Clock, ConversationLog, Event};
use ga_llm::LlmSummary;
use ga_maze::{AddressLevel, Coord, Maze};
use ga_memory::{Concept, ConceptKind, Relation};
use ga_output::RecordSink;
use ga_prompt::{ChatContext, UtteranceContext, WaitContext};

use crate::agent::Agent;
use crate::error::{AgentError, AgentResult};

/// Default simulated minutes between `record` flags for one agent.
const DEFAULT_RECORD_INTERVAL: u32 = 30;

// ── Tick outputs ──────────────────────────────────────────────────────────────

/// Rendering hint: an emoji pinned to a coordinate.
#[derive(Clone, Debug, Serialize)]
pub struct EmojiTag {
    pub emoji: String,
    pub coord: Coord,
}

/// The movement plan an agent returns from one tick.
#[derive(Clone, Debug, Serialize)]
pub struct ThinkPlan {
    pub name: String,
    pub path: Vec<Coord>,
    pub emojis: IndexMap<String, EmojiTag>,
}

/// Plan plus the summary block the step log prints.
pub struct ThinkResult {
    pub plan: ThinkPlan,
    pub currently: String,
    pub address: String,
    pub llm: LlmSummary,
    pub record: bool,
}

/// What the driver feeds back into `agent_think` each tick.
#[derive(Clone, Debug)]
pub struct AgentSpawn {
    pub coord: Coord,
    pub path: Vec<Coord>,
}

// ── Game ──────────────────────────────────────────────────────────────────────

pub struct Game {
    pub maze: Maze,
    pub conversation: ConversationLog,
    /// All agents in world-config order.  Use [`add_agent`](Self::add_agent)
    /// to register; the name index tracks insertion.
    pub agents: Vec<Agent>,
    index: FxHashMap<String, usize>,
    record_interval: u32,
}

impl Game {
    pub fn new(maze: Maze, conversation: ConversationLog) -> Self {
        Self {
            maze,
            conversation,
            agents: Vec::new(),
            index: FxHashMap::default(),
            record_interval: DEFAULT_RECORD_INTERVAL,
        }
    }

    pub fn with_record_interval(mut self, minutes: u32) -> Self {
        self.record_interval = minutes.max(1);
        self
    }

    /// Register an agent; insertion order is tick order.
    pub fn add_agent(&mut self, agent: Agent) {
        self.index.insert(agent.name.clone(), self.agents.len());
        self.agents.push(agent);
    }

    pub fn agent(&self, name: &str) -> AgentResult<&Agent> {
        self.index
            .get(name)
            .map(|&i| &self.agents[i])
            .ok_or_else(|| AgentError::UnknownAgent(name.to_string()))
    }

    pub fn agent_mut(&mut self, name: &str) -> AgentResult<&mut Agent> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.agents[i]),
            None => Err(AgentError::UnknownAgent(name.to_string())),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    // ── The tick pipeline ─────────────────────────────────────────────────

    /// Run one agent's full cognition for this tick.  Never fails once the
    /// name resolves: every internal misstep degrades to a no-op plan.
    pub fn agent_think(
        &mut self,
        name: &str,
        spawn: AgentSpawn,
        clock: &Clock,
        records: &mut RecordSink,
    ) -> AgentResult<ThinkResult> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| AgentError::UnknownAgent(name.to_string()))?;
        let names = self.names();

        // 1. Move: maintain tile events on both ends, collect the frame.
        let mut events = {
            let Game { agents, maze, .. } = self;
            agents[i].move_to(maze, spawn.coord, spawn.path)
        };

        // 2. Terminal activities fire only for awake agents in place.
        if self.agents[i].is_awake() {
            let Game { agents, maze, .. } = self;
            agents[i].run_special_activity(clock, maze, records);
        }

        // 3. Today's schedule (created, recalled, decomposed as needed).
        let current = {
            let Game { agents, maze, .. } = self;
            agents[i].make_schedule(clock, maze)
        };

        // 4. Sleep short-circuit: a sleeping plan teleports to bed.
        if let Some((plan_idx, _)) = current {
            let (describe, start, duration) = {
                let plan = self.agents[i].schedule.plan(plan_idx);
                (plan.describe.clone(), plan.start, plan.duration)
            };
            if (describe == "sleeping" || describe.contains('睡')) && self.agents[i].is_awake() {
                let Game { agents, maze, .. } = self;
                let slept = agents[i].go_to_sleep(clock, maze, start, duration);
                events.extend(slept);
            }
        }

        // 5./6. The awake pipeline, or just re-arm a finished action.
        if self.agents[i].is_awake() {
            {
                let Game { agents, maze, .. } = self;
                agents[i].percept(maze, clock);
            }
            let reacted = self.reaction(i, clock);
            if !reacted
                && self.agents[i].path.is_empty()
                && self.agents[i].action.finished(clock.now())
            {
                let action = {
                    let Game { agents, maze, .. } = self;
                    agents[i].determine_action(clock, maze)
                };
                self.agents[i].action = action;
            }
            let Game { agents, maze, .. } = self;
            agents[i].reflect(clock, maze, records);
        } else if self.agents[i].action.finished(clock.now()) {
            let action = {
                let Game { agents, maze, .. } = self;
                agents[i].determine_action(clock, maze)
            };
            self.agents[i].action = action;
        }

        // 7. Pathfinding towards the action's address.
        let persona_coords: IndexMap<String, Coord> = self
            .agents
            .iter()
            .map(|a| (a.name.clone(), a.coord))
            .collect();
        let path = {
            let Game { agents, maze, .. } = self;
            agents[i].find_path(maze, &names, &persona_coords)
        };

        // 8. Emojis: the agent's own bubble plus ambient object events.
        let agent = &mut self.agents[i];
        let mut emojis = IndexMap::new();
        emojis.insert(
            agent.name.clone(),
            EmojiTag { emoji: agent.event().emoji.clone(), coord: agent.coord },
        );
        for (event, coord) in &events {
            if names.contains(&event.subject) {
                continue;
            }
            emojis.insert(
                event.address_key(),
                EmojiTag { emoji: event.emoji.clone(), coord: *coord },
            );
        }

        let record = clock.daily_duration().saturating_sub(agent.last_record)
            > self.record_interval;
        if record {
            agent.last_record = clock.daily_duration();
        }

        Ok(ThinkResult {
            plan: ThinkPlan { name: agent.name.clone(), path, emojis },
            currently: agent.scratch.currently.clone(),
            address: agent.tile_address(&self.maze).join(":"),
            llm: agent.llm.get_summary(),
            record,
        })
    }

    // ── Reactions ─────────────────────────────────────────────────────────

    /// Pick a focus and try to chat with (or wait for) its subject.
    fn reaction(&mut self, i: usize, clock: &Clock) -> bool {
        let names = self.names();

        // Fallback focus: the nearest other agent sharing our arena.
        let arena = self
            .maze
            .tile_at(self.agents[i].coord)
            .address_key(AddressLevel::Arena);
        let vision = self.agents[i].percept_cfg.scope.vision_r as f64;
        let mut nearby: Vec<(f64, Event)> = self
            .agents
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .filter_map(|(_, other)| {
                let other_arena = self
                    .maze
                    .tile_at(other.coord)
                    .address_key(AddressLevel::Arena);
                if other_arena != arena {
                    return None;
                }
                let dist = other.coord.dist(self.agents[i].coord);
                (dist <= vision).then(|| (dist, other.event().clone()))
            })
            .collect();
        nearby.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let nearest = nearby.into_iter().next().map(|(_, event)| event);

        let Some(focus) = self.agents[i].choose_focus(&names, nearest, clock) else {
            return false;
        };
        let subject = focus.event.subject.clone();
        if subject == self.agents[i].name {
            return false;
        }
        let Some(&j) = self.index.get(&subject) else {
            return false;
        };

        let relation = self.agents[i].associate.get_relation(&focus);
        if self.try_chat(i, j, &relation, clock) {
            return true;
        }
        self.try_wait(i, j, &relation, clock)
    }

    /// Anything that rules out reacting with `other` at all.
    fn skip_react(a: &Agent, b: &Agent, clock: &Clock) -> bool {
        // The town sleeps; nobody strikes up a talk at 23:00.
        if clock.hour() >= 23 {
            return true;
        }
        let dormant = |agent: &Agent| {
            let event = agent.event();
            if event.address.is_empty() {
                return true;
            }
            let describe = event.describe(false);
            if describe.contains("sleeping") || describe.contains("睡觉") {
                return true;
            }
            event.predicate == "待开始"
        };
        dormant(a) || dormant(b)
    }

    fn relation_context(relation: &Relation) -> String {
        let events: Vec<String> = relation.events.iter().map(Concept::describe).collect();
        let thoughts: Vec<String> = relation.thoughts.iter().map(Concept::describe).collect();
        format!("{}\n{}", events.join("。"), thoughts.join("。"))
    }

    // ── Chat protocol ─────────────────────────────────────────────────────

    fn try_chat(&mut self, i: usize, j: usize, relation: &Relation, clock: &Clock) -> bool {
        {
            let a = &self.agents[i];
            let b = &self.agents[j];
            if a.schedule.daily_schedule.is_empty() || b.schedule.daily_schedule.is_empty() {
                return false;
            }
            if Self::skip_react(a, b, clock) {
                return false;
            }
            if !b.path.is_empty() {
                return false;
            }
            if a.event().fit(None, Some(PREDICATE_CHAT), None)
                || b.event().fit(None, Some(PREDICATE_CHAT), None)
            {
                return false;
            }
        }

        // A fresh conversation needs an hour of silence between the pair.
        let chat_history = {
            let (a, b) = (&self.agents[i], &self.agents[j]);
            let chats = a.associate.retrieve_chats(Some(&b.name));
            match chats.first() {
                Some(last) => {
                    let delta = clock.minutes_since(last.create);
                    info!(
                        a = %a.name, b = %b.name, delta,
                        last = %last.describe(),
                        "retrieved last chat"
                    );
                    if delta < 60 {
                        return false;
                    }
                    format!(
                        " {} 和 {} 上次在 {} 聊过关于 {} 的话题",
                        a.name,
                        b.name,
                        last.create.format("%Y-%m-%d %H:%M"),
                        last.describe()
                    )
                }
                None => String::new(),
            }
        };

        let decided = {
            let ctx = ChatContext {
                other_name: self.agents[j].name.clone(),
                agent_status: self.agents[i].status_line(),
                other_status: self.agents[j].status_line(),
                focus_context: Self::relation_context(relation),
                chat_history,
            };
            let a = &mut self.agents[i];
            let case = a.scratch.decide_chat(clock, &ctx);
            a.llm.completion(case, "decide_chat")
        };
        if !decided {
            return false;
        }

        info!(a = %self.agents[i].name, b = %self.agents[j].name, "decides chat");
        self.run_chat(i, j, clock);
        true
    }

    fn run_chat(&mut self, i: usize, j: usize, clock: &Clock) {
        let start = clock.now();
        let start_stamp = clock.stamp();
        let Game { agents, maze, conversation, .. } = self;
        let (a, b) = pair_mut(agents, i, j);

        // Each side summarizes its relation to the other before speaking.
        let rel_a = {
            let nodes = a.associate.retrieve_focus(&[b.name.clone()], 50, start);
            let case = a.scratch.summarize_relation(&nodes, &b.name);
            a.llm.completion(case, "summarize_relation")
        };
        let rel_b = {
            let nodes = b.associate.retrieve_focus(&[a.name.clone()], 50, start);
            let case = b.scratch.summarize_relation(&nodes, &a.name);
            b.llm.completion(case, "summarize_relation")
        };

        let mut chats: Vec<(String, String)> = Vec::new();
        for round in 0..a.chat_iter {
            let text = Self::utterance(a, b, &rel_a, &chats, clock, maze);
            if round > 0 {
                if Self::repeats(a, &chats, &text) {
                    break;
                }
                chats.push((a.name.clone(), text));
                if Self::terminates(a, &b.name, &chats) {
                    break;
                }
            } else {
                chats.push((a.name.clone(), text));
            }

            let text = Self::utterance(b, a, &rel_b, &chats, clock, maze);
            if round > 0 && Self::repeats(b, &chats, &text) {
                break;
            }
            chats.push((b.name.clone(), text));
            if Self::terminates(b, &a.name, &chats) {
                break;
            }
        }

        // Canonical transcript entry, names de-spaced.
        let clean_a = a.name.replace(' ', "");
        let clean_b = b.name.replace(' ', "");
        let place = a.event().address.join("，");
        conversation.record(
            start_stamp,
            ConversationEntry {
                header: format!("{clean_a} -> {clean_b} @ {place}"),
                lines: chats.clone(),
            },
        );
        info!(
            a = %clean_a, b = %clean_b, lines = chats.len(),
            "chat finished"
        );

        // Summarize once, splice into both schedules, remember on both sides.
        let summary = {
            let case = a.scratch.summarize_chats(&chats);
            a.llm.completion(case, "summarize_chats")
        };
        let total_chars: usize = chats.iter().map(|(_, text)| text.chars().count()).sum();
        let duration = (total_chars / 240) as u32;
        let (a_name, b_name) = (a.name.clone(), b.name.clone());
        Self::apply_chat(a, &chats, &summary, &b_name, start, duration, clock, maze);
        Self::apply_chat(b, &chats, &summary, &a_name, start, duration, clock, maze);
    }

    /// One side's bookkeeping after a chat ends.
    #[allow(clippy::too_many_arguments)]
    fn apply_chat(
        agent: &mut Agent,
        chats: &[(String, String)],
        summary: &str,
        other_name: &str,
        start: NaiveDateTime,
        duration: u32,
        clock: &Clock,
        maze: &Maze,
    ) {
        agent.chats.extend(chats.iter().cloned());
        let event = Event::new(
            agent.name.clone(),
            PREDICATE_CHAT,
            other_name,
            agent.tile_address(maze),
        )
        .with_describe(summary);
        agent.revise_schedule(clock, event.clone(), start, duration);
        agent.add_concept(clock, ConceptKind::Chat, &event, None, None);
    }

    fn utterance(
        speaker: &mut Agent,
        listener: &Agent,
        relation: &str,
        chats: &[(String, String)],
        clock: &Clock,
        maze: &Maze,
    ) -> String {
        let mut focus = vec![relation.to_string(), listener.event().describe(true)];
        if chats.len() > 4 {
            focus.push(
                chats[chats.len() - 4..]
                    .iter()
                    .map(|(n, t)| format!("{n}: {t}"))
                    .collect::<Vec<_>>()
                    .join("; "),
            );
        }
        let nodes = speaker.associate.retrieve_focus(&focus, 15, clock.now());
        let memory = nodes
            .iter()
            .map(|n| format!("\n- {}", n.describe()))
            .collect::<String>();

        // Conversations within the last eight hours frame this one.
        let mut pass_context = String::new();
        for node in speaker.associate.retrieve_chats(Some(&listener.name)) {
            let delta = clock.minutes_since(node.create);
            if delta > 480 {
                continue;
            }
            pass_context.push_str(&format!(
                "{delta} 分钟前，{} 和 {} 进行过对话。{}\n",
                speaker.name,
                listener.name,
                node.describe()
            ));
        }
        let previous_context = if pass_context.is_empty() {
            String::new()
        } else {
            format!("\n背景：\n\"\"\"\n{pass_context}\"\"\"\n\n")
        };

        let address = speaker.tile_address(maze);
        let place = address
            .iter()
            .rev()
            .take(2)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("，");
        let current_context = format!(
            "{} {} 时，看到 {} {}。",
            speaker.name,
            speaker.event().describe(false),
            listener.name,
            listener.event().describe(false)
        );

        let ctx = UtteranceContext {
            other_name: listener.name.clone(),
            memory,
            address: place,
            previous_context,
            current_context,
            chats: chats.to_vec(),
        };
        let case = speaker.scratch.generate_chat(clock, &ctx);
        speaker.llm.completion(case, "generate_chat")
    }

    fn repeats(agent: &mut Agent, chats: &[(String, String)], content: &str) -> bool {
        let case = agent.scratch.generate_chat_check_repeat(chats, content);
        agent.llm.completion(case, "generate_chat_check_repeat")
    }

    fn terminates(agent: &mut Agent, other_name: &str, chats: &[(String, String)]) -> bool {
        let case = agent.scratch.decide_chat_terminate(other_name, chats);
        agent.llm.completion(case, "decide_chat_terminate")
    }

    // ── Wait protocol ─────────────────────────────────────────────────────

    fn try_wait(&mut self, i: usize, j: usize, relation: &Relation, clock: &Clock) -> bool {
        {
            let a = &self.agents[i];
            let b = &self.agents[j];
            if Self::skip_react(a, b, clock) {
                return false;
            }
            // Waiting only makes sense mid-journey towards a shared spot.
            if a.path.is_empty() {
                return false;
            }
            if a.event().address != b.tile_address(&self.maze) {
                return false;
            }
        }

        let decided = {
            let ctx = WaitContext {
                other_name: self.agents[j].name.clone(),
                focus_context: Self::relation_context(relation),
                agent_status: self.agents[i].status_line(),
                other_status: self.agents[j].status_line(),
                agent_action: self.agents[i].event().describe(false),
                other_action: self.agents[j].event().describe(false),
            };
            let a = &mut self.agents[i];
            let case = a.scratch.decide_wait(clock, &ctx);
            a.llm.completion(case, "decide_wait")
        };
        if !decided {
            return false;
        }

        info!(a = %self.agents[i].name, b = %self.agents[j].name, "decides wait");
        let start = clock.now();
        let wait_minutes = (self.agents[j].action.end() - start).num_minutes().max(0) as u32;

        let a = &mut self.agents[i];
        let mut address = vec!["<waiting>".to_string()];
        address.extend(a.event().address.iter().cloned());
        let describe = a.event().describe(false);
        let event = Event::new(a.name.clone(), PREDICATE_WAIT, describe, address)
            .with_emoji("⌛");
        a.revise_schedule(clock, event, start, wait_minutes);
        debug!(agent = %a.name, wait_minutes, "installed wait action");
        true
    }
}

/// Disjoint mutable access to two agents.
fn pair_mut(agents: &mut [Agent], i: usize, j: usize) -> (&mut Agent, &mut Agent) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = agents.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = agents.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}
