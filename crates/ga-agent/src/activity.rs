//! Terminal activities: painting, music, and life-rule generation.
//!
//! When an awake agent's action sits on one of the three terminals, has
//! reached its planned start, and the agent is physically there, the
//! matching generator prompt fires.  Each terminal enforces a per-agent
//! one-hour spacing keyed to the action's *planned end* — the same action
//! observed on a later tick inside the window records nothing.

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use ga_core::Clock;
use ga_maze::{AddressLevel, Maze};
use ga_memory::ConceptKind;
use ga_output::records::ActivityEntry;
use ga_output::{ActivityKind, RecordSink};

use crate::agent::Agent;

/// Minimum spacing between two firings of the same terminal by one agent.
const MIN_SPACING_MINUTES: i64 = 60;

/// Per-agent usage counters for the three terminals.
#[derive(Default)]
pub struct ActivityThrottle {
    state: FxHashMap<ActivityKind, (u32, Option<NaiveDateTime>)>,
}

impl ActivityThrottle {
    /// Register a firing at `planned_end`; `false` when still inside the
    /// spacing window.
    pub fn admit(&mut self, kind: ActivityKind, planned_end: NaiveDateTime) -> bool {
        let (count, last) = self.state.entry(kind).or_default();
        if let Some(last) = last
            && (planned_end - *last).num_minutes() < MIN_SPACING_MINUTES
        {
            return false;
        }
        *count += 1;
        *last = Some(planned_end);
        true
    }

    pub fn count(&self, kind: ActivityKind) -> u32 {
        self.state.get(&kind).map(|(c, _)| *c).unwrap_or(0)
    }
}

/// Emoji / predicate / object / describe shape per terminal.
fn memory_shape(kind: ActivityKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        ActivityKind::Painting => ("创作了", "一幅画作", "🎨"),
        ActivityKind::Music => ("创作了", "一段音乐", "🎵"),
        ActivityKind::Quantum => ("执行了", "一次量子计算", "⚛️"),
    }
}

fn memory_describe(kind: ActivityKind, name: &str, time: &str, content: &str) -> String {
    match kind {
        ActivityKind::Painting => {
            format!("{name} 在 {time} 创作了一幅画作，其核心内容是：{content}")
        }
        ActivityKind::Music => {
            format!("{name} 在 {time} 创作了一段音乐，其核心内容是：{content}")
        }
        ActivityKind::Quantum => {
            format!("{name} 在 {time} 使用了量子生命模拟终端进行了一次计算，其核心内容是：{content}")
        }
    }
}

impl Agent {
    /// Gate and dispatch the terminal activity of the current action, if any.
    pub fn run_special_activity(
        &mut self,
        clock: &Clock,
        maze: &Maze,
        records: &mut RecordSink,
    ) {
        if self.action.finished(clock.now()) {
            return;
        }
        // Arrived early: hold until the planned start.
        if clock.now() < self.action.start {
            debug!(agent = %self.name, start = %self.action.start, "waiting for planned start");
            return;
        }
        let address = self.event().address.clone();
        let Some(terminal) = address.last() else {
            return;
        };
        let Some(kind) = [ActivityKind::Painting, ActivityKind::Music, ActivityKind::Quantum]
            .into_iter()
            .find(|k| k.terminal() == terminal.as_str())
        else {
            return;
        };

        // The plan may point at a terminal the agent hasn't reached yet.
        let here = maze
            .tile_at(self.coord)
            .get_address(AddressLevel::GameObject)
            .to_vec();
        if here.last() != Some(terminal) || here != address {
            debug!(agent = %self.name, ?here, ?address, "not at the terminal yet");
            return;
        }

        info!(agent = %self.name, terminal = %terminal, "running terminal activity");
        self.run_terminal(kind, clock, maze, records);
    }

    fn run_terminal(
        &mut self,
        kind: ActivityKind,
        clock: &Clock,
        maze: &Maze,
        records: &mut RecordSink,
    ) {
        let planned_end = self.action.end();
        if !self.throttles.admit(kind, planned_end) {
            debug!(agent = %self.name, ?kind, "throttled within the hour");
            return;
        }
        let time = planned_end.format("%Y-%m-%d %H:%M:%S").to_string();

        let memory_nodes: Vec<_> = self
            .associate
            .retrieve_events(None)
            .into_iter()
            .chain(self.associate.retrieve_thoughts(None))
            .collect();
        let content = match kind {
            ActivityKind::Painting => {
                let case = self.scratch.generate_painting_prompt(&memory_nodes);
                self.llm.completion(case, "generate_painting_prompt")
            }
            ActivityKind::Music => {
                let case = self.scratch.generate_music_prompt(clock, &memory_nodes);
                self.llm.completion(case, "generate_music_prompt")
            }
            ActivityKind::Quantum => {
                let case = self.scratch.generate_game_life_rule(&memory_nodes);
                self.llm.completion(case, "generate_game_life_rule")
            }
        };

        let appended = records.activity(kind).append(ActivityEntry {
            time: time.clone(),
            agent: self.name.clone(),
            content: content.clone(),
        });
        if !appended {
            warn!(agent = %self.name, ?kind, "duplicate record skipped");
        }

        let (predicate, object, emoji) = memory_shape(kind);
        let describe = memory_describe(kind, &self.name, &time, &content);
        let event = ga_core::Event::new(
            self.name.clone(),
            predicate,
            object,
            self.tile_address(maze),
        )
        .with_describe(describe)
        .with_emoji(emoji);
        let concept = self.add_concept(clock, ConceptKind::Thought, &event, None, None);
        info!(
            agent = %self.name,
            node = %concept.node_id,
            poignancy = concept.poignancy,
            count = self.throttles.count(kind),
            "terminal work remembered"
        );
    }
}
