//! The compression pass: checkpoint sequence + conversation log → one
//! playback artifact.
//!
//! Each tick is inflated into 60 animation frames.  Per agent, the path from
//! its previous coordinate to its new one is recomputed with the maze's BFS;
//! frames while the path still has more than one point show `前往 <target>`,
//! later frames show the action describe (prefixed 😴 while sleeping, 💬
//! while the agent spoke this tick).  This is a pure transform: no state
//! survives beyond the produced document.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ga_core::ConversationLog;
use ga_maze::{Coord, Maze};

use crate::checkpoint::{list_checkpoints, load_conversation, load_json, write_json_atomic};
use crate::error::{OutputError, OutputResult};

/// Animation frames generated per simulation tick.
pub const FRAMES_PER_STEP: u64 = 60;

// ── Checkpoint views (only the fields compression reads) ──────────────────────

#[derive(Deserialize)]
struct SnapshotView {
    stride: u32,
    time: String,
    step: u64,
    agents: IndexMap<String, AgentView>,
}

#[derive(Deserialize)]
struct AgentView {
    coord: Coord,
    #[serde(default)]
    currently: String,
    #[serde(default)]
    scratch: serde_json::Value,
    #[serde(default)]
    action: Option<ActionView>,
}

#[derive(Deserialize)]
struct ActionView {
    event: EventView,
}

#[derive(Clone, Default, Deserialize)]
struct EventView {
    #[serde(default)]
    predicate: String,
    #[serde(default)]
    object: String,
    #[serde(default)]
    describe: String,
    #[serde(default)]
    address: Vec<String>,
}

impl EventView {
    fn action_text(&self) -> String {
        if self.describe.is_empty() {
            format!("{}{}", self.predicate, self.object)
        } else {
            self.describe.clone()
        }
    }
}

// ── Movement document ─────────────────────────────────────────────────────────

/// One agent-frame of the playback artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameEntry {
    pub location: String,
    pub movement: Coord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Initial persona card shown by the replay UI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersonaCard {
    pub currently: String,
    pub scratch: serde_json::Value,
}

/// The single `movement.json` artifact.
#[derive(Serialize, Deserialize)]
pub struct MovementDoc {
    pub start_datetime: String,
    pub stride: u32,
    /// Replay seconds per frame step; equals the stride by convention.
    pub sec_per_step: u32,
    pub persona_init_pos: IndexMap<String, Coord>,
    /// `"0"` plus one entry per inflated frame, each mapping agent → frame.
    pub all_movement: IndexMap<String, IndexMap<String, FrameEntry>>,
    pub description: IndexMap<String, PersonaCard>,
    pub conversation: IndexMap<String, String>,
}

/// Drop the world component and join the rest with a Chinese comma.
fn location_of(address: &[String]) -> String {
    if address.len() < 2 {
        return String::new();
    }
    address[1..].join("，")
}

// ── The pass ──────────────────────────────────────────────────────────────────

/// Read every checkpoint under `checkpoints_folder` and emit
/// `movement.json` into `compressed_folder`.
pub fn compress_simulation(
    checkpoints_folder: &std::path::Path,
    compressed_folder: &std::path::Path,
    maze: &Maze,
) -> OutputResult<MovementDoc> {
    let files = list_checkpoints(checkpoints_folder)?;
    if files.is_empty() {
        return Err(OutputError::NoCheckpoints(checkpoints_folder.to_path_buf()));
    }
    let conversation_log = load_conversation(checkpoints_folder)?;

    let mut doc = MovementDoc {
        start_datetime: String::new(),
        stride: 0,
        sec_per_step: 0,
        persona_init_pos: IndexMap::new(),
        all_movement: IndexMap::new(),
        description: IndexMap::new(),
        conversation: IndexMap::new(),
    };
    doc.all_movement.insert("0".to_string(), IndexMap::new());

    // Per-agent (coord, location) as of the previously processed tick.
    let mut last_state: IndexMap<String, (Coord, String)> = IndexMap::new();

    for file in &files {
        let snapshot: SnapshotView = load_json(file)?;
        doc.stride = snapshot.stride;
        doc.sec_per_step = snapshot.stride;
        if doc.start_datetime.is_empty()
            && let Ok(t) = NaiveDateTime::parse_from_str(&snapshot.time, "%Y%m%d-%H:%M")
        {
            doc.start_datetime = t.format("%Y-%m-%dT%H:%M:%S").to_string();
        }

        let step_conversation = render_conversation(&conversation_log, &snapshot.time);
        let speakers = speakers_at(&conversation_log, &snapshot.time);

        for (name, agent) in &snapshot.agents {
            let event = agent
                .action
                .as_ref()
                .map(|a| a.event.clone())
                .unwrap_or_default();
            let target_location = location_of(&event.address);

            // Seed frame 0 from the first checkpoint.
            if snapshot.step <= 1 && !doc.persona_init_pos.contains_key(name) {
                doc.persona_init_pos.insert(name.clone(), agent.coord);
                doc.description.insert(
                    name.clone(),
                    PersonaCard {
                        currently: agent.currently.clone(),
                        scratch: agent.scratch.clone(),
                    },
                );
                if let Some(frame0) = doc.all_movement.get_mut("0") {
                    frame0.insert(
                        name.clone(),
                        FrameEntry {
                            location: target_location.clone(),
                            movement: agent.coord,
                            action: None,
                            description: Some("正在睡觉".to_string()),
                        },
                    );
                }
            }

            let (source, last_location) = last_state
                .get(name)
                .cloned()
                .unwrap_or((agent.coord, target_location.clone()));

            // No target address means no destination this tick: hold still.
            let (location, mut path) = if target_location.is_empty() {
                (last_location, vec![source])
            } else {
                let mut path = maze.find_path(source, agent.coord);
                if path.is_empty() {
                    path = vec![agent.coord];
                }
                (target_location, path)
            };

            let mut coord = source;
            for i in 0..FRAMES_PER_STEP {
                let moving = path.len() > 1;
                if !path.is_empty() {
                    coord = path.remove(0);
                }
                let action = if moving {
                    format!("前往 {location}")
                } else {
                    let mut action = event.action_text();
                    if action.contains("睡觉") {
                        action = format!("😴 {action}");
                    } else if speakers.iter().any(|s| s == name) {
                        action = format!("💬 {action}");
                    }
                    action
                };

                let frame_key = ((snapshot.step - 1) * FRAMES_PER_STEP + 1 + i).to_string();
                doc.all_movement.entry(frame_key).or_default().insert(
                    name.clone(),
                    FrameEntry {
                        location: location.clone(),
                        movement: coord,
                        action: Some(action),
                        description: None,
                    },
                );
            }
            last_state.insert(name.clone(), (coord, location));
        }

        if !step_conversation.is_empty() {
            doc.conversation.insert(snapshot.time.clone(), step_conversation);
        }
    }

    write_json_atomic(&compressed_folder.join("movement.json"), &doc)?;
    Ok(doc)
}

/// Format one tick's conversations as the replay sidebar text.
fn render_conversation(log: &ConversationLog, stamp: &str) -> String {
    let Some(entries) = log.at(stamp) else {
        return String::new();
    };
    let mut text = String::new();
    for entry in entries {
        if let Some((_, place)) = entry.header.split_once(" @ ") {
            text.push_str(&format!("\n地点：{place}\n\n"));
        }
        for (speaker, utterance) in &entry.lines {
            text.push_str(&format!("{speaker}：{utterance}\n"));
        }
    }
    text
}

/// Names that spoke during the tick at `stamp`.
fn speakers_at(log: &ConversationLog, stamp: &str) -> Vec<String> {
    let Some(entries) = log.at(stamp) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for entry in entries {
        if let Some((pair, _)) = entry.header.split_once(" @ ")
            && let Some((a, b)) = pair.split_once(" -> ")
        {
            for name in [a, b] {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}
