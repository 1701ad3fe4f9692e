//! Human-readable Markdown report of a simulation.
//!
//! Two sections: the persona cards from the first checkpoint, then one
//! heading per tick listing what changed for each agent, with that tick's
//! dialogue block-quoted underneath.

use std::fs;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::checkpoint::{list_checkpoints, load_conversation, load_json};
use crate::error::{OutputError, OutputResult};

#[derive(Deserialize)]
struct SnapshotView {
    time: String,
    agents: IndexMap<String, AgentView>,
}

#[derive(Deserialize)]
struct AgentView {
    #[serde(default)]
    currently: String,
    #[serde(default)]
    scratch: Option<ProfileView>,
    #[serde(default)]
    action: Option<ActionView>,
}

#[derive(Deserialize)]
struct ProfileView {
    #[serde(default)]
    age: u32,
    #[serde(default)]
    innate: String,
    #[serde(default)]
    learned: String,
    #[serde(default)]
    lifestyle: String,
}

#[derive(Deserialize)]
struct ActionView {
    event: EventView,
}

#[derive(Deserialize)]
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

/// Render `simulation.md` next to `movement.json`.
pub fn write_report(
    checkpoints_folder: &std::path::Path,
    compressed_folder: &std::path::Path,
) -> OutputResult<()> {
    let files = list_checkpoints(checkpoints_folder)?;
    if files.is_empty() {
        return Err(OutputError::NoCheckpoints(checkpoints_folder.to_path_buf()));
    }
    let conversation = load_conversation(checkpoints_folder)?;

    let mut out = String::new();

    // ── Persona cards from the first checkpoint ───────────────────────────
    let first: SnapshotView = load_json(&files[0])?;
    out.push_str("# 基础人设\n\n");
    for (name, agent) in &first.agents {
        let clean = name.replace(' ', "");
        out.push_str(&format!("## {clean}\n\n"));
        if let Some(profile) = &agent.scratch {
            out.push_str(&format!("年龄：{}岁  \n", profile.age));
            out.push_str(&format!("先天：{}  \n", profile.innate));
            out.push_str(&format!("后天：{}  \n", profile.learned));
            out.push_str(&format!("生活习惯：{}  \n", profile.lifestyle));
        }
        out.push_str(&format!("当前状态：{}\n\n", agent.currently));
    }

    // ── Tick-by-tick activity ─────────────────────────────────────────────
    out.push_str("# 模拟过程\n\n");
    let mut last_line: IndexMap<String, String> = IndexMap::new();
    for file in &files {
        let snapshot: SnapshotView = load_json(file)?;
        let mut section = String::new();

        for (name, agent) in &snapshot.agents {
            let clean = name.replace(' ', "");
            let Some(action) = &agent.action else {
                continue;
            };
            let event = &action.event;
            let describe = if event.describe.is_empty() {
                format!("{}{}", event.predicate, event.object)
            } else {
                event.describe.clone()
            };
            let location = if event.address.len() > 1 {
                event.address[1..].join("，")
            } else {
                String::new()
            };
            let line = format!("- **{clean}**（{location}）：{describe}\n");
            // Only report changes, or the section drowns in repeats.
            if last_line.get(&clean) == Some(&line) {
                continue;
            }
            last_line.insert(clean, line.clone());
            section.push_str(&line);
        }

        if let Some(entries) = conversation.at(&snapshot.time) {
            for entry in entries {
                section.push('\n');
                section.push_str(&format!("> **{}**\n", entry.header));
                for (speaker, utterance) in &entry.lines {
                    section.push_str(&format!("> {speaker}：{utterance}\n"));
                }
            }
        }

        if !section.is_empty() {
            out.push_str(&format!("## {}\n\n", snapshot.time));
            out.push_str(&section);
            out.push('\n');
        }
    }

    fs::create_dir_all(compressed_folder)?;
    fs::write(compressed_folder.join("simulation.md"), out)?;
    Ok(())
}
