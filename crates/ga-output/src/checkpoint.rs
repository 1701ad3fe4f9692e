//! Checkpoint and conversation file IO.
//!
//! Checkpoints are one JSON document per tick named
//! `simulate-<YYYYMMDD-HHMM>.json` (colon dropped for the filesystem).
//! Writes go through a temp file + rename so a crash mid-write can never
//! destroy the previous checkpoint.  The schema itself belongs to `ga-sim`;
//! this module only moves documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use ga_core::ConversationLog;

use crate::error::{OutputError, OutputResult};

const CONVERSATION_FILE: &str = "conversation.json";

/// File name for the checkpoint at `stamp` (`%Y%m%d-%H:%M`).
pub fn checkpoint_file_name(stamp: &str) -> String {
    format!("simulate-{}.json", stamp.replace(':', ""))
}

/// Serialize `value` to `path` via write-to-temp + rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> OutputResult<T> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|err| OutputError::MalformedCheckpoint {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// All checkpoint files under `folder`, name-sorted (chronological, given
/// the stamp naming).  `conversation.json` is excluded.
pub fn list_checkpoints(folder: &Path) -> OutputResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("simulate-") && name.ends_with(".json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The most recent checkpoint, or an error naming the folder when there is
/// none to resume from.
pub fn latest_checkpoint(folder: &Path) -> OutputResult<PathBuf> {
    list_checkpoints(folder)?
        .pop()
        .ok_or_else(|| OutputError::NoCheckpoints(folder.to_path_buf()))
}

// ── Conversation log ──────────────────────────────────────────────────────────

pub fn save_conversation(folder: &Path, log: &ConversationLog) -> OutputResult<()> {
    write_json_atomic(&folder.join(CONVERSATION_FILE), log)
}

/// Load the cumulative conversation log; absent file means a fresh one.
pub fn load_conversation(folder: &Path) -> OutputResult<ConversationLog> {
    let path = folder.join(CONVERSATION_FILE);
    if !path.is_file() {
        return Ok(ConversationLog::new());
    }
    load_json(&path)
}
