//! Prompt template resolution.
//!
//! Templates live as text files under `prompts/` and are compiled into the
//! binary; a directory override lets a deployment re-word prompts without a
//! rebuild.  Substitution is plain `${field}` replacement — no logic in
//! templates.

use std::path::PathBuf;

use tracing::warn;

macro_rules! builtin {
    ($name:expr) => {
        include_str!(concat!("../prompts/", $name, ".txt"))
    };
}

fn builtin(name: &str) -> Option<&'static str> {
    Some(match name {
        "base_desc" => builtin!("base_desc"),
        "wake_up" => builtin!("wake_up"),
        "schedule_init" => builtin!("schedule_init"),
        "schedule_daily" => builtin!("schedule_daily"),
        "schedule_decompose" => builtin!("schedule_decompose"),
        "schedule_revise" => builtin!("schedule_revise"),
        "determine_sector" => builtin!("determine_sector"),
        "determine_arena" => builtin!("determine_arena"),
        "determine_object" => builtin!("determine_object"),
        "describe_emoji" => builtin!("describe_emoji"),
        "describe_event" => builtin!("describe_event"),
        "describe_object" => builtin!("describe_object"),
        "decide_chat" => builtin!("decide_chat"),
        "decide_chat_terminate" => builtin!("decide_chat_terminate"),
        "decide_wait" => builtin!("decide_wait"),
        "decide_wait_example" => builtin!("decide_wait_example"),
        "generate_chat" => builtin!("generate_chat"),
        "generate_chat_check_repeat" => builtin!("generate_chat_check_repeat"),
        "summarize_chats" => builtin!("summarize_chats"),
        "reflect_focus" => builtin!("reflect_focus"),
        "reflect_insights" => builtin!("reflect_insights"),
        "reflect_chat_planing" => builtin!("reflect_chat_planing"),
        "reflect_chat_memory" => builtin!("reflect_chat_memory"),
        "retrieve_plan" => builtin!("retrieve_plan"),
        "retrieve_thought" => builtin!("retrieve_thought"),
        "retrieve_currently" => builtin!("retrieve_currently"),
        "summarize_relation" => builtin!("summarize_relation"),
        "poignancy_event" => builtin!("poignancy_event"),
        "poignancy_chat" => builtin!("poignancy_chat"),
        "generate_painting_prompt" => builtin!("generate_painting_prompt"),
        "generate_music_prompt" => builtin!("generate_music_prompt"),
        "generate_game_life_rule" => builtin!("generate_game_life_rule"),
        _ => return None,
    })
}

/// Resolves template names to text, preferring an on-disk override.
#[derive(Clone, Debug, Default)]
pub struct TemplateLibrary {
    dir: Option<PathBuf>,
}

impl TemplateLibrary {
    /// Compiled-in templates only.
    pub fn bundled() -> Self {
        Self::default()
    }

    /// Prefer `<dir>/<name>.txt`, falling back to the bundled copy.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    fn load(&self, name: &str) -> String {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.txt"));
            if let Ok(text) = std::fs::read_to_string(&path) {
                return text;
            }
        }
        match builtin(name) {
            Some(text) => text.to_string(),
            None => {
                warn!(template = name, "unknown prompt template");
                String::new()
            }
        }
    }

    /// Render `name` with `${field}` substitution.
    pub fn render(&self, name: &str, fields: &[(&str, String)]) -> String {
        let mut text = self.load(name);
        for (key, value) in fields {
            text = text.replace(&format!("${{{key}}}"), value);
        }
        text.trim_end().to_string()
    }
}
