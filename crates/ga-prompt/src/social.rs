//! Social prompts: deciding to chat or wait, generating utterances, and
//! summarizing conversations and relations.

use ga_core::Clock;
use ga_llm::PromptCase;
use ga_llm::parse::is_negative;
use ga_memory::Concept;

use crate::scratch::Scratch;

/// Inputs for the chat-or-not decision, assembled by the agent from the
/// focus relation and recent chat memory.
pub struct ChatContext {
    pub other_name: String,
    /// `"<name> 正去往 …"` or the current event describe.
    pub agent_status: String,
    pub other_status: String,
    /// Joined describes of the relation's events and thoughts.
    pub focus_context: String,
    /// `"… 上次在 … 聊过关于 … 的话题"`, or empty for strangers.
    pub chat_history: String,
}

/// Inputs for the wait-or-continue decision.
pub struct WaitContext {
    pub other_name: String,
    pub focus_context: String,
    pub agent_status: String,
    pub other_status: String,
    pub agent_action: String,
    pub other_action: String,
}

/// Inputs for one utterance generation.
pub struct UtteranceContext {
    pub other_name: String,
    /// `"- <memory>"` block from focus retrieval.
    pub memory: String,
    /// `"<arena>，<object>"` of the speaker's tile.
    pub address: String,
    /// Formatted recent-chat background, possibly empty.
    pub previous_context: String,
    /// What the speaker sees the other doing right now.
    pub current_context: String,
    pub chats: Vec<(String, String)>,
}

fn conversation_block(chats: &[(String, String)]) -> String {
    if chats.is_empty() {
        return "[对话尚未开始]".to_string();
    }
    chats
        .iter()
        .map(|(name, utterance)| format!("{name}: {utterance}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Scratch {
    // ── Decisions ─────────────────────────────────────────────────────────

    /// Should the agent start a conversation?  Reads any negative token as
    /// "no"; the failsafe is also "no" — chat only happens on conviction.
    pub fn decide_chat(&self, clock: &Clock, ctx: &ChatContext) -> PromptCase<bool> {
        let prompt = self.render(
            "decide_chat",
            &[
                ("context", ctx.focus_context.clone()),
                ("date", clock.now().format("%Y-%m-%d %H:%M:%S").to_string()),
                ("chat_history", ctx.chat_history.clone()),
                ("agent_status", ctx.agent_status.clone()),
                ("another_status", ctx.other_status.clone()),
                ("agent", self.name.clone()),
                ("another", ctx.other_name.clone()),
            ],
        );
        PromptCase::new(prompt, false, |response| {
            let text = response.trim();
            (!text.is_empty()).then(|| !is_negative(text))
        })
    }

    /// Should the current conversation end here?
    pub fn decide_chat_terminate(
        &self,
        other_name: &str,
        chats: &[(String, String)],
    ) -> PromptCase<bool> {
        let prompt = self.render(
            "decide_chat_terminate",
            &[
                ("conversation", conversation_block(chats)),
                ("agent", self.name.clone()),
                ("another", other_name.to_string()),
            ],
        );
        PromptCase::new(prompt, false, |response| {
            let text = response.trim();
            (!text.is_empty()).then(|| !is_negative(text))
        })
    }

    /// Two-option A/B choice: wait for the other agent, or carry on.
    pub fn decide_wait(&self, clock: &Clock, ctx: &WaitContext) -> PromptCase<bool> {
        let example = |context: &str,
                       date: &str,
                       agent: &str,
                       another: &str,
                       status: &str,
                       another_status: &str,
                       action: &str,
                       another_action: &str,
                       reason: &str,
                       answer: &str| {
            self.render(
                "decide_wait_example",
                &[
                    ("context", context.to_string()),
                    ("date", date.to_string()),
                    ("agent", agent.to_string()),
                    ("another", another.to_string()),
                    ("status", status.to_string()),
                    ("another_status", another_status.to_string()),
                    ("action", action.to_string()),
                    ("another_action", another_action.to_string()),
                    ("reason", reason.to_string()),
                    ("answer", answer.to_string()),
                ],
            )
        };

        let example1 = example(
            "简是丽兹的室友。2022-10-25 07:05，简和丽兹互相问候了早上好。",
            "2022-10-25 07:09",
            "简",
            "丽兹",
            "简 正要去浴室",
            "丽兹 已经在 使用浴室",
            "使用浴室",
            "使用浴室",
            "推理：简和丽兹都想用浴室。两人同时使用浴室会很奇怪。既然丽兹已经在用了，简最好等一等。\n",
            "答案：<选项A>",
        );
        let example2 = example(
            "山姆是莎拉的朋友。2022-10-24 23:00，山姆和莎拉聊了最喜欢的电影。",
            "2022-10-25 12:40",
            "山姆",
            "莎拉",
            "山姆 正要去吃午饭",
            "莎拉 已经在 洗衣服",
            "吃午饭",
            "洗衣服",
            "推理：山姆会在餐厅吃午饭，莎拉在洗衣房洗衣服。两人使用不同的区域，互不冲突，山姆可以继续吃午饭。\n",
            "答案：<选项B>",
        );
        let task = example(
            &ctx.focus_context,
            &clock.now().format("%Y-%m-%d %H:%M").to_string(),
            &self.name,
            &ctx.other_name,
            &ctx.agent_status,
            &ctx.other_status,
            &ctx.agent_action,
            &ctx.other_action,
            "",
            "",
        );

        let prompt = self.render(
            "decide_wait",
            &[
                ("examples_1", example1),
                ("examples_2", example2),
                ("task", task),
            ],
        );
        PromptCase::new(prompt, false, |response| {
            let text = response.trim();
            (!text.is_empty()).then(|| text.contains('A'))
        })
    }

    // ── Generation ────────────────────────────────────────────────────────

    /// One utterance, answered as `{"<name>": "…"}` JSON.
    pub fn generate_chat(&self, clock: &Clock, ctx: &UtteranceContext) -> PromptCase<String> {
        let prompt = self.render(
            "generate_chat",
            &[
                ("agent", self.name.clone()),
                ("base_desc", self.base_desc(clock)),
                ("memory", ctx.memory.clone()),
                ("address", ctx.address.clone()),
                ("current_time", clock.now().format("%H:%M").to_string()),
                ("previous_context", ctx.previous_context.clone()),
                ("current_context", ctx.current_context.clone()),
                ("another", ctx.other_name.clone()),
                ("conversation", conversation_block(&ctx.chats)),
            ],
        );
        let speaker = self.name.clone();
        PromptCase::new(prompt, "嗯".to_string(), move |response| {
            let inner = response.split_once('{')?.1.split_once('}')?.0;
            let value: serde_json::Value = serde_json::from_str(&format!("{{{inner}}}")).ok()?;
            let text = value
                .get(&speaker)
                .and_then(|v| v.as_str())?
                .replace("\n\n", "\n");
            let text = text
                .trim_matches([' ', '\n', '"', '\'', '“', '”', '‘', '’'])
                .to_string();
            (!text.is_empty()).then_some(text)
        })
    }

    /// Is the drafted utterance a repeat of what was already said?
    pub fn generate_chat_check_repeat(
        &self,
        chats: &[(String, String)],
        content: &str,
    ) -> PromptCase<bool> {
        let prompt = self.render(
            "generate_chat_check_repeat",
            &[
                ("conversation", conversation_block(chats)),
                ("content", format!("{}: {content}", self.name)),
                ("agent", self.name.clone()),
            ],
        );
        PromptCase::new(prompt, false, |response| {
            let text = response.trim();
            (!text.is_empty()).then(|| !is_negative(text))
        })
    }

    // ── Summaries ─────────────────────────────────────────────────────────

    /// One-line topic summary of a finished conversation.
    pub fn summarize_chats(&self, chats: &[(String, String)]) -> PromptCase<String> {
        let prompt = self.render(
            "summarize_chats",
            &[("conversation", conversation_block(chats))],
        );
        let failsafe = match chats {
            [(first, _), (second, _), ..] => format!("{first} 和 {second} 之间的普通对话"),
            [(only, _)] => format!("{only} 说的话没有得到回应"),
            [] => "一段没有内容的对话".to_string(),
        };
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }

    /// One-line relation summary seeded from focus-retrieved memories.
    pub fn summarize_relation(&self, nodes: &[Concept], other_name: &str) -> PromptCase<String> {
        let context: Vec<String> = nodes
            .iter()
            .enumerate()
            .map(|(idx, n)| format!("{idx}. {}", n.describe()))
            .collect();
        let prompt = self.render(
            "summarize_relation",
            &[
                ("context", context.join("\n")),
                ("agent", self.name.clone()),
                ("another", other_name.to_string()),
            ],
        );
        let failsafe = format!("{} 认识 {other_name}", self.name);
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }
}
