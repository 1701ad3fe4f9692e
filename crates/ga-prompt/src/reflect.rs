//! Reflective prompts: poignancy scoring, insight generation, schedule-time
//! recall, and the terminal-activity generators.

use chrono::Duration;

use ga_core::{Clock, Event};
use ga_llm::PromptCase;
use ga_llm::parse::{cascade, last_capture, scan};
use ga_memory::Concept;

use crate::scratch::Scratch;

fn numbered(nodes: &[Concept]) -> String {
    nodes
        .iter()
        .enumerate()
        .map(|(idx, n)| format!("{idx}. {}", n.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn dated(nodes: &[Concept]) -> String {
    nodes
        .iter()
        .map(|n| format!("{}：{}", n.create.format("%Y-%m-%d %H:%M"), n.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn chat_lines(chats: &[(String, String)]) -> String {
    chats
        .iter()
        .map(|(name, utterance)| format!("{name}: {utterance}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Scratch {
    // ── Poignancy ─────────────────────────────────────────────────────────

    fn poignancy_case(&mut self, template: &str, clock: &Clock, event: &Event) -> PromptCase<u8> {
        let prompt = self.render(
            template,
            &[
                ("base_desc", self.base_desc(clock)),
                ("agent", self.name.clone()),
                ("event", event.describe(true)),
            ],
        );
        let failsafe = self.rng().gen_range(1..=10u8);
        let patterns = cascade(&[r"评分[:： ]+(\d{1,2})", r"(\d{1,2})"]);
        PromptCase::new(prompt, failsafe, move |response| {
            last_capture(response, &patterns)
                .and_then(|s| s.parse::<u8>().ok())
                .map(|score| score.clamp(1, 10))
        })
    }

    /// 1..10 memorability of a witnessed event.
    pub fn poignancy_event(&mut self, clock: &Clock, event: &Event) -> PromptCase<u8> {
        self.poignancy_case("poignancy_event", clock, event)
    }

    /// 1..10 memorability of a conversation.
    pub fn poignancy_chat(&mut self, clock: &Clock, event: &Event) -> PromptCase<u8> {
        self.poignancy_case("poignancy_chat", clock, event)
    }

    // ── Reflection ────────────────────────────────────────────────────────

    /// The `topk` most salient questions the recent memories can answer.
    pub fn reflect_focus(&self, nodes: &[Concept], topk: usize) -> PromptCase<Vec<String>> {
        let prompt = self.render(
            "reflect_focus",
            &[("reference", numbered(nodes)), ("number", topk.to_string())],
        );
        let patterns = cascade(&[r"^\d{1}\. (.*)", r"^\d{1}\) (.*)", r"^\d{1} (.*)"]);
        let failsafe = vec![
            format!("{} 是谁？", self.name),
            format!("{} 住在哪里？", self.name),
            format!("{} 今天要做什么？", self.name),
        ];
        PromptCase::new(prompt, failsafe, move |response| {
            let rows: Vec<String> = scan(response, &patterns)
                .into_iter()
                .filter_map(|row| row.into_iter().next())
                .collect();
            (!rows.is_empty()).then_some(rows)
        })
    }

    /// Up to `topk` insights, each with the indices of its evidence nodes
    /// resolved back to node ids.
    pub fn reflect_insights(
        &self,
        nodes: &[Concept],
        topk: usize,
    ) -> PromptCase<Vec<(String, Vec<String>)>> {
        let prompt = self.render(
            "reflect_insights",
            &[("reference", numbered(nodes)), ("number", topk.to_string())],
        );
        let patterns = cascade(&[
            r"^\d{1}[\. ]+(.*?)[。 ]*[\(（]+.*序号[:： ]+([\d,， ]+)[\)）]",
            r"^\d{1}[\. ]+(.*?)[。 ]*[\(（]([\d,， ]+)[\)）]",
        ]);
        let node_ids: Vec<String> = nodes.iter().map(|n| n.node_id.clone()).collect();
        let failsafe = vec![(
            format!("{} 在考虑下一步该做什么", self.name),
            node_ids.first().cloned().into_iter().collect(),
        )];
        PromptCase::new(prompt, failsafe, move |response| {
            let mut insights = Vec::new();
            for row in scan(response, &patterns) {
                let [insight, evidence] = row.as_slice() else {
                    continue;
                };
                let ids: Vec<String> = evidence
                    .split([',', '，'])
                    .filter_map(|e| e.trim().parse::<usize>().ok())
                    .filter_map(|i| node_ids.get(i).cloned())
                    .collect();
                insights.push((insight.trim().to_string(), ids));
            }
            (!insights.is_empty()).then_some(insights)
        })
    }

    /// What the running chat log means for the agent's plans.
    pub fn reflect_chat_planing(&self, chats: &[(String, String)]) -> PromptCase<String> {
        let prompt = self.render(
            "reflect_chat_planing",
            &[("conversation", chat_lines(chats)), ("agent", self.name.clone())],
        );
        let failsafe = format!("{} 进行了一次对话", self.name);
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }

    /// The most memorable fact inside the running chat log.
    pub fn reflect_chat_memory(&self, chats: &[(String, String)]) -> PromptCase<String> {
        let prompt = self.render(
            "reflect_chat_memory",
            &[("conversation", chat_lines(chats)), ("agent", self.name.clone())],
        );
        let failsafe = format!("{} 进行了一次对话", self.name);
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }

    // ── Schedule-time recall ──────────────────────────────────────────────

    /// Clues from memory about today's plan.
    pub fn retrieve_plan(&mut self, clock: &Clock, nodes: &[Concept]) -> PromptCase<Vec<String>> {
        let prompt = self.render(
            "retrieve_plan",
            &[
                ("description", dated(nodes)),
                ("agent", self.name.clone()),
                ("date", clock.now().format("%Y-%m-%d").to_string()),
            ],
        );
        let describes: Vec<String> = nodes.iter().map(Concept::describe).collect();
        let failsafe: Vec<String> = (0..5)
            .filter_map(|_| self.rng().choose(&describes).cloned())
            .collect();
        let patterns = cascade(&[
            r"^\d{1,2}\. (.*)。",
            r"^\d{1,2}\. (.*)",
            r"^\d{1,2}\) (.*)。",
            r"^\d{1,2}\) (.*)",
        ]);
        PromptCase::new(prompt, failsafe, move |response| {
            let rows: Vec<String> = scan(response, &patterns)
                .into_iter()
                .filter_map(|row| row.into_iter().next())
                .collect();
            (!rows.is_empty()).then_some(rows)
        })
    }

    /// One-line gut feeling distilled from memory.
    pub fn retrieve_thought(&self, nodes: &[Concept]) -> PromptCase<String> {
        let prompt = self.render(
            "retrieve_thought",
            &[("description", dated(nodes)), ("agent", self.name.clone())],
        );
        let failsafe = format!("{} 应该遵循昨天的日程", self.name);
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }

    /// Refresh the currently-string from the plan/thought notes.
    pub fn retrieve_currently(
        &self,
        clock: &Clock,
        plan_note: &[String],
        thought_note: &str,
    ) -> PromptCase<String> {
        let yesterday = (clock.now() - Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let prompt = self.render(
            "retrieve_currently",
            &[
                ("agent", self.name.clone()),
                ("time", yesterday),
                ("currently", self.currently.clone()),
                ("plan", plan_note.join(". ")),
                ("thought", thought_note.to_string()),
                ("current_time", clock.now().format("%Y-%m-%d").to_string()),
            ],
        );
        let patterns = cascade(&[r"^状态[:： ]+(.*)。", r"^状态[:： ]+(.*)"]);
        PromptCase::new(prompt, self.currently.clone(), move |response| {
            last_capture(response, &patterns).filter(|s| !s.is_empty())
        })
    }

    // ── Terminal activities ───────────────────────────────────────────────

    /// What the agent wants to paint at the art terminal.
    pub fn generate_painting_prompt(&self, nodes: &[Concept]) -> PromptCase<String> {
        let prompt = self.render(
            "generate_painting_prompt",
            &[
                ("agent", self.name.clone()),
                ("memory", dated(nodes)),
                ("innate", self.profile.innate.clone()),
                ("learned", self.profile.learned.clone()),
                ("lifestyle", self.profile.lifestyle.clone()),
            ],
        );
        let failsafe = format!("{} 正在思考要画什么", self.name);
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }

    /// What the agent wants to compose at the music terminal.
    pub fn generate_music_prompt(&self, clock: &Clock, nodes: &[Concept]) -> PromptCase<String> {
        let prompt = self.render(
            "generate_music_prompt",
            &[
                ("agent", self.name.clone()),
                ("base_desc", self.base_desc(clock)),
                ("memory", dated(nodes)),
            ],
        );
        let failsafe = format!("{} 正在构思一段旋律", self.name);
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }

    /// A fresh cellular-automaton rule from the life-simulation terminal.
    /// At most the 20 newest memories feed the prompt.
    pub fn generate_game_life_rule(&self, nodes: &[Concept]) -> PromptCase<String> {
        let mut newest: Vec<&Concept> = nodes.iter().collect();
        newest.sort_by(|a, b| b.create.cmp(&a.create));
        newest.truncate(20);
        let memory = if newest.is_empty() {
            "无特定记忆片段可参考。".to_string()
        } else {
            newest
                .iter()
                .map(|n| format!("{}：{}", n.create.format("%Y-%m-%d %H:%M"), n.describe()))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = self.render(
            "generate_game_life_rule",
            &[
                ("agent", self.name.clone()),
                ("memory", memory),
                ("innate", self.profile.innate.clone()),
                ("learned", self.profile.learned.clone()),
                ("lifestyle", self.profile.lifestyle.clone()),
            ],
        );
        let failsafe = format!("{} 正在思考一个全新的生命游戏规则。", self.name);
        PromptCase::new(prompt, failsafe, |response| {
            let text = response.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
    }
}
