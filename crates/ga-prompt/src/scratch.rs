//! The prompt scratchpad: agent profile + template assembly.
//!
//! Every LLM call an agent makes starts here.  Each builder returns a
//! [`PromptCase`] carrying the rendered prompt, a typed parser over a
//! tolerant regex cascade, and the failsafe the client falls back to.  The
//! builders in this file cover scheduling, place selection, and event
//! description; social and reflective prompts live in the sibling modules.

use serde::{Deserialize, Serialize};

use ga_core::{AgentRng, Clock, Event};
use ga_llm::parse::{cascade, last_capture, scan};
use ga_llm::PromptCase;
use ga_memory::{Action, Plan, Schedule, SpatialTree};

use crate::templates::TemplateLibrary;

/// The innate/learned profile block of an agent config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentProfile {
    pub age: u32,
    pub innate: String,
    pub learned: String,
    pub lifestyle: String,
    pub daily_plan: String,
}

/// Strip prompt artifacts from an activity description and drop a leading
/// `<subject>此时` / `<subject>` prefix.
pub fn tidy_event_describe(subject: &str, describe: &str) -> String {
    let cleaned: String = describe
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '<' | '>'))
        .collect();
    let cleaned = cleaned.trim();
    for prefix in [format!("{subject}此时"), subject.to_string()] {
        if let Some(rest) = cleaned.strip_prefix(&prefix) {
            return rest.trim_start().to_string();
        }
    }
    cleaned.to_string()
}

// ── Scratch ───────────────────────────────────────────────────────────────────

/// One agent's prompting state.
pub struct Scratch {
    pub name: String,
    /// Free-text one-liner of the agent's present situation; refreshed on
    /// schedule regeneration.
    pub currently: String,
    pub profile: AgentProfile,
    templates: TemplateLibrary,
    rng: AgentRng,
}

impl Scratch {
    pub fn new(
        name: impl Into<String>,
        currently: impl Into<String>,
        profile: AgentProfile,
        templates: TemplateLibrary,
        rng: AgentRng,
    ) -> Self {
        Self {
            name: name.into(),
            currently: currently.into(),
            profile,
            templates,
            rng,
        }
    }

    pub(crate) fn render(&self, template: &str, fields: &[(&str, String)]) -> String {
        self.templates.render(template, fields)
    }

    pub(crate) fn rng(&mut self) -> &mut AgentRng {
        &mut self.rng
    }

    /// The shared profile header prepended to most prompts.
    pub(crate) fn base_desc(&self, clock: &Clock) -> String {
        self.render(
            "base_desc",
            &[
                ("name", self.name.clone()),
                ("age", self.profile.age.to_string()),
                ("innate", self.profile.innate.clone()),
                ("learned", self.profile.learned.clone()),
                ("lifestyle", self.profile.lifestyle.clone()),
                ("daily_plan", self.profile.daily_plan.clone()),
                ("date", clock.daily_format_cn()),
                ("currently", self.currently.clone()),
            ],
        )
    }

    // ── Daily scheduling ──────────────────────────────────────────────────

    /// What hour does the agent wake up?  Clamped to 11:00 at the latest.
    pub fn wake_up(&self, clock: &Clock) -> PromptCase<u32> {
        let prompt = self.render(
            "wake_up",
            &[
                ("base_desc", self.base_desc(clock)),
                ("lifestyle", self.profile.lifestyle.clone()),
                ("agent", self.name.clone()),
            ],
        );
        let patterns = cascade(&[r"(\d{1,2}):00", r"(\d{1,2})"]);
        PromptCase::new(prompt, 6, move |response| {
            last_capture(response, &patterns)
                .and_then(|s| s.parse::<u32>().ok())
                .map(|hour| hour.min(11))
        })
    }

    /// Coarse list of the day's activities.
    pub fn schedule_init(&self, clock: &Clock, wake_up: u32) -> PromptCase<Vec<String>> {
        let prompt = self.render(
            "schedule_init",
            &[
                ("base_desc", self.base_desc(clock)),
                ("lifestyle", self.profile.lifestyle.clone()),
                ("agent", self.name.clone()),
                ("wake_up", wake_up.to_string()),
            ],
        );
        let patterns = cascade(&[
            r"\d{1,2}\. (.*)。",
            r"\d{1,2}\. (.*)",
            r"\d{1,2}\) (.*)。",
            r"\d{1,2}\) (.*)",
            r"(.*)。",
            r"(.*)",
        ]);
        let failsafe = [
            "早上6点起床并完成早晨的例行工作",
            "早上7点吃早餐",
            "早上8点看书",
            "中午12点吃午饭",
            "下午1点小睡一会儿",
            "晚上7点放松一下，看电视",
            "晚上11点睡觉",
        ]
        .map(str::to_string)
        .to_vec();
        PromptCase::new(prompt, failsafe, move |response| {
            let rows: Vec<String> = scan(response, &patterns)
                .into_iter()
                .filter_map(|row| row.into_iter().next())
                .filter(|s| !s.is_empty())
                .collect();
            (!rows.is_empty()).then_some(rows)
        })
    }

    /// Fill the hour-by-hour timetable.  Returns `(H:MM, activity)` pairs.
    pub fn schedule_daily(
        &self,
        clock: &Clock,
        wake_up: u32,
        init_schedule: &[String],
    ) -> PromptCase<Vec<(String, String)>> {
        let mut hourly = String::new();
        for hour in 0..wake_up {
            hourly.push_str(&format!("[{hour}:00] 睡觉\n"));
        }
        for hour in wake_up..24 {
            hourly.push_str(&format!("[{hour}:00] <活动>\n"));
        }
        let prompt = self.render(
            "schedule_daily",
            &[
                ("base_desc", self.base_desc(clock)),
                ("agent", self.name.clone()),
                ("daily_schedule", init_schedule.join("；")),
                ("hourly_schedule", hourly),
            ],
        );

        let name = regex::escape(&self.name);
        let patterns = cascade(&[
            &format!(r"\[(\d{{1,2}}:\d{{2}})\] {name}(.*)。"),
            &format!(r"\[(\d{{1,2}}:\d{{2}})\] {name}(.*)"),
            r"\[(\d{1,2}:\d{2})\] (.*)。",
            r"\[(\d{1,2}:\d{2})\] (.*)",
        ]);
        let failsafe = [
            ("6:00", "起床并完成早晨的例行工作"),
            ("7:00", "吃早餐"),
            ("8:00", "看书"),
            ("9:00", "看书"),
            ("10:00", "看书"),
            ("11:00", "看书"),
            ("12:00", "吃午饭"),
            ("13:00", "小睡一会儿"),
            ("14:00", "小睡一会儿"),
            ("15:00", "小睡一会儿"),
            ("16:00", "继续工作"),
            ("17:00", "继续工作"),
            ("18:00", "回家"),
            ("19:00", "放松，看电视"),
            ("20:00", "放松，看电视"),
            ("21:00", "睡前看书"),
            ("22:00", "准备睡觉"),
            ("23:00", "睡觉"),
        ]
        .map(|(h, a)| (h.to_string(), a.to_string()))
        .to_vec();
        PromptCase::new(prompt, failsafe, move |response| {
            let rows: Vec<(String, String)> = scan(response, &patterns)
                .into_iter()
                .filter_map(|row| {
                    let mut it = row.into_iter();
                    match (it.next(), it.next()) {
                        (Some(time), Some(activity)) => {
                            Some((time, activity.trim().to_string()))
                        }
                        _ => None,
                    }
                })
                .collect();
            // A timetable with fewer than five filled hours is a bad sample.
            (rows.len() >= 5).then_some(rows)
        })
    }

    /// Break the plan at `plan_idx` into `(describe, minutes)` sub-tasks.
    /// The parser pads any shortfall by re-adding the parent describe.
    pub fn schedule_decompose(
        &self,
        clock: &Clock,
        schedule: &Schedule,
        plan_idx: usize,
    ) -> PromptCase<Vec<(String, u32)>> {
        let plan = schedule.plan(plan_idx);
        let hm = |minutes: u32| clock.daily_time(minutes).format("%H:%M").to_string();
        let plan_context: Vec<String> = (plan_idx.saturating_sub(1)
            ..(plan_idx + 2).min(schedule.daily_schedule.len()))
            .map(|i| {
                let p = schedule.plan(i);
                format!("{} 至 {}，{} 计划 {}", hm(p.start), hm(p.end()), self.name, p.describe)
            })
            .collect();
        let increment = ((plan.duration / 100) * 5).max(5);
        let (start, end) = plan.stamps();
        let prompt = self.render(
            "schedule_decompose",
            &[
                ("base_desc", self.base_desc(clock)),
                ("agent", self.name.clone()),
                ("plan", plan_context.join("；")),
                ("increment", increment.to_string()),
                ("start", hm(start)),
                ("end", hm(end)),
            ],
        );

        let patterns = cascade(&[
            r"\d{1,2}\) .*\*计划\* (.*)[\(（]+耗时[:： ]+(\d{1,3})[,， ]+剩余[:： ]*\d*[\)）]",
            r"\d{1,2}\) .*\*计划\* (.*)[\(（]+耗时[:： ]+(\d{1,3})[\)）]",
        ]);
        let duration = plan.duration;
        let describe = plan.describe.clone();
        let failsafe: Vec<(String, u32)> = (0..duration / 10)
            .map(|_| (describe.clone(), 10))
            .collect();
        PromptCase::new(prompt, failsafe, move |response| {
            let mut rows: Vec<(String, u32)> = scan(response, &patterns)
                .into_iter()
                .filter_map(|row| {
                    let mut it = row.into_iter();
                    let text = it.next()?;
                    let minutes: u32 = it.next()?.parse().ok()?;
                    Some((text.trim_matches(['.', ' ']).to_string(), minutes))
                })
                .collect();
            if rows.is_empty() {
                return None;
            }
            let used: u32 = rows.iter().map(|(_, m)| m).sum();
            if used < duration {
                rows.push((describe.clone(), duration - used));
            }
            Some(rows)
        })
    }

    /// Recompute the decomposition slice that overlaps a spliced-in action.
    pub fn schedule_revise(
        &self,
        clock: &Clock,
        action: &Action,
        schedule: &Schedule,
    ) -> PromptCase<Vec<Plan>> {
        let now_minutes = ga_core::daily_duration(action.start);
        let empty = Plan {
            idx: 0,
            describe: String::new(),
            start: 0,
            duration: 0,
            decompose: vec![],
        };
        let (plan, _) = schedule
            .current_plan(now_minutes)
            .unwrap_or((&empty, &empty));
        let hm = |minutes: u32| clock.daily_time(minutes).format("%H:%M").to_string();
        let act_start = action.start.format("%H:%M").to_string();
        let act_end = action.end().format("%H:%M").to_string();

        let mut original = Vec::new();
        let mut revised = Vec::new();
        for sub in &plan.decompose {
            let line = format!("[{} 至 {}] {}", hm(sub.start), hm(sub.end()), sub.describe);
            original.push(line.clone());
            if sub.end() <= now_minutes {
                revised.push(line);
            } else if sub.start <= now_minutes {
                revised.push(format!("[{} 至 {}] {}", hm(sub.start), act_start, sub.describe));
                revised.push(format!(
                    "[{} 至 {}] {}",
                    act_start,
                    act_end,
                    action.event.describe(false)
                ));
            }
        }

        let prompt = self.render(
            "schedule_revise",
            &[
                ("agent", self.name.clone()),
                ("start", hm(plan.start)),
                ("end", hm(plan.end())),
                ("original_plan", original.join("\n")),
                ("duration", action.duration.to_string()),
                ("event", action.event.describe(true)),
                ("new_plan", revised.join("\n")),
            ],
        );

        let patterns = cascade(&[
            r"^\[(\d{1,2}:\d{1,2}) ?- ?(\d{1,2}:\d{1,2})\] (.*)",
            r"^\[(\d{1,2}:\d{1,2}) ?~ ?(\d{1,2}:\d{1,2})\] (.*)",
            r"^\[(\d{1,2}:\d{1,2}) ?至 ?(\d{1,2}:\d{1,2})\] (.*)",
        ]);
        let failsafe = plan.decompose.clone();
        PromptCase::new(prompt, failsafe, move |response| {
            let to_minutes = |s: &str| -> Option<u32> {
                let (h, m) = s.split_once(':')?;
                Some(h.parse::<u32>().ok()? * 60 + m.parse::<u32>().ok()?)
            };
            let mut decompose = Vec::new();
            for row in scan(response, &patterns) {
                let [start, end, describe] = row.as_slice() else {
                    continue;
                };
                let (Some(start), Some(end)) = (to_minutes(start), to_minutes(end)) else {
                    continue;
                };
                decompose.push(Plan {
                    idx: decompose.len(),
                    describe: describe.clone(),
                    start,
                    duration: end.saturating_sub(start),
                    decompose: vec![],
                });
            }
            (!decompose.is_empty()).then_some(decompose)
        })
    }

    // ── Place selection ───────────────────────────────────────────────────

    /// Pick the sector the current plan should happen in.
    pub fn determine_sector(
        &mut self,
        describes: (&str, &str),
        spatial: &SpatialTree,
        world: &str,
        current_sector_address: &[String],
    ) -> PromptCase<String> {
        let live_address: Vec<String> = spatial
            .find_address("living_area")
            .map(|a| a[..a.len().saturating_sub(1)].to_vec())
            .unwrap_or_default();
        let world_address = vec![world.to_string()];
        let sectors = spatial.get_leaves(&world_address);

        // Arena name → owning sector, for answers that name a place instead
        // of its sector.
        let mut arena_owner: Vec<(String, String)> = Vec::new();
        for sector in &sectors {
            let mut address = world_address.clone();
            address.push(sector.clone());
            for arena in spatial.get_leaves(&address) {
                if arena_owner.iter().all(|(a, _)| *a != arena) {
                    arena_owner.push((arena, sector.clone()));
                }
            }
        }

        let prompt = self.render(
            "determine_sector",
            &[
                ("agent", self.name.clone()),
                ("live_sector", live_address.last().cloned().unwrap_or_default()),
                ("live_arenas", spatial.get_leaves(&live_address).join(", ")),
                (
                    "current_sector",
                    current_sector_address.last().cloned().unwrap_or_default(),
                ),
                (
                    "current_arenas",
                    spatial.get_leaves(current_sector_address).join(", "),
                ),
                ("daily_plan", self.profile.daily_plan.clone()),
                ("areas", sectors.join(", ")),
                ("complete_plan", describes.0.to_string()),
                ("decomposed_plan", describes.1.to_string()),
            ],
        );

        let failsafe = self
            .rng
            .choose(&sectors)
            .cloned()
            .unwrap_or_default();
        let patterns = cascade(&[
            r".*应该去[:： ]*(.*)。",
            r".*应该去[:： ]*(.*)",
            r"(.+)。",
            r"(.+)",
        ]);
        let fallback = failsafe.clone();
        PromptCase::new(prompt, failsafe, move |response| {
            let answer = last_capture(response, &patterns)?;
            let answer = answer.trim();
            if sectors.iter().any(|s| s == answer) {
                return Some(answer.to_string());
            }
            if let Some((_, owner)) = arena_owner.iter().find(|(a, _)| a == answer) {
                return Some(owner.clone());
            }
            if let Some(sector) = sectors.iter().find(|s| answer.starts_with(s.as_str())) {
                return Some(sector.clone());
            }
            Some(fallback.clone())
        })
    }

    /// Pick the arena inside the chosen sector.
    pub fn determine_arena(
        &mut self,
        describes: (&str, &str),
        spatial: &SpatialTree,
        address: &[String],
    ) -> PromptCase<String> {
        let arenas = spatial.get_leaves(address);
        let prompt = self.render(
            "determine_arena",
            &[
                ("agent", self.name.clone()),
                ("target_sector", address.last().cloned().unwrap_or_default()),
                ("target_arenas", arenas.join(", ")),
                ("daily_plan", self.profile.daily_plan.clone()),
                ("complete_plan", describes.0.to_string()),
                ("decomposed_plan", describes.1.to_string()),
            ],
        );
        let failsafe = self.rng.choose(&arenas).cloned().unwrap_or_default();
        let patterns = cascade(&[
            r".*应该去[:： ]*(.*)。",
            r".*应该去[:： ]*(.*)",
            r"(.+)。",
            r"(.+)",
        ]);
        let fallback = failsafe.clone();
        PromptCase::new(prompt, failsafe, move |response| {
            let answer = last_capture(response, &patterns)?;
            let answer = answer.trim().to_string();
            Some(if arenas.contains(&answer) { answer } else { fallback.clone() })
        })
    }

    /// Pick the game object to act on.
    pub fn determine_object(
        &mut self,
        describes: (&str, &str),
        spatial: &SpatialTree,
        address: &[String],
    ) -> PromptCase<String> {
        let objects = spatial.get_leaves(address);
        let prompt = self.render(
            "determine_object",
            &[
                ("activity", describes.1.to_string()),
                ("objects", objects.join(", ")),
            ],
        );
        let failsafe = self.rng.choose(&objects).cloned().unwrap_or_default();
        let patterns = cascade(&[r".*是[:： ]*(.*)。", r".*是[:： ]*(.*)", r"(.+)。", r"(.+)"]);
        let fallback = failsafe.clone();
        PromptCase::new(prompt, failsafe, move |response| {
            let answer = last_capture(response, &patterns)?;
            let answer = answer.trim().to_string();
            Some(if objects.contains(&answer) { answer } else { fallback.clone() })
        })
    }

    // ── Event description ─────────────────────────────────────────────────

    /// Up to three emoji for an activity.  Not worth a long retry budget.
    pub fn describe_emoji(&self, describe: &str) -> PromptCase<String> {
        let prompt = self.render("describe_emoji", &[("action", describe.to_string())]);
        let emoji_patterns = cascade(&[concat!(
            "([\u{1F300}-\u{1F5FF}]|[\u{1F600}-\u{1F64F}]|[\u{1F680}-\u{1F6FF}]|",
            "[\u{1F700}-\u{1F77F}]|[\u{1F900}-\u{1F9FF}]|[\u{1FA00}-\u{1FAFF}]|",
            "[\u{2702}-\u{27B0}])"
        )]);
        PromptCase::new(prompt, String::new(), move |response| {
            let found: String = scan(response, &emoji_patterns)
                .into_iter()
                .filter_map(|row| row.into_iter().next())
                .collect();
            if found.is_empty() {
                return None;
            }
            Some(found.chars().take(3).collect())
        })
        .with_retry(1)
    }

    /// Rewrite an activity into a `(subject, predicate, object)` event.
    pub fn describe_event(
        &self,
        subject: &str,
        describe: &str,
        address: Vec<String>,
        emoji: Option<String>,
    ) -> PromptCase<Event> {
        let prompt = self.render("describe_event", &[("action", describe.to_string())]);
        let failsafe = Event::new(
            subject,
            "此时",
            tidy_event_describe(subject, describe),
            address.clone(),
        )
        .with_describe(describe)
        .with_emoji(emoji.clone().unwrap_or_default());

        let patterns = cascade(&[
            r"[\(（]<(.+?)>[,， ]+<(.+?)>[,， ]+<(.*)>[\)）]",
            r"[\(（](.+?)[,， ]+(.+?)[,， ]+(.*)[\)）]",
        ]);
        let describe = describe.to_string();
        let emoji = emoji.unwrap_or_default();
        PromptCase::new(prompt, failsafe, move |response| {
            // Models sometimes pack several tuples on one line; give each
            // closing paren its own line before scanning.
            let split = response.replace(')', ")\n").replace('）', "）\n");
            for line in split.lines() {
                let line = line.trim();
                if line.chars().count() < 7 {
                    continue;
                }
                if line.matches(['(', '（']).count() > 1 || line.matches([')', '）']).count() > 1 {
                    continue;
                }
                if let Some(row) = scan(line, &patterns).into_iter().next()
                    && let [s, p, o] = row.as_slice()
                {
                    return Some(
                        Event::new(s.clone(), p.clone(), o.clone(), address.clone())
                            .with_describe(describe.clone())
                            .with_emoji(emoji.clone()),
                    );
                }
            }
            None
        })
    }

    /// Describe the state of the game object being used.
    pub fn describe_object(&self, object: &str, describe: &str) -> PromptCase<String> {
        let prompt = self.render(
            "describe_object",
            &[
                ("object", object.to_string()),
                ("agent", self.name.clone()),
                ("action", describe.to_string()),
            ],
        );
        let escaped = regex::escape(object);
        let patterns = cascade(&[
            &format!(r"<{escaped}> ?(.*)。"),
            &format!(r"<{escaped}> ?(.*)"),
        ]);
        PromptCase::new(prompt, "空闲".to_string(), move |response| {
            last_capture(response, &patterns).filter(|s| !s.is_empty())
        })
    }
}
