//! The daily plan.
//!
//! A schedule is an ordered list of [`Plan`]s tiling the day in
//! minutes-since-midnight.  Each plan may carry a finer `decompose` list
//! that tiles the parent's interval exactly.  A schedule is only valid for
//! the day it was created on; the agent regenerates it each morning.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One time-bounded intention.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub idx: usize,
    pub describe: String,
    /// Minutes since midnight.
    pub start: u32,
    /// Minutes.
    pub duration: u32,
    #[serde(default)]
    pub decompose: Vec<Plan>,
}

impl Plan {
    /// `(start, end)` in minutes since midnight.
    #[inline]
    pub fn stamps(&self) -> (u32, u32) {
        (self.start, self.start + self.duration)
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.start + self.duration
    }
}

/// The whole day's plan plus regeneration parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    /// When this schedule was produced; `None` before the first planning.
    #[serde(default, with = "opt_stamp")]
    pub create: Option<NaiveDateTime>,
    #[serde(default)]
    pub daily_schedule: Vec<Plan>,
    /// Minimum number of distinct activities demanded of `schedule_daily`.
    #[serde(default = "default_diversity")]
    pub diversity: usize,
    /// How many times `schedule_daily` may be retried to reach diversity.
    #[serde(default = "default_max_try")]
    pub max_try: u32,
}

fn default_diversity() -> usize {
    5
}

fn default_max_try() -> u32 {
    5
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            create: None,
            daily_schedule: Vec::new(),
            diversity: default_diversity(),
            max_try: default_max_try(),
        }
    }
}

impl Schedule {
    /// Append a plan starting at the previous plan's end (or midnight).
    pub fn add_plan(&mut self, describe: impl Into<String>, duration: u32) {
        let start = self
            .daily_schedule
            .last()
            .map(|p| p.end())
            .unwrap_or_default();
        self.daily_schedule.push(Plan {
            idx: self.daily_schedule.len(),
            describe: describe.into(),
            start,
            duration,
            decompose: Vec::new(),
        });
    }

    /// `true` iff the schedule was created on `today` and has content.
    pub fn scheduled(&self, today: NaiveDate) -> bool {
        !self.daily_schedule.is_empty() && self.create.is_some_and(|c| c.date() == today)
    }

    // ── Current plan ──────────────────────────────────────────────────────

    /// Indices of the plan (and decomposed sub-plan, if any) active at
    /// `now_minutes`.  After the last plan ends, the last plan stays
    /// current.  `None` only for an empty schedule.
    pub fn current_index(&self, now_minutes: u32) -> Option<(usize, Option<usize>)> {
        for (i, plan) in self.daily_schedule.iter().enumerate() {
            if plan.end() <= now_minutes {
                continue;
            }
            for (j, sub) in plan.decompose.iter().enumerate() {
                if sub.end() <= now_minutes {
                    continue;
                }
                return Some((i, Some(j)));
            }
            return Some((i, None));
        }
        (!self.daily_schedule.is_empty()).then(|| (self.daily_schedule.len() - 1, None))
    }

    /// The active `(plan, effective_sub_plan)` pair.  The sub-plan is the
    /// plan itself when no decomposition applies.
    pub fn current_plan(&self, now_minutes: u32) -> Option<(&Plan, &Plan)> {
        let (i, j) = self.current_index(now_minutes)?;
        let plan = &self.daily_schedule[i];
        let sub = j.map(|j| &plan.decompose[j]).unwrap_or(plan);
        Some((plan, sub))
    }

    pub fn plan(&self, idx: usize) -> &Plan {
        &self.daily_schedule[idx]
    }

    pub fn plan_mut(&mut self, idx: usize) -> &mut Plan {
        &mut self.daily_schedule[idx]
    }

    // ── Decomposition heuristic ───────────────────────────────────────────

    /// Whether `plan` should be broken into sub-plans.  Already-decomposed
    /// plans never are; sleep plans only when they are short naps (≤ 1 h)
    /// rather than the night's sleep itself.
    pub fn decomposable(plan: &Plan) -> bool {
        if !plan.decompose.is_empty() {
            return false;
        }
        let d = plan.describe.as_str();
        let sleepy = ["sleep", "bed", "睡", "床"].iter().any(|k| d.contains(k));
        if !sleepy {
            return true;
        }
        if ["sleeping", "asleep", "in bed", "正在睡", "睡着"]
            .iter()
            .any(|k| d.contains(k))
        {
            return false;
        }
        plan.duration <= 60
    }
}

// ── Optional stamp serde ──────────────────────────────────────────────────────

mod opt_stamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use ga_core::time::{STAMP_SECONDS, parse_datetime};

    pub fn serialize<S: Serializer>(
        dt: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => s.serialize_some(&dt.format(STAMP_SECONDS).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|s| parse_datetime(&s).map_err(D::Error::custom))
            .transpose()
    }
}
