//! The currently executing action.
//!
//! An action pairs the agent's own event with an optional game-object event
//! (the bench being sat on, the bed being occupied).  An action with no
//! duration or no address is vacuously finished.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use ga_core::Event;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub event: Event,
    #[serde(default)]
    pub obj_event: Option<Event>,
    #[serde(with = "ga_core::time::stamp")]
    pub start: NaiveDateTime,
    /// Minutes.
    pub duration: u32,
}

impl Action {
    pub fn new(
        event: Event,
        obj_event: Option<Event>,
        start: NaiveDateTime,
        duration: u32,
    ) -> Self {
        Self { event, obj_event, start, duration }
    }

    /// `start + duration`.
    #[inline]
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(self.duration as i64)
    }

    /// Finished when there is nothing to do (no duration or no address) or
    /// the simulated clock has passed the end.
    pub fn finished(&self, now: NaiveDateTime) -> bool {
        if self.duration == 0 {
            return true;
        }
        if self.event.address.is_empty() {
            return true;
        }
        now > self.end()
    }

    /// One-line summary for the step log.
    pub fn summary(&self, now: NaiveDateTime) -> String {
        format!(
            "{} [{}~{}] {}",
            if self.finished(now) { "已完成" } else { "进行中" },
            self.start.format("%Y%m%d-%H:%M"),
            self.end().format("%Y%m%d-%H:%M"),
            self.event
        )
    }
}
