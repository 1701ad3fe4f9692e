//! Simulated time model.
//!
//! # Design
//!
//! Time is a `chrono::NaiveDateTime` owned by a [`Clock`] value.  The clock
//! belongs to the simulation server and is passed by reference into every
//! component that needs the current instant — there is no process-global
//! timer.  Each tick advances the clock by a fixed `stride` of simulated
//! minutes, so all schedule arithmetic is exact integer math on
//! minutes-since-midnight.
//!
//! # Wire formats
//!
//! Timestamps serialize as `%Y%m%d-%H:%M` (checkpoint file names,
//! conversation keys) or `%Y%m%d-%H:%M:%S` (concept metadata, action
//! starts).  [`parse_datetime`] accepts both.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};

use crate::{GaError, GaResult};

/// Minute-resolution stamp used for checkpoint names and conversation keys.
pub const STAMP_MINUTES: &str = "%Y%m%d-%H:%M";
/// Second-resolution stamp used for persisted datetimes.
pub const STAMP_SECONDS: &str = "%Y%m%d-%H:%M:%S";

// ── Free helpers ──────────────────────────────────────────────────────────────

/// Parse a timestamp in either wire format (seconds first, then minutes).
pub fn parse_datetime(s: &str) -> GaResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, STAMP_SECONDS)
        .or_else(|_| NaiveDateTime::parse_from_str(s, STAMP_MINUTES))
        .map_err(|_| GaError::Timestamp(s.to_string()))
}

/// Minutes elapsed since midnight of `dt`'s day.
#[inline]
pub fn daily_duration(dt: NaiveDateTime) -> u32 {
    dt.time().hour() * 60 + dt.time().minute()
}

/// Render `dt` as a Chinese calendar date, e.g. `2月13日 星期二`.
pub fn format_date_cn(dt: NaiveDateTime) -> String {
    const WEEKDAYS: [&str; 7] = ["一", "二", "三", "四", "五", "六", "日"];
    format!(
        "{}月{}日 星期{}",
        dt.month(),
        dt.day(),
        WEEKDAYS[dt.weekday().num_days_from_monday() as usize]
    )
}

/// Render `dt` as a Chinese clock time, e.g. `2月13日 9点30分`.
pub fn format_time_cn(dt: NaiveDateTime) -> String {
    format!(
        "{}月{}日 {}点{}分",
        dt.month(),
        dt.day(),
        dt.time().hour(),
        dt.time().minute()
    )
}

/// Serde adapter for `NaiveDateTime` fields persisted in the
/// second-resolution wire format.  Use as `#[serde(with = "ga_core::time::stamp")]`.
pub mod stamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use super::{STAMP_SECONDS, parse_datetime};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(STAMP_SECONDS).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_datetime(&raw).map_err(D::Error::custom)
    }
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// The simulation clock: a monotonic simulated datetime plus the tick stride.
///
/// Owned by the simulation server; everything else borrows it.  `Clock` is
/// cheap to copy and holds no heap data.
#[derive(Copy, Clone, Debug)]
pub struct Clock {
    start: NaiveDateTime,
    now: NaiveDateTime,
    stride_minutes: u32,
}

impl Clock {
    /// Create a clock positioned at `start`, advancing `stride_minutes` per tick.
    pub fn new(start: NaiveDateTime, stride_minutes: u32) -> Self {
        Self { start, now: start, stride_minutes }
    }

    /// The datetime of tick 0.
    #[inline]
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// The current simulated instant.
    #[inline]
    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Simulated minutes added per tick.
    #[inline]
    pub fn stride_minutes(&self) -> u32 {
        self.stride_minutes
    }

    /// Advance the clock by one stride.
    #[inline]
    pub fn advance(&mut self) {
        self.forward(self.stride_minutes);
    }

    /// Advance the clock by an arbitrary number of simulated minutes.
    #[inline]
    pub fn forward(&mut self, minutes: u32) {
        self.now += Duration::minutes(minutes as i64);
    }

    // ── Daily arithmetic ──────────────────────────────────────────────────

    /// Minutes elapsed since midnight of the current simulated day.
    #[inline]
    pub fn daily_duration(&self) -> u32 {
        daily_duration(self.now)
    }

    /// The current simulated hour (0–23).
    #[inline]
    pub fn hour(&self) -> u32 {
        self.now.time().hour()
    }

    /// The instant `minutes` after midnight of the current simulated day.
    ///
    /// Inverse of [`daily_duration`]: `daily_duration(daily_time(n)) == n`
    /// for `0 <= n < 1440`.  Minutes beyond the day roll into the next one.
    pub fn daily_time(&self, minutes: u32) -> NaiveDateTime {
        let midnight = self.now.date().and_time(NaiveTime::MIN);
        midnight + Duration::minutes(minutes as i64)
    }

    /// Whole simulated minutes elapsed since `earlier` (negative if in the
    /// future).
    #[inline]
    pub fn minutes_since(&self, earlier: NaiveDateTime) -> i64 {
        (self.now - earlier).num_minutes()
    }

    // ── Formatting ────────────────────────────────────────────────────────

    /// Minute-resolution stamp of the current instant.
    pub fn stamp(&self) -> String {
        self.now.format(STAMP_MINUTES).to_string()
    }

    /// Second-resolution stamp of the current instant.
    pub fn stamp_seconds(&self) -> String {
        self.now.format(STAMP_SECONDS).to_string()
    }

    /// Chinese calendar date of the current instant.
    pub fn daily_format_cn(&self) -> String {
        format_date_cn(self.now)
    }
}

impl std::fmt::Display for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stamp())
    }
}
