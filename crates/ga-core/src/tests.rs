//! Unit tests for ga-core.

use crate::conversation::{ConversationEntry, ConversationLog};
use crate::event::Event;
use crate::rng::AgentRng;
use crate::time::{Clock, daily_duration, format_date_cn, parse_datetime};

// ── Clock ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod clock {
    use super::*;

    fn clock() -> Clock {
        Clock::new(parse_datetime("20240213-09:30").unwrap(), 10)
    }

    #[test]
    fn advance_moves_by_stride() {
        let mut c = clock();
        c.advance();
        assert_eq!(c.stamp(), "20240213-09:40");
        c.forward(25);
        assert_eq!(c.stamp(), "20240213-10:05");
    }

    #[test]
    fn daily_duration_counts_minutes_since_midnight() {
        assert_eq!(clock().daily_duration(), 9 * 60 + 30);
    }

    #[test]
    fn daily_time_inverts_daily_duration() {
        let c = clock();
        for minutes in [0u32, 1, 9 * 60 + 30, 23 * 60 + 59] {
            assert_eq!(daily_duration(c.daily_time(minutes)), minutes);
        }
    }

    #[test]
    fn stamps_roundtrip_both_resolutions() {
        let dt = parse_datetime("20240213-09:30:05").unwrap();
        assert_eq!(dt.format("%Y%m%d-%H:%M:%S").to_string(), "20240213-09:30:05");
        assert!(parse_datetime("not a stamp").is_err());
    }

    #[test]
    fn minutes_since_is_signed() {
        let mut c = clock();
        let earlier = c.now();
        c.forward(45);
        assert_eq!(c.minutes_since(earlier), 45);
        assert_eq!(c.minutes_since(c.now() + chrono::Duration::minutes(5)), -5);
    }

    #[test]
    fn chinese_date_format() {
        // 2024-02-13 is a Tuesday.
        assert_eq!(format_date_cn(clock().now()), "2月13日 星期二");
    }
}

// ── Event ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod event {
    use super::*;

    fn addr() -> Vec<String> {
        vec!["小镇".into(), "公园".into(), "草坪".into(), "长椅".into()]
    }

    #[test]
    fn idle_defaults() {
        let e = Event::idle("长椅", addr());
        assert!(e.fit(Some("长椅"), Some("此时"), Some("空闲")));
        assert_eq!(e.describe(true), "长椅 此时 空闲");
    }

    #[test]
    fn equality_covers_full_identity() {
        let a = Event::new("甲", "正在", "看书", addr());
        let b = Event::new("甲", "正在", "看书", addr());
        assert_eq!(a, b);
        let c = Event::new("甲", "正在", "看书", vec!["小镇".into()]);
        assert_ne!(a, c);
        let d = a.clone().with_describe("甲 正在公园看书");
        assert_ne!(a, d);
    }

    #[test]
    fn describe_strips_and_prepends_subject() {
        let e = Event::new("甲", "正在", "看书", addr()).with_describe("甲 在长椅上看书");
        assert_eq!(e.describe(true), "甲 在长椅上看书");
        assert_eq!(e.describe(false), "在长椅上看书");

        let f = Event::new("乙", "正在", "散步", addr());
        assert_eq!(f.describe(true), "乙 正在 散步");
        assert_eq!(f.describe(false), "正在 散步");
    }

    #[test]
    fn serde_roundtrip_preserves_identity() {
        let e = Event::new("甲", "正在", "看书", addr())
            .with_describe("甲 在长椅上看书")
            .with_emoji("📖");
        let json = serde_json::to_string(&e).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
        assert_eq!(back.emoji, "📖");
    }

    #[test]
    fn display_appends_address() {
        let e = Event::new("甲", "正在", "看书", addr());
        assert_eq!(e.to_string(), "甲 正在 看书 @ 小镇:公园:草坪:长椅");
    }
}

// ── AgentRng ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod rng {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = AgentRng::new(42, 3);
        let mut b = AgentRng::new(42, 3);
        for _ in 0..16 {
            assert_eq!(a.gen_range(0..1000), b.gen_range(0..1000));
        }
    }

    #[test]
    fn different_agents_diverge() {
        let mut a = AgentRng::new(42, 0);
        let mut b = AgentRng::new(42, 1);
        let sa: Vec<u32> = (0..8).map(|_| a.gen_range(0..u32::MAX)).collect();
        let sb: Vec<u32> = (0..8).map(|_| b.gen_range(0..u32::MAX)).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn sample_is_bounded_and_distinct() {
        let mut rng = AgentRng::new(7, 0);
        let pool: Vec<u32> = (0..10).collect();
        let picked = rng.sample(&pool, 4);
        assert_eq!(picked.len(), 4);
        let mut sorted = picked.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
        assert_eq!(rng.sample(&pool, 20).len(), 10);
    }
}

// ── ConversationLog ───────────────────────────────────────────────────────────

#[cfg(test)]
mod conversation {
    use super::*;

    #[test]
    fn wire_shape_matches_contract() {
        let mut log = ConversationLog::new();
        log.record(
            "20240213-09:30",
            ConversationEntry {
                header: "甲 -> 乙 @ 小镇，公园".into(),
                lines: vec![("甲".into(), "你好".into()), ("乙".into(), "你好啊".into())],
            },
        );
        let json = serde_json::to_value(&log).unwrap();
        let lines = &json["20240213-09:30"][0]["甲 -> 乙 @ 小镇，公园"];
        assert_eq!(lines[0][0], "甲");
        assert_eq!(lines[1][1], "你好啊");

        let back: ConversationLog = serde_json::from_value(json).unwrap();
        assert_eq!(back.at("20240213-09:30").unwrap().len(), 1);
    }

    #[test]
    fn same_tick_preserves_insertion_order() {
        let mut log = ConversationLog::new();
        for header in ["甲 -> 乙 @ a", "丙 -> 丁 @ b"] {
            log.record(
                "20240213-10:00",
                ConversationEntry { header: header.into(), lines: vec![] },
            );
        }
        let entries = log.at("20240213-10:00").unwrap();
        assert_eq!(entries[0].header, "甲 -> 乙 @ a");
        assert_eq!(entries[1].header, "丙 -> 丁 @ b");
    }
}
