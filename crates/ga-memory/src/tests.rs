//! Unit tests for ga-memory.

use chrono::NaiveDateTime;

use ga_core::{AgentRng, Event, parse_datetime};

use crate::action::Action;
use crate::associate::{Associate, AssociateParams, ConceptKind, MemoryLists};
use crate::embed::{FailingEmbedder, HashEmbedder};
use crate::schedule::{Plan, Schedule};
use crate::spatial::{SpatialSeed, SpatialTree};

fn t(stamp: &str) -> NaiveDateTime {
    parse_datetime(stamp).unwrap()
}

fn addr() -> Vec<String> {
    ["小镇", "公园", "草坪", "长椅"].map(str::to_string).to_vec()
}

// ── SpatialTree ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod spatial {
    use super::*;

    fn seed() -> SpatialSeed {
        serde_json::from_value(serde_json::json!({
            "tree": {
                "小镇": {
                    "阿甲的家": { "卧室": ["床", "书桌"], "厨房": ["炉灶"] },
                    "公园": { "草坪": ["长椅"] },
                }
            },
            "address": {
                "living_area": ["小镇", "阿甲的家", "卧室"],
            }
        }))
        .unwrap()
    }

    #[test]
    fn sleep_shortcut_derived_from_living_area() {
        let tree = SpatialTree::new(seed());
        assert_eq!(
            tree.shortcut("睡觉").unwrap(),
            ["小镇", "阿甲的家", "卧室", "床"].map(str::to_string)
        );
    }

    #[test]
    fn find_address_matches_substring_of_hint() {
        let tree = SpatialTree::new(seed());
        assert!(tree.find_address("准备睡觉了").is_some());
        assert!(tree.find_address("去跑步").is_none());
    }

    #[test]
    fn get_leaves_walks_branches_and_arenas() {
        let tree = SpatialTree::new(seed());
        let sectors = tree.get_leaves(&["小镇".to_string()]);
        assert_eq!(sectors, vec!["阿甲的家".to_string(), "公园".to_string()]);
        let objects = tree.get_leaves(
            &["小镇", "阿甲的家", "卧室"].map(str::to_string),
        );
        assert_eq!(objects, vec!["床".to_string(), "书桌".to_string()]);
        assert!(tree.get_leaves(&["别处".to_string()]).is_empty());
    }

    #[test]
    fn add_leaf_grows_lazily_and_dedups() {
        let mut tree = SpatialTree::new(seed());
        let new_addr: Vec<String> = ["小镇", "公园", "喷泉", "雕像"].map(str::to_string).to_vec();
        tree.add_leaf(&new_addr);
        tree.add_leaf(&new_addr);
        let objects = tree.get_leaves(&["小镇", "公园", "喷泉"].map(str::to_string));
        assert_eq!(objects, vec!["雕像".to_string()]);
    }

    #[test]
    fn random_address_is_always_valid() {
        let tree = SpatialTree::new(seed());
        let mut rng = AgentRng::new(1, 0);
        for _ in 0..16 {
            let address = tree.random_address(&mut rng);
            assert_eq!(address.len(), 4, "got {address:?}");
            let leaves = tree.get_leaves(&address[..3]);
            assert!(leaves.contains(&address[3]));
        }
    }
}

// ── Schedule ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod schedule {
    use super::*;

    fn daily() -> Schedule {
        let mut s = Schedule {
            create: Some(t("20240213-06:00:00")),
            ..Schedule::default()
        };
        s.add_plan("睡觉", 6 * 60);
        s.add_plan("吃早餐", 60);
        s.add_plan("在公园看书", 17 * 60);
        s
    }

    #[test]
    fn plans_tile_the_day_contiguously() {
        let s = daily();
        let mut cursor = 0;
        for plan in &s.daily_schedule {
            assert_eq!(plan.start, cursor);
            cursor = plan.end();
        }
        assert_eq!(cursor, 24 * 60);
    }

    #[test]
    fn current_plan_walks_to_the_active_slot() {
        let s = daily();
        let (plan, sub) = s.current_plan(6 * 60 + 30).unwrap();
        assert_eq!(plan.describe, "吃早餐");
        assert_eq!(sub.describe, "吃早餐");
    }

    #[test]
    fn decomposed_plan_returns_sub_plan() {
        let mut s = daily();
        s.plan_mut(1).decompose = vec![
            Plan { idx: 0, describe: "做饭".into(), start: 360, duration: 30, decompose: vec![] },
            Plan { idx: 1, describe: "吃饭".into(), start: 390, duration: 30, decompose: vec![] },
        ];
        let (plan, sub) = s.current_plan(395).unwrap();
        assert_eq!(plan.describe, "吃早餐");
        assert_eq!(sub.describe, "吃饭");
    }

    #[test]
    fn past_the_last_plan_sticks_to_it() {
        let mut s = Schedule::default();
        s.add_plan("看书", 60);
        let (plan, _) = s.current_plan(23 * 60).unwrap();
        assert_eq!(plan.describe, "看书");
        assert!(Schedule::default().current_plan(0).is_none());
    }

    #[test]
    fn scheduled_only_for_the_creation_day() {
        let s = daily();
        assert!(s.scheduled(t("20240213-09:00:00").date()));
        assert!(!s.scheduled(t("20240214-09:00:00").date()));
        assert!(!Schedule::default().scheduled(t("20240213-09:00:00").date()));
    }

    #[test]
    fn sleep_heuristic_blocks_long_sleep_only() {
        let plan = |describe: &str, duration| Plan {
            idx: 0,
            describe: describe.into(),
            start: 0,
            duration,
            decompose: vec![],
        };
        assert!(Schedule::decomposable(&plan("在公园看书", 120)));
        assert!(!Schedule::decomposable(&plan("睡觉", 8 * 60)));
        assert!(Schedule::decomposable(&plan("午睡一会儿，上床休息", 30)));
        assert!(!Schedule::decomposable(&plan("sleeping", 30)));
        let mut decomposed = plan("在公园看书", 120);
        decomposed.decompose = vec![plan("看书", 120)];
        assert!(!Schedule::decomposable(&decomposed));
    }
}

// ── Action ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod action {
    use super::*;

    #[test]
    fn finished_by_clock_duration_or_address() {
        let act = Action::new(
            Event::new("甲", "正在", "看书", addr()),
            None,
            t("20240213-09:00:00"),
            30,
        );
        assert_eq!(act.end(), t("20240213-09:30:00"));
        assert!(!act.finished(t("20240213-09:30:00")));
        assert!(act.finished(t("20240213-09:31:00")));

        let zero = Action::new(Event::new("甲", "正在", "看书", addr()), None, act.start, 0);
        assert!(zero.finished(act.start));

        let nowhere = Action::new(Event::new("甲", "正在", "看书", vec![]), None, act.start, 30);
        assert!(nowhere.finished(act.start));
    }

    #[test]
    fn duration_invariant_and_serde_roundtrip() {
        let act = Action::new(
            Event::new("甲", "正在", "看书", addr()).with_describe("甲 在长椅上看书"),
            Some(Event::new("长椅", "被占用", "甲", addr())),
            t("20240213-09:00:00"),
            45,
        );
        assert_eq!((act.end() - act.start).num_minutes(), 45);
        let json = serde_json::to_string(&act).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(act, back);
    }
}

// ── Associate ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod associate {
    use super::*;

    fn store(max_memory: i64) -> (tempfile::TempDir, Associate) {
        let dir = tempfile::tempdir().unwrap();
        let params = AssociateParams { max_memory, ..AssociateParams::default() };
        let assoc = Associate::open(
            dir.path(),
            Box::new(HashEmbedder::default()),
            params,
            None,
        )
        .unwrap();
        (dir, assoc)
    }

    fn seen(what: &str) -> Event {
        Event::new("甲", "正在", what, addr())
    }

    #[test]
    fn empty_store_retrieves_nothing() {
        let (_dir, assoc) = store(-1);
        assert!(assoc.retrieve_events(None).is_empty());
        assert!(assoc.retrieve_thoughts(Some("任何")).is_empty());
        assert!(assoc.retrieve_chats(Some("乙")).is_empty());
    }

    #[test]
    fn type_lists_are_newest_first() {
        let (_dir, mut assoc) = store(-1);
        let now = t("20240213-09:00:00");
        for (i, what) in ["看书", "散步", "浇花"].iter().enumerate() {
            assoc.add_node(
                ConceptKind::Event,
                &seen(what),
                5,
                Some(now + chrono::Duration::minutes(i as i64)),
                None,
                now,
            );
        }
        let events = assoc.retrieve_events(None);
        assert_eq!(events.len(), 3);
        assert!(events[0].describe().contains("浇花"));
        assert!(events[2].describe().contains("看书"));
        for pair in events.windows(2) {
            assert!(pair[0].create >= pair[1].create);
        }
    }

    #[test]
    fn retention_caps_type_retrieval() {
        let dir = tempfile::tempdir().unwrap();
        let params = AssociateParams { retention: 2, ..AssociateParams::default() };
        let mut assoc =
            Associate::open(dir.path(), Box::new(HashEmbedder::default()), params, None).unwrap();
        let now = t("20240213-09:00:00");
        for what in ["看书", "散步", "浇花", "做饭"] {
            assoc.add_node(ConceptKind::Event, &seen(what), 5, None, None, now);
        }
        assert_eq!(assoc.retrieve_events(None).len(), 2);
    }

    #[test]
    fn max_memory_evicts_oldest() {
        let (_dir, mut assoc) = store(2);
        let now = t("20240213-09:00:00");
        for what in ["看书", "散步", "浇花"] {
            assoc.add_node(ConceptKind::Event, &seen(what), 5, None, None, now);
        }
        assert_eq!(assoc.memory().event.len(), 2);
        let kept = assoc.retrieve_events(None);
        assert!(kept.iter().any(|c| c.describe().contains("浇花")));
        assert!(kept.iter().all(|c| !c.describe().contains("看书")));
    }

    #[test]
    fn chat_lookup_by_partner_name() {
        let (_dir, mut assoc) = store(-1);
        let now = t("20240213-09:00:00");
        let chat = Event::new("甲", "对话", "乙", addr()).with_describe("甲 对话 乙：聊了早餐");
        assoc.add_node(ConceptKind::Chat, &chat, 6, None, None, now);
        let hits = assoc.retrieve_chats(Some("乙"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, ConceptKind::Chat);
    }

    #[test]
    fn focus_retrieval_updates_access_in_the_index() {
        let (_dir, mut assoc) = store(-1);
        let now = t("20240213-09:00:00");
        assoc.add_node(ConceptKind::Event, &seen("在长椅上看书"), 5, None, None, now);
        assoc.add_node(ConceptKind::Thought, &seen("考虑去散步"), 7, None, None, now);

        let later = t("20240213-10:00:00");
        let hits = assoc.retrieve_focus(&["看书".to_string()], 30, later);
        assert!(!hits.is_empty());
        for hit in &hits {
            assert_eq!(hit.access, later);
            let persisted = assoc.find_concept(&hit.node_id).unwrap();
            assert_eq!(persisted.access, later);
        }
    }

    #[test]
    fn focus_grouped_keeps_queries_separate() {
        let (_dir, mut assoc) = store(-1);
        let now = t("20240213-09:00:00");
        assoc.add_node(ConceptKind::Event, &seen("看书"), 5, None, None, now);
        let grouped = assoc.retrieve_focus_grouped(
            &["看书".to_string(), "跳舞".to_string()],
            30,
            now,
        );
        assert_eq!(grouped.len(), 2);
        assert!(grouped.values().all(|v| !v.is_empty()));
    }

    #[test]
    fn cleanup_drops_expired_and_future_nodes() {
        let (_dir, mut assoc) = store(-1);
        let now = t("20240213-09:00:00");
        assoc.add_node(
            ConceptKind::Event,
            &seen("老早的事"),
            5,
            Some(t("20240101-09:00:00")),
            Some(t("20240201-09:00:00")), // already expired
            now,
        );
        assoc.add_node(
            ConceptKind::Event,
            &seen("未来的事"),
            5,
            Some(t("20250101-09:00:00")), // created in the future
            None,
            now,
        );
        assoc.add_node(ConceptKind::Event, &seen("今天的事"), 5, Some(now), None, now);

        assoc.cleanup_index(now);
        let survivors = assoc.retrieve_events(None);
        assert_eq!(survivors.len(), 1);
        assert!(survivors[0].describe().contains("今天"));
        for c in &survivors {
            assert!(c.create <= now && now <= c.expire);
        }
    }

    #[test]
    fn embedder_failure_yields_transient_concept() {
        let dir = tempfile::tempdir().unwrap();
        let mut assoc = Associate::open(
            dir.path(),
            Box::new(FailingEmbedder),
            AssociateParams::default(),
            None,
        )
        .unwrap();
        let now = t("20240213-09:00:00");
        let concept = assoc.add_node(ConceptKind::Event, &seen("看书"), 5, None, None, now);
        assert!(concept.transient);
        assert_eq!(assoc.nodes_num(), 0);
        assert!(assoc.memory().event.is_empty());
    }

    #[test]
    fn persistence_roundtrip_restores_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let now = t("20240213-09:00:00");
        let id;
        {
            let mut assoc = Associate::open(
                dir.path(),
                Box::new(HashEmbedder::default()),
                AssociateParams::default(),
                None,
            )
            .unwrap();
            id = assoc
                .add_node(ConceptKind::Event, &seen("看书"), 5, None, None, now)
                .node_id;
            assoc.save().unwrap();
        }
        let memory = MemoryLists { event: vec![id.clone()], ..MemoryLists::default() };
        let assoc = Associate::open(
            dir.path(),
            Box::new(HashEmbedder::default()),
            AssociateParams::default(),
            Some(memory),
        )
        .unwrap();
        let concept = assoc.find_concept(&id).unwrap();
        assert!(concept.describe().contains("看书"));
        assert_eq!(concept.poignancy, 5);
    }
}
