//! Unit tests for ga-output.

use ga_core::conversation::{ConversationEntry, ConversationLog};

use crate::checkpoint::{
    checkpoint_file_name, latest_checkpoint, list_checkpoints, load_conversation,
    save_conversation, write_json_atomic,
};
use crate::compress::{FRAMES_PER_STEP, compress_simulation};
use crate::paths::ResultsRoot;
use crate::records::{ActivityEntry, ActivityKind, RecordFile, RecordSink, ReflectionEntry};
use crate::report::write_report;

// ── Records ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod records {
    use super::*;

    #[test]
    fn append_dedups_and_persists_with_chinese_keys() {
        let dir = tempfile::tempdir().unwrap();
        let root = ResultsRoot::at(dir.path());
        let mut file = RecordFile::open(&root, ActivityKind::Painting, "测试");
        let entry = ActivityEntry {
            time: "2024-02-13 09:30:00".into(),
            agent: "阿甲".into(),
            content: "一幅星空".into(),
        };
        assert!(file.append(entry.clone()));
        assert!(!file.append(entry));
        file.save().unwrap();

        let text =
            std::fs::read_to_string(root.activity_records(ActivityKind::Painting, "测试")).unwrap();
        assert!(text.contains("时间"));
        assert!(text.contains("智能体"));
        assert!(text.contains("绘画内容"));

        // Reload sees the same single entry.
        let reopened = RecordFile::open(&root, ActivityKind::Painting, "测试");
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn corrupt_file_is_recreated_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = ResultsRoot::at(dir.path());
        let path = root.activity_records(ActivityKind::Music, "测试");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"\xff\xfe not json").unwrap();

        let mut file = RecordFile::open(&root, ActivityKind::Music, "测试");
        assert!(file.is_empty());
        assert!(file.append(ActivityEntry {
            time: "t".into(),
            agent: "阿甲".into(),
            content: "一段旋律".into(),
        }));
        file.save().unwrap();
        assert_eq!(RecordFile::open(&root, ActivityKind::Music, "测试").len(), 1);
    }

    #[test]
    fn reflection_dedup_ignores_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let root = ResultsRoot::at(dir.path());
        let mut sink = RecordSink::open(&root, "测试");
        let entry = ReflectionEntry {
            time: "t".into(),
            agent: "阿甲".into(),
            content: "阿甲喜欢安静".into(),
            evidence: vec!["node_1".into()],
        };
        assert!(sink.reflection.append(entry.clone()));
        let mut again = entry;
        again.evidence = vec!["node_2".into()];
        assert!(!sink.reflection.append(again));
        sink.save_all().unwrap();
        assert!(root.reflection_records("测试").is_file());
    }

    #[test]
    fn empty_files_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let root = ResultsRoot::at(dir.path());
        let mut sink = RecordSink::open(&root, "测试");
        sink.save_all().unwrap();
        assert!(!root.activity_records(ActivityKind::Quantum, "测试").exists());
    }
}

// ── Checkpoints ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod checkpoints {
    use super::*;

    #[test]
    fn file_name_drops_the_colon() {
        assert_eq!(checkpoint_file_name("20240213-09:30"), "simulate-20240213-0930.json");
    }

    #[test]
    fn listing_sorts_and_skips_conversation() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in ["20240213-09:40", "20240213-09:30"] {
            write_json_atomic(
                &dir.path().join(checkpoint_file_name(stamp)),
                &serde_json::json!({ "time": stamp }),
            )
            .unwrap();
        }
        save_conversation(dir.path(), &ConversationLog::new()).unwrap();

        let files = list_checkpoints(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].to_string_lossy().contains("0930"));
        let latest = latest_checkpoint(dir.path()).unwrap();
        assert!(latest.to_string_lossy().contains("0940"));
    }

    #[test]
    fn missing_checkpoints_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_checkpoint(dir.path()).is_err());
    }

    #[test]
    fn conversation_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ConversationLog::new();
        log.record(
            "20240213-09:30",
            ConversationEntry {
                header: "阿甲 -> 阿乙 @ 小镇，公园".into(),
                lines: vec![("阿甲".into(), "你好".into())],
            },
        );
        save_conversation(dir.path(), &log).unwrap();
        let back = load_conversation(dir.path()).unwrap();
        assert_eq!(back.len(), 1);
        assert!(load_conversation(tempfile::tempdir().unwrap().path()).unwrap().is_empty());
    }
}

// ── Compression ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod compression {
    use super::*;
    use ga_maze::{Coord, Maze, MazeDoc};

    fn maze() -> Maze {
        let doc: MazeDoc = serde_json::from_value(serde_json::json!({
            "world": "小镇",
            "tile_size": 32,
            "size": [8, 12],
            "tiles": [],
        }))
        .unwrap();
        Maze::from_doc(doc, false).unwrap()
    }

    fn agent_json(coord: (u32, u32), describe: &str) -> serde_json::Value {
        serde_json::json!({
            "coord": coord,
            "currently": "普通的一天",
            "scratch": { "age": 25 },
            "action": {
                "event": {
                    "subject": "x", "predicate": "正在", "object": "活动",
                    "describe": describe,
                    "address": ["小镇", "公园", "草坪", "长椅"],
                },
                "start": "20240213-09:00:00",
                "duration": 60,
            },
        })
    }

    fn write_snapshots(dir: &std::path::Path) {
        let stamps = ["20240213-09:30", "20240213-09:40", "20240213-09:50"];
        let a_coords = [(2, 2), (5, 2), (5, 5)];
        let b_coords = [(3, 3), (3, 3), (3, 4)];
        for (step, stamp) in stamps.iter().enumerate() {
            let doc = serde_json::json!({
                "stride": 10,
                "time": stamp,
                "step": step + 1,
                "agents": {
                    "阿甲": agent_json(a_coords[step], "在长椅上看书"),
                    "阿乙": agent_json(b_coords[step], "正在睡觉"),
                },
            });
            write_json_atomic(&dir.join(checkpoint_file_name(stamp)), &doc).unwrap();
        }
    }

    #[test]
    fn three_ticks_inflate_to_181_frames() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_snapshots(dir.path());
        save_conversation(dir.path(), &ConversationLog::new()).unwrap();

        let doc = compress_simulation(dir.path(), out.path(), &maze()).unwrap();
        assert_eq!(doc.all_movement.len(), 3 * FRAMES_PER_STEP as usize + 1);
        assert_eq!(doc.stride, 10);
        assert_eq!(doc.sec_per_step, 10);
        assert_eq!(doc.start_datetime, "2024-02-13T09:30:00");
        assert_eq!(doc.persona_init_pos["阿甲"], Coord::new(2, 2));
        assert!(out.path().join("movement.json").is_file());
    }

    #[test]
    fn frames_walk_a_connected_path() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_snapshots(dir.path());

        let doc = compress_simulation(dir.path(), out.path(), &maze()).unwrap();
        for agent in ["阿甲", "阿乙"] {
            let mut previous: Option<Coord> = None;
            for frame in 1..=(3 * FRAMES_PER_STEP) {
                let entry = &doc.all_movement[&frame.to_string()][agent];
                if let Some(prev) = previous {
                    let d = prev.x.abs_diff(entry.movement.x) + prev.y.abs_diff(entry.movement.y);
                    assert!(d <= 1, "{agent} jumped {prev} -> {}", entry.movement);
                }
                previous = Some(entry.movement);
            }
        }
    }

    #[test]
    fn sleeping_and_travel_actions_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_snapshots(dir.path());

        let doc = compress_simulation(dir.path(), out.path(), &maze()).unwrap();
        // 阿乙 sits still in tick 2, so its frames carry the sleep marker.
        let entry = &doc.all_movement[&(FRAMES_PER_STEP + 1).to_string()]["阿乙"];
        assert!(entry.action.as_deref().unwrap().starts_with("😴"));
        // 阿甲 moves at the start of tick 2.
        let entry = &doc.all_movement[&(FRAMES_PER_STEP + 1).to_string()]["阿甲"];
        assert!(entry.action.as_deref().unwrap().starts_with("前往"));
    }

    #[test]
    fn report_renders_personas_and_dialogue() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_snapshots(dir.path());
        let mut log = ConversationLog::new();
        log.record(
            "20240213-09:40",
            ConversationEntry {
                header: "阿甲 -> 阿乙 @ 小镇，公园".into(),
                lines: vec![("阿甲".into(), "你好".into())],
            },
        );
        save_conversation(dir.path(), &log).unwrap();

        write_report(dir.path(), out.path()).unwrap();
        let md = std::fs::read_to_string(out.path().join("simulation.md")).unwrap();
        assert!(md.contains("# 基础人设"));
        assert!(md.contains("## 阿甲"));
        assert!(md.contains("# 模拟过程"));
        assert!(md.contains("> 阿甲：你好"));
    }
}
