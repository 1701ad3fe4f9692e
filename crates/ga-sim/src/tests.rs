//! End-to-end tests for ga-sim: config loading, the tick loop, checkpoint
//! resume, and the downstream compression pass.  Everything runs offline on
//! the scripted provider and the hash embedder.

use std::fs;
use std::path::Path;

use ga_output::{ResultsRoot, compress_simulation, list_checkpoints, load_json, write_report};

use crate::config::WorldConfig;
use crate::server::{SimulationServer, SnapshotDoc};

// ── Fixture ───────────────────────────────────────────────────────────────────

fn write_static_root(dir: &Path) {
    // Maze: a park lawn with two benches and a bedroom with a bed.
    let mut tiles = vec![
        serde_json::json!({ "coord": [2, 2], "address": ["阿甲的家", "卧室", "床"] }),
        serde_json::json!({ "coord": [6, 2], "address": ["公园", "草坪", "长椅"] }),
        serde_json::json!({ "coord": [7, 2], "address": ["公园", "草坪", "长椅"] }),
    ];
    for x in 4..=10u32 {
        for y in 1..=4u32 {
            if [(6, 2), (7, 2)].contains(&(x, y)) {
                continue;
            }
            tiles.push(serde_json::json!({ "coord": [x, y], "address": ["公园", "草坪"] }));
        }
    }
    let maze = serde_json::json!({
        "world": "小镇",
        "tile_size": 32,
        "size": [8, 12],
        "tile_address_keys": ["world", "sector", "arena", "game_object"],
        "tiles": tiles,
    });
    fs::write(dir.join("maze.json"), serde_json::to_string_pretty(&maze).unwrap()).unwrap();

    let agent = serde_json::json!({
        "currently": "普通的一天",
        "scratch": {
            "age": 25,
            "innate": "好奇、友善",
            "learned": "画家",
            "lifestyle": "早睡早起",
            "daily_plan": "上午画画，下午散步",
        },
        "spatial": {
            "tree": {
                "小镇": {
                    "阿甲的家": { "卧室": ["床"] },
                    "公园": { "草坪": ["长椅"] },
                }
            },
            "address": { "living_area": ["小镇", "阿甲的家", "卧室"] },
        },
        "percept": { "mode": "box", "vision_r": 3, "att_bandwidth": 3 },
        "think": { "poignancy_max": 15, "interval": 1 },
    });
    fs::write(dir.join("agent.json"), serde_json::to_string_pretty(&agent).unwrap()).unwrap();

    let world = serde_json::json!({
        "stride": 10,
        "time": { "start": "20240213-09:30" },
        "maze": { "path": "maze.json" },
        "seed": 7,
        "agents": {
            "阿甲": { "config_path": "agent.json", "coord": [5, 2] },
            "阿乙": { "config_path": "agent.json", "coord": [8, 3] },
        },
        "api_keys": {},
    });
    fs::write(dir.join("world.json"), serde_json::to_string_pretty(&world).unwrap()).unwrap();
}

fn boot(static_dir: &Path, results: &ResultsRoot, resume: bool) -> SimulationServer {
    let config = WorldConfig::load(&static_dir.join("world.json")).unwrap();
    SimulationServer::new("测试镇", static_dir, results, config, resume).unwrap()
}

// ── Config ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use super::*;
    use crate::config::merge;

    #[test]
    fn deep_merge_overlays_objects_keywise() {
        let mut base = serde_json::json!({
            "scratch": { "age": 25, "innate": "友善" },
            "coord": [1, 1],
        });
        merge(
            &mut base,
            serde_json::json!({ "scratch": { "age": 30 }, "coord": [5, 2] }),
        );
        assert_eq!(base["scratch"]["age"], 30);
        assert_eq!(base["scratch"]["innate"], "友善");
        assert_eq!(base["coord"][0], 5);
    }

    #[test]
    fn missing_world_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WorldConfig::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn missing_agent_config_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_static_root(dir.path());
        // Point an agent at a config file that does not exist.
        let mut world: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("world.json")).unwrap())
                .unwrap();
        world["agents"]["阿丙"] = serde_json::json!({ "config_path": "nope.json" });
        fs::write(dir.path().join("world.json"), world.to_string()).unwrap();

        let results = ResultsRoot::at(dir.path().join("results"));
        let config = WorldConfig::load(&dir.path().join("world.json")).unwrap();
        assert!(SimulationServer::new("t", dir.path(), &results, config, false).is_err());
    }

    #[test]
    fn persona_selection_narrows_the_roster() {
        let dir = tempfile::tempdir().unwrap();
        write_static_root(dir.path());
        let results = ResultsRoot::at(dir.path().join("results"));
        fs::create_dir_all(results.path()).unwrap();
        fs::write(results.selected_personas(), "[\"阿甲\"]").unwrap();

        let server = boot(dir.path(), &results, false);
        assert_eq!(server.game().names(), vec!["阿甲".to_string()]);
    }
}

// ── Tick loop and checkpoints ─────────────────────────────────────────────────

#[cfg(test)]
mod ticking {
    use super::*;

    #[test]
    fn three_ticks_write_three_checkpoints_and_conversation() {
        let dir = tempfile::tempdir().unwrap();
        write_static_root(dir.path());
        let results = ResultsRoot::at(dir.path().join("results"));

        let mut server = boot(dir.path(), &results, false);
        server.simulate(3).unwrap();

        let files = list_checkpoints(server.checkpoints_folder()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(server.checkpoints_folder().join("conversation.json").is_file());
        // Clock advanced one stride per tick.
        assert_eq!(server.clock().stamp(), "20240213-10:00");

        // The first checkpoint satisfies the wake-up contract: a schedule
        // with at least one plan, created today.
        let doc: SnapshotDoc = load_json(&files[0]).unwrap();
        assert_eq!(doc.step, 1);
        assert_eq!(doc.time, "20240213-09:30");
        let schedule = &doc.agents["阿甲"]["schedule"]["daily_schedule"];
        assert!(schedule.as_array().unwrap().len() >= 1);
        assert!(
            doc.agents["阿甲"]["schedule"]["create"]
                .as_str()
                .unwrap()
                .starts_with("20240213")
        );
    }

    #[test]
    fn resume_continues_from_the_latest_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        write_static_root(dir.path());
        let results = ResultsRoot::at(dir.path().join("results"));

        {
            let mut server = boot(dir.path(), &results, false);
            server.simulate(2).unwrap();
        }

        let mut resumed = boot(dir.path(), &results, true);
        assert_eq!(resumed.step(), 2);
        // One stride past the persisted tick.
        assert_eq!(resumed.clock().stamp(), "20240213-09:50");
        resumed.simulate(1).unwrap();
        assert_eq!(
            list_checkpoints(resumed.checkpoints_folder()).unwrap().len(),
            3
        );
    }

    #[test]
    fn resume_restores_agent_state() {
        let dir = tempfile::tempdir().unwrap();
        write_static_root(dir.path());
        let results = ResultsRoot::at(dir.path().join("results"));

        let schedule_len = {
            let mut server = boot(dir.path(), &results, false);
            server.simulate(1).unwrap();
            server.game().agent("阿甲").unwrap().schedule.daily_schedule.len()
        };
        assert!(schedule_len > 0);

        let resumed = boot(dir.path(), &results, true);
        let agent = resumed.game().agent("阿甲").unwrap();
        assert_eq!(agent.schedule.daily_schedule.len(), schedule_len);
        assert!(agent.schedule.scheduled(resumed.clock().now().date()));
        // The associate store reopened from the same persisted index.
        assert!(agent.associate.nodes_num() > 0);
    }

    #[test]
    fn resume_without_checkpoints_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_static_root(dir.path());
        let results = ResultsRoot::at(dir.path().join("results"));
        let config = WorldConfig::load(&dir.path().join("world.json")).unwrap();
        assert!(SimulationServer::new("空", dir.path(), &results, config, true).is_err());
    }
}

// ── Downstream compression ────────────────────────────────────────────────────

#[cfg(test)]
mod compression {
    use super::*;
    use ga_maze::{Maze, MazeDoc};

    #[test]
    fn simulation_compresses_into_movement_and_report() {
        let dir = tempfile::tempdir().unwrap();
        write_static_root(dir.path());
        let results = ResultsRoot::at(dir.path().join("results"));

        let mut server = boot(dir.path(), &results, false);
        server.simulate(3).unwrap();

        let maze_doc: MazeDoc = load_json(&dir.path().join("maze.json")).unwrap();
        let maze = Maze::from_doc(maze_doc, false).unwrap();
        let compressed = results.compressed("测试镇");
        let doc =
            compress_simulation(server.checkpoints_folder(), &compressed, &maze).unwrap();
        write_report(server.checkpoints_folder(), &compressed).unwrap();

        assert_eq!(doc.all_movement.len(), 3 * 60 + 1);
        assert_eq!(doc.stride, 10);
        assert!(doc.persona_init_pos.contains_key("阿甲"));
        assert!(compressed.join("movement.json").is_file());
        assert!(compressed.join("simulation.md").is_file());
    }
}
