//! Unit and scenario tests for ga-agent.
//!
//! Everything runs on the scripted provider and the hash embedder: no
//! network, fixed seeds, deterministic outcomes.

use std::time::Duration;

use ga_core::{AgentRng, Clock, Event, parse_datetime};
use ga_llm::{LlmClient, Provider, ScriptedProvider};
use ga_maze::{Coord, Maze, MazeDoc};
use ga_memory::{Associate, AssociateParams, ConceptKind, HashEmbedder};
use ga_output::{ActivityKind, RecordSink, ResultsRoot};
use ga_prompt::{Scratch, TemplateLibrary};

use crate::agent::{Agent, AgentSeed};
use crate::game::{AgentSpawn, Game};

// ── World scaffolding ─────────────────────────────────────────────────────────

/// 12x8 town: a bedroom with a bed, a park lawn with two benches and the
/// art terminal.  The lawn rectangle is fully addressed so its occupants
/// share an arena.
fn town_maze() -> Maze {
    let mut tiles = vec![
        serde_json::json!({ "coord": [2, 2], "address": ["阿甲的家", "卧室", "床"] }),
        serde_json::json!({ "coord": [6, 2], "address": ["公园", "草坪", "长椅"] }),
        serde_json::json!({ "coord": [7, 2], "address": ["公园", "草坪", "长椅"] }),
        serde_json::json!({ "coord": [9, 2], "address": ["公园", "草坪", "全能艺术终端"] }),
    ];
    for x in 4..=10u32 {
        for y in 1..=4u32 {
            if [(6, 2), (7, 2), (9, 2)].contains(&(x, y)) {
                continue;
            }
            tiles.push(serde_json::json!({ "coord": [x, y], "address": ["公园", "草坪"] }));
        }
    }
    let doc: MazeDoc = serde_json::from_value(serde_json::json!({
        "world": "小镇",
        "tile_size": 32,
        "size": [8, 12],
        "tiles": tiles,
    }))
    .unwrap();
    Maze::from_doc(doc, false).unwrap()
}

fn clock() -> Clock {
    Clock::new(parse_datetime("20240213-09:30").unwrap(), 10)
}

fn seed(coord: (u32, u32)) -> AgentSeed {
    serde_json::from_value(serde_json::json!({
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
                    "公园": { "草坪": ["长椅", "全能艺术终端"] },
                }
            },
            "address": { "living_area": ["小镇", "阿甲的家", "卧室"] },
        },
        "coord": coord,
        "percept": { "mode": "box", "vision_r": 3, "att_bandwidth": 3 },
        "think": { "poignancy_max": 15, "interval": 1 },
    }))
    .unwrap()
}

/// One agent wired to its own scripted provider and an isolated store.
fn build_agent(
    name: &str,
    coord: (u32, u32),
    index: u32,
    provider: ScriptedProvider,
    storage: &std::path::Path,
    maze: &mut Maze,
    clock: &Clock,
) -> Agent {
    let seed = seed(coord);
    let associate = Associate::open(
        storage.join(name),
        Box::new(HashEmbedder::default()),
        AssociateParams::default(),
        None,
    )
    .unwrap();
    let llm = LlmClient::new(Provider::Scripted(provider)).with_retry(1, Duration::ZERO);
    let scratch = Scratch::new(
        name,
        seed.currently.clone(),
        seed.scratch.clone(),
        TemplateLibrary::bundled(),
        AgentRng::new(42, index * 2 + 1),
    );
    Agent::new(
        name,
        seed,
        associate,
        llm,
        scratch,
        AgentRng::new(42, index * 2),
        maze,
        clock,
    )
    .unwrap()
}

struct TestTown {
    game: Game,
    clock: Clock,
    records: RecordSink,
    _dir: tempfile::TempDir,
}

fn town(agents: Vec<(&str, (u32, u32), ScriptedProvider)>) -> TestTown {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let mut maze = town_maze();
    let mut built = Vec::new();
    for (index, (name, coord, provider)) in agents.into_iter().enumerate() {
        built.push(build_agent(
            name,
            coord,
            index as u32,
            provider,
            dir.path(),
            &mut maze,
            &clock,
        ));
    }
    let mut game = Game::new(maze, ga_core::ConversationLog::new());
    for agent in built {
        game.add_agent(agent);
    }
    let records = RecordSink::open(&ResultsRoot::at(dir.path().join("results")), "测试");
    TestTown { game, clock, records, _dir: dir }
}

fn think(t: &mut TestTown, name: &str) -> crate::game::ThinkResult {
    let coord = t.game.agent(name).unwrap().coord;
    t.game
        .agent_think(name, AgentSpawn { coord, path: vec![] }, &t.clock, &mut t.records)
        .unwrap()
}

// ── Scenario: waking up and scheduling ────────────────────────────────────────

#[cfg(test)]
mod scheduling {
    use super::*;

    #[test]
    fn first_tick_produces_a_full_day_schedule() {
        let mut t = town(vec![("阿甲", (5, 2), ScriptedProvider::default())]);
        think(&mut t, "阿甲");

        let agent = t.game.agent("阿甲").unwrap();
        assert!(agent.schedule.scheduled(t.clock.now().date()));
        let (plan, sub) = agent.schedule.current_plan(t.clock.daily_duration()).unwrap();
        assert!(!plan.describe.is_empty());
        assert!(!plan.describe.contains("睡"));
        assert!(!sub.describe.is_empty());

        // Strictly increasing starts, contiguous coverage of [0, 1440).
        let mut cursor = 0;
        for plan in &agent.schedule.daily_schedule {
            assert_eq!(plan.start, cursor);
            assert!(plan.duration > 0);
            cursor = plan.end();
        }
        assert_eq!(cursor, 24 * 60);
    }

    #[test]
    fn scripted_wake_up_and_daily_table_shape_the_day() {
        let provider = ScriptedProvider::default()
            .rule("几点起床", "我 7:00 起床")
            .rule(
                "每小时时间表",
                "[7:00] 起床洗漱\n[8:00] 吃早餐\n[9:00] 画画\n[12:00] 吃午饭\n[14:00] 散步\n[22:00] 睡觉",
            );
        let mut t = town(vec![("阿甲", (5, 2), provider)]);
        think(&mut t, "阿甲");
        let agent = t.game.agent("阿甲").unwrap();
        assert_eq!(agent.llm.stats("wake_up").successes, 1);

        // Hours 0..7 are seeded asleep, then the scripted table takes over.
        let sleep_minutes: u32 = agent
            .schedule
            .daily_schedule
            .iter()
            .take_while(|p| p.describe == "睡觉")
            .map(|p| p.duration)
            .sum();
        assert_eq!(sleep_minutes, 7 * 60);
        let (plan, _) = agent.schedule.current_plan(9 * 60 + 30).unwrap();
        assert_eq!(plan.describe, "画画");
    }

    #[test]
    fn schedule_survives_a_second_tick_unchanged() {
        let mut t = town(vec![("阿甲", (5, 2), ScriptedProvider::default())]);
        think(&mut t, "阿甲");
        let created = t.game.agent("阿甲").unwrap().schedule.create;
        t.clock.advance();
        think(&mut t, "阿甲");
        assert_eq!(t.game.agent("阿甲").unwrap().schedule.create, created);
    }
}

// ── Tile events through movement ──────────────────────────────────────────────

#[cfg(test)]
mod movement {
    use super::*;

    #[test]
    fn one_subject_event_per_tile_and_restore_on_leave() {
        let mut t = town(vec![("阿甲", (5, 2), ScriptedProvider::default())]);
        let bench = Coord::new(6, 2);
        let start = t.game.agents[0].coord;
        assert_eq!(
            t.game
                .maze
                .tile_at(start)
                .events()
                .filter(|e| e.subject == "阿甲")
                .count(),
            1
        );
        // Hop onto the bench and back; the bench's identity event returns.
        think(&mut t, "阿甲");
        let spawn = AgentSpawn { coord: bench, path: vec![] };
        t.game.agent_think("阿甲", spawn, &t.clock, &mut t.records).unwrap();
        assert_eq!(
            t.game
                .maze
                .tile_at(bench)
                .events()
                .filter(|e| e.subject == "阿甲")
                .count(),
            1
        );

        let spawn = AgentSpawn { coord: Coord::new(5, 2), path: vec![] };
        t.game.agent_think("阿甲", spawn, &t.clock, &mut t.records).unwrap();
        let bench_events: Vec<_> = t.game.maze.tile_at(bench).events().cloned().collect();
        assert!(bench_events.iter().all(|e| e.subject != "阿甲"));
        assert!(
            bench_events
                .iter()
                .any(|e| e.fit(Some("长椅"), Some("此时"), Some("空闲")))
        );
    }
}

// ── Percept ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod percept {
    use super::*;

    #[test]
    fn nearby_events_become_concepts_and_poignancy_accumulates() {
        let mut t = town(vec![
            ("阿甲", (5, 2), ScriptedProvider::default()),
            ("阿乙", (6, 3), ScriptedProvider::default()),
        ]);
        // Give 阿乙 a non-idle presence on its tile.
        {
            let clock = t.clock;
            let maze = &mut t.game.maze;
            let b = t.game.agents.iter_mut().find(|a| a.name == "阿乙").unwrap();
            let address = b.tile_address(maze);
            b.action = ga_memory::Action::new(
                Event::new("阿乙", "正在", "散步", address.clone())
                    .with_describe("阿乙 在草坪上散步"),
                None,
                clock.now(),
                60,
            );
            let coord = b.coord;
            b.move_to(maze, coord, vec![]);
        }

        let clock = t.clock;
        let TestTown { game, .. } = &mut t;
        let maze = &game.maze;
        let a = &mut game.agents[0];
        a.percept(maze, &clock);

        assert!(a.concepts.iter().any(|c| c.event.subject == "阿乙"));
        assert!(a.status.poignancy > 0);
        assert!(!a.associate.memory().event.is_empty());
    }

    #[test]
    fn idle_events_stay_frame_local() {
        let mut t = town(vec![
            ("阿甲", (5, 2), ScriptedProvider::default()),
            ("阿乙", (6, 3), ScriptedProvider::default()),
        ]);
        let clock = t.clock;
        let TestTown { game, .. } = &mut t;
        let maze = &game.maze;
        let a = &mut game.agents[0];
        a.percept(maze, &clock);

        // 阿乙's idle event is visible in the frame but not remembered.
        let idle: Vec<_> = a
            .concepts
            .iter()
            .filter(|c| c.event.subject == "阿乙")
            .collect();
        assert!(!idle.is_empty());
        assert!(idle.iter().all(|c| c.transient && c.poignancy == 1));
        assert!(a.associate.memory().event.is_empty());
    }
}

// ── Scenario: chat trigger and schedule splice ────────────────────────────────

#[cfg(test)]
mod chat {
    use super::*;

    fn a_provider() -> ScriptedProvider {
        ScriptedProvider::default()
            .rule("开始交谈", "是")
            .rule("接下来对", "{\"阿甲\": \"你好呀\"}")
            .rule("重复", "否")
            .rule("结束与", "否")
            .rule("总结下面这段对话", "互相问候")
            .rule(
                "修改后的安排",
                "[9:00 至 9:30] 看书\n[9:30 至 9:30] 互相问候\n[9:30 至 10:00] 看书",
            )
    }

    fn b_provider() -> ScriptedProvider {
        ScriptedProvider::default()
            .rule("开始交谈", "否")
            .rule("接下来对", "{\"阿乙\": \"你好\"}")
            .rule("重复", "否")
            .rule_n("结束与", "否", 1)
            .rule("结束与", "是")
            .rule(
                "修改后的安排",
                "[9:00 至 9:30] 看书\n[9:30 至 9:30] 互相问候\n[9:30 至 10:00] 看书",
            )
    }

    #[test]
    fn two_round_chat_lands_in_log_and_both_schedules() {
        let mut t = town(vec![
            ("阿甲", (5, 2), a_provider()),
            ("阿乙", (6, 3), b_provider()),
        ]);
        // 阿乙 thinks first so it has a schedule when 阿甲 reacts.
        think(&mut t, "阿乙");
        think(&mut t, "阿甲");

        let stamp = t.clock.stamp();
        let entries = t.game.conversation.at(&stamp).expect("conversation recorded");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].header.starts_with("阿甲 -> 阿乙 @ "));
        assert_eq!(entries[0].lines.len(), 4);
        assert_eq!(entries[0].lines[0].0, "阿甲");
        assert_eq!(entries[0].lines[1].0, "阿乙");

        for name in ["阿甲", "阿乙"] {
            let agent = t.game.agent(name).unwrap();
            // The chat became the running action...
            assert!(agent.event().fit(None, Some("对话"), None));
            // ...was remembered as a chat concept...
            assert!(!agent.associate.memory().chat.is_empty());
            // ...and spliced into the decomposed plan.
            let spliced = agent
                .schedule
                .daily_schedule
                .iter()
                .flat_map(|p| &p.decompose)
                .any(|sub| sub.describe == "互相问候");
            assert!(spliced, "{name} schedule missing the chat splice");
        }
    }

    #[test]
    fn recent_chat_suppresses_another_round() {
        let mut t = town(vec![
            ("阿甲", (5, 2), a_provider()),
            ("阿乙", (6, 3), b_provider()),
        ]);
        think(&mut t, "阿乙");
        think(&mut t, "阿甲");
        assert_eq!(t.game.conversation.len(), 1);

        // Ten minutes later the pair is still within the 60-minute window.
        t.clock.advance();
        think(&mut t, "阿甲");
        assert_eq!(t.game.conversation.len(), 1);
    }

    #[test]
    fn no_chat_when_the_model_declines() {
        let mut t = town(vec![
            ("阿甲", (5, 2), ScriptedProvider::default().rule("开始交谈", "否")),
            ("阿乙", (6, 3), ScriptedProvider::default().rule("开始交谈", "否")),
        ]);
        think(&mut t, "阿乙");
        think(&mut t, "阿甲");
        assert!(t.game.conversation.is_empty());
    }
}

// ── Scenario: reflection fires ────────────────────────────────────────────────

#[cfg(test)]
mod reflection {
    use super::*;

    #[test]
    fn poignancy_threshold_triggers_thoughts_and_records() {
        let mut t = town(vec![("阿甲", (5, 2), ScriptedProvider::default())]);
        let clock = t.clock;
        {
            let a = t.game.agent_mut("阿甲").unwrap();
            for i in 0..5 {
                let event = Event::new(
                    "阿乙",
                    "正在",
                    format!("活动{i}"),
                    ["小镇", "公园", "草坪"].map(str::to_string).to_vec(),
                );
                a.associate
                    .add_node(ConceptKind::Event, &event, 4, None, None, clock.now());
            }
            a.status.poignancy = 20;
        }

        let before = t.records.reflection.len();
        {
            let TestTown { game, records, .. } = &mut t;
            let maze = &game.maze;
            let a = &mut game.agents[0];
            a.reflect(&clock, maze, records);
        }

        let a = t.game.agent("阿甲").unwrap();
        assert!(a.associate.memory().thought.len() >= 3);
        assert_eq!(a.status.poignancy, 0);
        assert!(t.records.reflection.len() > before);
    }

    #[test]
    fn below_threshold_nothing_happens() {
        let mut t = town(vec![("阿甲", (5, 2), ScriptedProvider::default())]);
        let clock = t.clock;
        {
            let TestTown { game, records, .. } = &mut t;
            let maze = &game.maze;
            let a = &mut game.agents[0];
            a.status.poignancy = 3;
            a.reflect(&clock, maze, records);
        }
        assert!(t.game.agent("阿甲").unwrap().associate.memory().thought.is_empty());
    }
}

// ── Scenario: painting activity throttle ──────────────────────────────────────

#[cfg(test)]
mod painting {
    use super::*;

    fn paint_action(agent: &mut Agent, maze: &Maze, start: &str, duration: u32) {
        let address = ["小镇", "公园", "草坪", "全能艺术终端"]
            .map(str::to_string)
            .to_vec();
        agent.action = ga_memory::Action::new(
            Event::new(agent.name.clone(), "正在", "画画", address.clone())
                .with_describe(format!("{} 在终端前画画", agent.name)),
            None,
            parse_datetime(start).unwrap(),
            duration,
        );
        let _ = maze;
    }

    #[test]
    fn one_hour_throttle_on_the_art_terminal() {
        let provider = ScriptedProvider::default().rule("想要创作的画面", "一幅星空");
        let mut t = town(vec![("阿甲", (9, 2), provider)]);

        // First firing at 09:30, planned end 10:00.
        {
            let TestTown { game, clock, records, .. } = &mut t;
            let maze = &game.maze;
            let a = &mut game.agents[0];
            paint_action(a, maze, "20240213-09:00", 60);
            a.run_special_activity(clock, maze, records);
        }
        assert_eq!(t.records.painting.len(), 1);
        assert_eq!(t.records.painting.entries()[0].content, "一幅星空");

        // Ten minutes later, same action: inside the window, nothing new.
        t.clock.advance();
        {
            let TestTown { game, clock, records, .. } = &mut t;
            let maze = &game.maze;
            let a = &mut game.agents[0];
            a.run_special_activity(clock, maze, records);
        }
        assert_eq!(t.records.painting.len(), 1);

        // A later session whose planned end clears the hour records again.
        t.clock.forward(51); // 10:31
        {
            let TestTown { game, clock, records, .. } = &mut t;
            let maze = &game.maze;
            let a = &mut game.agents[0];
            paint_action(a, maze, "20240213-10:31", 30);
            a.run_special_activity(clock, maze, records);
        }
        assert_eq!(t.records.painting.len(), 2);
        assert_eq!(
            t.game.agent("阿甲").unwrap().throttles.count(ActivityKind::Painting),
            2
        );
    }

    #[test]
    fn away_from_the_terminal_nothing_fires() {
        let provider = ScriptedProvider::default().rule("想要创作的画面", "一幅星空");
        let mut t = town(vec![("阿甲", (5, 2), provider)]); // not on the terminal
        {
            let TestTown { game, clock, records, .. } = &mut t;
            let maze = &game.maze;
            let a = &mut game.agents[0];
            paint_action(a, maze, "20240213-09:00", 60);
            a.run_special_activity(clock, maze, records);
        }
        assert!(t.records.painting.is_empty());
    }
}

// ── Sleep and pathfinding ─────────────────────────────────────────────────────

#[cfg(test)]
mod acting {
    use super::*;

    #[test]
    fn sleep_short_circuit_teleports_to_bed() {
        let mut t = town(vec![("阿甲", (5, 2), ScriptedProvider::default())]);
        let clock = t.clock;
        let TestTown { game, .. } = &mut t;
        let maze = &mut game.maze;
        let a = &mut game.agents[0];
        let events = a.go_to_sleep(&clock, maze, 570, 8 * 60);

        assert_eq!(a.coord, Coord::new(2, 2));
        assert!(!a.is_awake());
        assert!(!events.is_empty());
        let occupied = maze
            .tile_at(Coord::new(2, 2))
            .events()
            .any(|e| e.fit(Some("床"), Some("被占用"), Some("阿甲")));
        assert!(occupied);
    }

    #[test]
    fn find_path_reaches_a_free_bench() {
        let mut t = town(vec![
            ("阿甲", (4, 4), ScriptedProvider::default()),
            ("阿乙", (6, 2), ScriptedProvider::default()), // parked on one bench
        ]);
        let names = t.game.names();
        let address = ["小镇", "公园", "草坪", "长椅"].map(str::to_string).to_vec();
        let clock = t.clock;
        let TestTown { game, .. } = &mut t;
        let persona: indexmap::IndexMap<String, Coord> = game
            .agents
            .iter()
            .map(|a| (a.name.clone(), a.coord))
            .collect();
        let maze = &game.maze;
        let a = &mut game.agents[0];
        a.action = ga_memory::Action::new(
            Event::new("阿甲", "正在", "看书", address).with_describe("去长椅看书"),
            None,
            clock.now(),
            60,
        );
        let path = a.find_path(maze, &names, &persona);

        // The free bench is (7,2); the occupied one is skipped.
        assert!(!path.is_empty());
        assert_eq!(*path.last().unwrap(), Coord::new(7, 2));
        for pair in path.windows(2) {
            let d = pair[0].x.abs_diff(pair[1].x) + pair[0].y.abs_diff(pair[1].y);
            assert_eq!(d, 1);
        }
        assert!(path.iter().all(|c| !maze.tile_at(*c).collision()));
    }

    #[test]
    fn waiting_address_needs_no_path() {
        let mut t = town(vec![("阿甲", (4, 4), ScriptedProvider::default())]);
        let names = t.game.names();
        let clock = t.clock;
        let TestTown { game, .. } = &mut t;
        let maze = &game.maze;
        let a = &mut game.agents[0];
        a.action = ga_memory::Action::new(
            Event::new("阿甲", "waiting to start", "看书", vec!["<waiting>".into()]),
            None,
            clock.now(),
            30,
        );
        assert!(a.find_path(maze, &names, &indexmap::IndexMap::new()).is_empty());
    }
}

// ── Snapshot roundtrip ────────────────────────────────────────────────────────

#[cfg(test)]
mod snapshot {
    use super::*;

    #[test]
    fn snapshot_loads_back_as_a_seed() {
        let mut t = town(vec![("阿甲", (5, 2), ScriptedProvider::default())]);
        think(&mut t, "阿甲");
        let agent = t.game.agent("阿甲").unwrap();
        let json = serde_json::to_value(agent.to_snapshot()).unwrap();

        let seed: AgentSeed = serde_json::from_value(json).unwrap();
        assert_eq!(seed.coord, Some(agent.coord));
        assert_eq!(seed.currently, agent.scratch.currently);
        let schedule = seed.schedule.unwrap();
        assert_eq!(schedule.create, agent.schedule.create);
        assert_eq!(schedule.daily_schedule.len(), agent.schedule.daily_schedule.len());
        assert!(seed.action.is_some());
    }
}
