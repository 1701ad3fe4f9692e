//! `ga-compress` — fuse a simulation's checkpoints into the playback
//! artifact (`movement.json`) and the Markdown report (`simulation.md`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use ga_maze::{Maze, MazeDoc};
use ga_output::{
    ResultsRoot, compress_simulation, latest_checkpoint, load_json, write_report,
};
use ga_sim::SnapshotDoc;

#[derive(Parser)]
#[command(name = "ga-compress", about = "Compress simulation checkpoints for playback")]
struct Args {
    /// Simulation identifier under `<results>/checkpoints/`.
    #[arg(long)]
    name: String,

    /// Static root used to resolve the maze path recorded in checkpoints.
    #[arg(long, default_value = "data")]
    static_root: PathBuf,

    /// Log level: debug|info|warn|error.
    #[arg(long, default_value = "info")]
    verbose: String,
}

fn run(args: Args) -> anyhow::Result<()> {
    ga_cli::init_logging(&args.verbose, None)?;

    let results = ResultsRoot::resolve();
    let checkpoints = results.checkpoints(&args.name);
    let compressed = results.compressed(&args.name);

    // The checkpoints record which maze they were simulated on.
    let latest = latest_checkpoint(&checkpoints)
        .with_context(|| format!("scanning {}", checkpoints.display()))?;
    let snapshot: SnapshotDoc = load_json(&latest).context("reading the latest checkpoint")?;
    let maze_path = args.static_root.join(&snapshot.maze.path);
    let maze_doc: MazeDoc =
        load_json(&maze_path).with_context(|| format!("loading {}", maze_path.display()))?;
    let maze = Maze::from_doc(maze_doc, false).context("building the maze")?;

    let doc = compress_simulation(&checkpoints, &compressed, &maze)
        .context("generating movement.json")?;
    write_report(&checkpoints, &compressed).context("generating simulation.md")?;

    println!(
        "compressed {} steps into {} ({} frames)",
        snapshot.step,
        compressed.display(),
        doc.all_movement.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ga-compress: {err:#}");
            ExitCode::FAILURE
        }
    }
}
