//! `ga-simulate` — run the town.
//!
//! Exit status: 0 on normal completion, non-zero on any fatal startup or
//! checkpoint error (config problems, missing maze, unwritable results).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use ga_output::ResultsRoot;
use ga_sim::{SimulationServer, WorldConfig};

#[derive(Parser)]
#[command(name = "ga-simulate", about = "Tick-driven generative-agent town simulator")]
struct Args {
    /// Simulation identifier; doubles as the checkpoint folder name.
    #[arg(long)]
    name: String,

    /// Initial simulated datetime, `YYYYMMDD-HH:MM`.
    #[arg(long, default_value = "20240213-09:30")]
    start: String,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 10)]
    step: u64,

    /// Simulated minutes per tick.
    #[arg(long, default_value_t = 10)]
    stride: u32,

    /// Resume from the latest checkpoint instead of initializing.
    #[arg(long)]
    resume: bool,

    /// Log level: debug|info|warn|error.
    #[arg(long, default_value = "info")]
    verbose: String,

    /// Optional log file name inside the checkpoint folder.
    #[arg(long)]
    log: Option<String>,

    /// World config file; its directory is the static root.
    #[arg(long, default_value = "data/world.json")]
    config: PathBuf,
}

fn run(args: Args) -> anyhow::Result<()> {
    let results = ResultsRoot::resolve();
    let log_file = args
        .log
        .as_ref()
        .map(|name| results.checkpoints(&args.name).join(name));
    ga_cli::init_logging(&args.verbose, log_file.as_deref())?;

    let static_root = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut config = WorldConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if !args.resume {
        config.time.start = args.start.clone();
        config.stride = args.stride;
    }

    let mut server =
        SimulationServer::new(&args.name, &static_root, &results, config, args.resume)
            .context("starting the simulation")?;
    server.simulate(args.step).context("running the simulation")?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ga-simulate: {err:#}");
            ExitCode::FAILURE
        }
    }
}
