//! Boss trace replay.
//!
//! Replays a recorded JSONL hook trace against a tracker and writes every
//! Spawn, Kill and Despawn notification as one JSON line.

use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use boss_tracker::replay::{load_trace, NotificationWriter, ReplayError, ReplayHost, ReplaySummary};
use boss_tracker::{BossTracker, TrackerConfig};

/// Command line arguments for the replay
#[derive(Parser, Debug)]
#[command(name = "boss_replay")]
#[command(about = "Replays a boss hook trace and prints the notifications")]
struct Args {
    /// JSONL trace of host hook calls
    trace: PathBuf,

    /// Tracker configuration (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write notifications here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", boss_tracker::default_config_toml());
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(summary) => {
            eprintln!();
            eprintln!("Replay complete");
            eprintln!("===============");
            eprintln!("Records:  {}", summary.records);
            eprintln!("Ticks:    {}", summary.ticks);
            eprintln!("Skipped:  {}", summary.skipped);
            eprintln!("Spawns:   {}", summary.spawns);
            eprintln!("Kills:    {}", summary.kills);
            eprintln!("Despawns: {}", summary.despawns);
            eprintln!("Present:  {}", summary.final_count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn run(args: &Args) -> Result<ReplaySummary, ReplayError> {
    let config = match &args.config {
        Some(path) => TrackerConfig::from_file(path).map_err(boss_tracker::TrackerError::from)?,
        None => TrackerConfig::default(),
    };
    let records = load_trace(&args.trace)?;
    tracing::info!("Loaded {} trace records from {}", records.len(), args.trace.display());

    let mut tracker = BossTracker::new(config);
    let mut host = ReplayHost::new();
    let summary = host.run(&mut tracker, &records)?;
    tracker.shutdown(&mut host);

    match &args.output {
        Some(path) => {
            let mut writer = NotificationWriter::create(path)?;
            writer.write_all(&summary.notifications)?;
            writer.flush()?;
        }
        None => {
            let mut writer = NotificationWriter::new(io::stdout().lock());
            writer.write_all(&summary.notifications)?;
            writer.flush()?;
        }
    }

    Ok(summary)
}
