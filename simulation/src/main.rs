//! TQueue - Simulation CLI
//!
//! Runs the canned scenarios and the randomized cross-implementation
//! oracle from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use tqueue_logging::{ConsoleFormat, LogConfig, TQueueSubscriberBuilder};
use tqueue_simulation::{SimConfig, scenarios};

#[derive(Parser)]
#[command(
    name = "tqueue-sim",
    about = "Oracle simulation for the TQueue engine and its storage adapters",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log to stderr as JSON lines instead of pretty text
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write JSON-lines log files, rotated daily, into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canonical push-and-read walkthrough
    Hands,

    /// Push events through the binlog adapter, crash and recover
    Crash {
        /// Number of events to push before the crash
        #[arg(short, long, default_value = "5")]
        events: usize,

        /// Directory for the binlog (a temporary one if omitted)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Collect an expired event and show the head moving
    Gc,

    /// Run the randomized baseline/memory/binlog oracle
    Random {
        /// Number of steps to run
        #[arg(short, long, default_value = "100000")]
        steps: u64,

        /// Seed of the step schedule
        #[arg(long, default_value = "123")]
        seed: u64,

        /// Number of distinct queues
        #[arg(short, long, default_value = "10")]
        queues: i64,

        /// Directory for the binlog (a temporary one if omitted)
        #[arg(short, long)]
        binlog_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = TQueueSubscriberBuilder::new()
        .with_config(log_config(&cli))
        .init();

    match cli.command {
        Commands::Hands => {
            let outcome = scenarios::run_hands_scenario()?;
            println!(
                "pushed {} | head {} | tail {} | read {} event(s)",
                outcome.pushed,
                outcome.head,
                outcome.tail,
                outcome.read.len()
            );
            for event in &outcome.read {
                println!("  {} {:?}", event.id, String::from_utf8_lossy(&event.data));
            }
        }
        Commands::Crash { events, dir } => {
            let tmp;
            let dir = match dir {
                Some(dir) => dir,
                None => {
                    tmp = tempfile::tempdir().context("creating temporary binlog directory")?;
                    tmp.path().to_path_buf()
                }
            };
            let outcome = scenarios::run_crash_scenario(&dir, events)?;
            println!(
                "pushed {} event(s), recovered {} | head {:?} | tail {:?}",
                outcome.pushed.len(),
                outcome.recovered.len(),
                outcome.head_after.map(|id| id.value()),
                outcome.tail_after.map(|id| id.value())
            );
        }
        Commands::Gc => {
            let outcome = scenarios::run_gc_scenario()?;
            println!(
                "removed {} | head {:?} -> {:?} | visible {}",
                outcome.removed,
                outcome.head_before.map(|id| id.value()),
                outcome.head_after.map(|id| id.value()),
                outcome.visible.len()
            );
        }
        Commands::Random {
            steps,
            seed,
            queues,
            binlog_dir,
        } => {
            let config = SimConfig {
                seed,
                steps,
                queue_count: queues,
                binlog_dir,
                ..Default::default()
            };
            let stats = scenarios::run_random_scenario(config)
                .with_context(|| format!("oracle run with seed {} failed", seed))?;
            print_stats(&stats);
        }
    }

    Ok(())
}

fn log_config(cli: &Cli) -> LogConfig {
    let mut config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if cli.json_logs {
        config = config.with_console(ConsoleFormat::Json);
    }
    if let Some(dir) = &cli.log_dir {
        config = config.with_log_dir(dir);
    }
    config
}

fn print_stats(stats: &tqueue_simulation::SimStats) {
    println!("\n=== Oracle Statistics ===");
    println!("Steps:            {}", stats.steps);
    println!("Pushes:           {}", stats.pushes);
    println!("  explicit ids:   {}", stats.explicit_pushes);
    println!("  rejected:       {}", stats.rejected_pushes);
    println!("  recycles:       {}", stats.recycles);
    println!("Tail checks:      {}", stats.tail_checks);
    println!("Get checks:       {}", stats.get_checks);
    println!("  events read:    {}", stats.events_read);
    println!("Ticks:            {}", stats.ticks);
    println!("Restarts:         {}", stats.restarts);
    println!("GC runs:          {}", stats.gc_runs);
    println!("  removed:        {}", stats.gc_removed);
    println!("Compactions:      {}", stats.compactions);
}
