//! crystal: command-line driver for crystal shape analysis.
//!
//! Measures a crystal in every frame of an image directory and writes a
//! growth-rate report, re-aggregates saved or detector-produced records,
//! inspects the stages of a single frame with timing diagnostics, and
//! dumps the derived frame sets.
//!
//! # Usage
//!
//! ```text
//! crystal analyze <FRAMES_DIR> [OPTIONS]
//! crystal aggregate --detections <CSV> [OPTIONS]
//! crystal stages <IMAGE> [--out <DIR>] [--json]
//! crystal frames <FRAMES_DIR> --out <DIR>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod commands;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crystal_pipeline::Clock;
use tracing_subscriber::EnvFilter;

/// Crystal dimension measurement and growth-rate analysis.
#[derive(Parser)]
#[command(name = "crystal", version)]
struct Cli {
    /// Log debug output (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure every frame in a directory and write a growth report.
    Analyze(commands::analyze::AnalyzeArgs),
    /// Build a growth report from detector output or a saved record table.
    Aggregate(commands::aggregate::AggregateArgs),
    /// Run the pipeline on one image and print per-stage diagnostics.
    Stages(commands::stages::StagesArgs),
    /// Dump the original, Hough-processed and contour-processed frame sets.
    Frames(commands::frames::FramesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Analyze(args) => commands::analyze::run(args),
        Commands::Aggregate(args) => commands::aggregate::run(args),
        Commands::Stages(args) => commands::stages::run(args),
        Commands::Frames(args) => commands::frames::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
