//! # Swap2 Arena — Bo3 match-orchestration engine
//!
//! A library-first crate implementing three cooperating state
//! machines for a ranked best-of-three board-game series built on the
//! Swap 2 opening rule:
//!
//! - [`swap2`] — the per-game opening dialogue deciding who plays Black.
//! - [`series`] — the Bo3 lifecycle: scoring, advancement, rematches.
//! - [`disconnect`] — a polled watchdog that forfeits on timeout.
//!
//! The engine performs no I/O: every collaborator that would touch a
//! database, a clock, or a rating service is injected — see
//! [`collaborators`]. This binary wraps a `demo` subcommand that drives
//! a scripted series end to end in the terminal so the engine is
//! visibly exercised without a network layer.
//!
//! ## Usage
//!
//! ```bash
//! # Run the scripted two-player series demo
//! swap2-arena demo
//! ```

mod demo;

use clap::{Parser, Subcommand};

/// Swap2 Arena — Bo3 series orchestration engine.
#[derive(Parser, Debug)]
#[command(name = "swap2-arena")]
#[command(about = "Swap2 opening + Bo3 series orchestration engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted two-player series end to end in the terminal.
    Demo,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => demo::run_demo(),
    }
}
