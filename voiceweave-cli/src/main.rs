//! VoiceWeave: video dubbing project manager and pipeline runner.
//!
//! # Usage
//!
//! ```text
//! voiceweave project create <youtube|video|audio> <source> --lang <code> [--name <name>] [--json]
//! voiceweave project list [--all] [--json]
//! voiceweave project show <id> [--json]
//! voiceweave project delete <id>
//! voiceweave project copy-files <id>
//! voiceweave project reveal <id>
//! voiceweave run <id> [<step>] [--timeout <secs>] [--executor <program>] [--json]
//! voiceweave settings show [--json]
//! voiceweave settings set-root <path>
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); stdout carries results.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{project::ProjectCommand, run::RunArgs, settings::SettingsCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "voiceweave",
    version,
    about = "Create dubbing projects and run their processing pipeline",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, inspect and remove projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Run one pipeline step, or all five in order.
    Run(RunArgs),

    /// Show or change application settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Project { command } => commands::project::run(command),
        Commands::Run(args) => args.run(),
        Commands::Settings { command } => commands::settings::run(command),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
