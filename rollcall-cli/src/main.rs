//! rollcall: mirror a Discord guild's member/role roster into a Google Sheet.
//!
//! # Usage
//!
//! ```text
//! rollcall [--config <path>] auth [--force]
//! rollcall [--config <path>] sync [--dry-run] [--json]
//! rollcall status [--json]
//! rollcall [--config <path>] config check
//! rollcall [--config <path>] daemon start|stop|status
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    auth::AuthArgs, config::ConfigCommand, daemon::DaemonCommand, status::StatusArgs,
    sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rollcall",
    version,
    about = "Mirror a Discord server's roles and members into a Google Sheet",
    long_about = None,
)]
struct Cli {
    /// Path to the JSON (or .yaml/.yml) config file.
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authorize Google Sheets access and store the token.
    Auth(AuthArgs),

    /// Run one pass now.
    Sync(SyncArgs),

    /// Show the most recent pass.
    Status(StatusArgs),

    /// Inspect the configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Run or control the background scheduler.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Auth(args) => args.run(&cli.config),
        Commands::Sync(args) => args.run(&cli.config),
        Commands::Status(args) => args.run(),
        Commands::Config { command } => commands::config::run(command, &cli.config),
        Commands::Daemon { command } => commands::daemon::run(command, &cli.config),
    }
}
