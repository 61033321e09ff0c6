//! `rollcall daemon`: scheduler lifecycle over the control socket.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use rollcall_core::Config;
use rollcall_daemon::paths::socket_path;
use rollcall_daemon::{request_status, request_stop, start_blocking, DaemonError};

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the scheduler in the foreground until ctrl-c or `daemon stop`.
    Start,
    /// Request graceful shutdown over the control socket.
    Stop,
    /// Query scheduler status over the control socket.
    Status,
}

pub fn run(command: DaemonCommand, config_path: &Path) -> Result<()> {
    let home = home_dir()?;

    match command {
        DaemonCommand::Start => {
            let config = Config::load(config_path)
                .with_context(|| format!("failed to load config {}", config_path.display()))?;
            start_blocking(&home, &config).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let payload = match request_status(&home) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
    }

    Ok(())
}
