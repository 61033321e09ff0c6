//! `rollcall sync`: run one pass now.
//!
//! When the daemon is up the pass is delegated to it over the control
//! socket, so it shares the daemon's in-flight guard.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{json, Value};
use tabled::{builder::Builder, settings::Style};

use rollcall_core::{Cell, Config};
use rollcall_daemon::{init_tracing, request_sync, DaemonError, PassRunner, SyncContext};
use rollcall_discord::DiscordClient;
use rollcall_sync::{last_pass, pipeline, MemorySheet, PassReport, PassStatus, SheetLayout};

use super::home_dir;
use super::status::print_report;

/// Arguments for `rollcall sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Fetch the roster and show the resulting grid without writing the sheet.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        init_tracing();
        let config = Config::load(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;

        if self.dry_run {
            return self.dry_run(&config);
        }

        let home = home_dir()?;
        let report = match request_sync(&home) {
            Ok(outcome) => match report_from_daemon(outcome)? {
                Some(report) => report,
                None => {
                    println!("daemon is already running a pass; request skipped");
                    return Ok(());
                }
            },
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let context = SyncContext::connect(&config).context("startup failed")?;
                let report = context.run_pass();
                last_pass::save_at(&home, &report).context("failed to record last pass")?;
                report
            }
            Err(err) => return Err(err).context("daemon sync request failed"),
        };

        self.print(&report, None)?;
        if report.status == PassStatus::Failed {
            bail!("pass failed");
        }
        Ok(())
    }

    fn dry_run(&self, config: &Config) -> Result<()> {
        let discord = DiscordClient::new(&config.discord_secret, config.guild_id.clone());
        discord.ready().context("discord connection check failed")?;

        let mut sheet = MemorySheet::new();
        let layout = SheetLayout::from_config(config);
        let report = pipeline::run_pass(&discord, &mut sheet, &layout, config.timezone);
        let grid = sheet.rows();
        self.print(&report, Some(grid.as_slice()))
    }

    fn print(&self, report: &PassReport, grid: Option<&[Vec<Cell>]>) -> Result<()> {
        if self.json {
            let mut payload = json!({ "report": report });
            if let Some(grid) = grid {
                payload["grid"] = json!(grid);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize pass JSON")?
            );
            return Ok(());
        }

        if let Some(grid) = grid {
            println!("{} destination grid after this pass:", "[dry-run]".cyan());
            println!("{}", render_grid(grid));
        }
        print_report(report);
        Ok(())
    }
}

/// `None` when the daemon skipped the request.
fn report_from_daemon(outcome: Value) -> Result<Option<PassReport>> {
    if outcome["outcome"] == "skipped" {
        return Ok(None);
    }
    let report = serde_json::from_value(outcome["report"].clone())
        .context("daemon returned an unreadable pass report")?;
    Ok(Some(report))
}

fn render_grid(rows: &[Vec<Cell>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut builder = Builder::default();

    let mut header = vec![String::new()];
    header.extend((0..width).map(column_label));
    builder.push_record(header);

    for (index, row) in rows.iter().enumerate() {
        let mut record = vec![(index + 1).to_string()];
        record.extend((0..width).map(|col| row.get(col).map(Cell::to_string).unwrap_or_default()));
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Zero-based column index to its A1 letters.
fn column_label(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_labels_follow_a1() {
        let labels: Vec<String> = [0, 1, 25, 26, 27, 51, 52, 701, 702]
            .into_iter()
            .map(column_label)
            .collect();
        assert_eq!(labels, ["A", "B", "Z", "AA", "AB", "AZ", "BA", "ZZ", "AAA"]);
    }

    #[test]
    fn grid_shows_row_numbers_and_blank_cells() {
        let rendered = render_grid(&[
            vec![Cell::Empty, Cell::from("10/18/2026, 3:05 PM")],
            vec![Cell::Empty, Cell::Empty, Cell::from("Admin")],
        ]);
        assert!(rendered.contains("10/18/2026, 3:05 PM"));
        assert!(rendered.contains("Admin"));
        assert!(rendered.contains(" C "));
    }

    #[test]
    fn skipped_daemon_outcome_has_no_report() {
        let outcome = json!({"outcome": "skipped", "source": "socket", "reason": "already running"});
        assert!(report_from_daemon(outcome).expect("parse").is_none());
    }
}
