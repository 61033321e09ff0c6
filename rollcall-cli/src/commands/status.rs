//! `rollcall status`: the most recent pass from the last-pass store.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rollcall_sync::{last_pass, PassReport, PassStatus, StepOutcome};

use super::home_dir;

/// Arguments for `rollcall status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let report = last_pass::load_at(&home).context("failed to read last-pass record")?;

        if self.json {
            let payload = serde_json::json!({ "last_pass": report });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        match report {
            Some(report) => print_report(&report),
            None => println!("No pass recorded yet. Run `rollcall sync` or `rollcall daemon start`."),
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "step")]
    step: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "duration")]
    duration: String,
    #[tabled(rename = "error")]
    error: String,
}

/// Human-readable rendering shared with `rollcall sync`.
pub(crate) fn print_report(report: &PassReport) {
    let started: DateTime<Local> = report.started_at.with_timezone(&Local);
    println!(
        "Last pass: {} | started {} ({}) | {} roles | {} members | {} ms",
        status_label(report.status),
        started.format("%Y-%m-%d %H:%M:%S"),
        format_age(report.started_at, Utc::now()),
        report.roles,
        report.members,
        report.duration_ms(),
    );
    if let Some(stamp) = &report.stamp {
        println!("Stamp: {stamp}");
    }
    if let Some(error) = &report.error {
        println!("{} {error}", "Aborted:".red().bold());
    }
    if report.steps.is_empty() {
        return;
    }

    let rows: Vec<StepRow> = report
        .steps
        .iter()
        .map(|step| {
            let (outcome, error) = match &step.outcome {
                StepOutcome::Applied => ("applied".green().to_string(), String::new()),
                StepOutcome::Failed { error } => ("failed".red().to_string(), error.clone()),
            };
            StepRow {
                step: step.step.to_string(),
                outcome,
                duration: format!("{} ms", step.duration_ms),
                error,
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn status_label(status: PassStatus) -> String {
    let label = status.as_str().to_uppercase();
    match status {
        PassStatus::Complete => label.green().bold().to_string(),
        PassStatus::Partial => label.yellow().bold().to_string(),
        PassStatus::Failed => label.red().bold().to_string(),
    }
}

fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn age_buckets() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(5), now), "5s ago");
        assert_eq!(format_age(now - Duration::minutes(61), now), "1h ago");
        assert_eq!(format_age(now - Duration::days(3), now), "3d ago");
        assert_eq!(format_age(now + Duration::seconds(5), now), "0s ago");
    }
}
