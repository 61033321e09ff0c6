//! `rollcall config check`: load, validate, and summarize the config.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rollcall_core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the config file and print the effective settings.
    Check,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "key")]
    key: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

pub fn run(command: ConfigCommand, config_path: &Path) -> Result<()> {
    match command {
        ConfigCommand::Check => check(config_path),
    }
}

fn check(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;

    println!("{} {} is valid", "✓".green(), config_path.display());
    let mut table = Table::new(settings(&config));
    table.with(Style::rounded());
    println!("{table}");

    for (label, path) in [
        ("credentialsPath", &config.credentials_path),
        ("tokenPath", &config.token_path),
    ] {
        if !path.exists() {
            println!("{} {label} does not exist yet: {}", "!".yellow(), path.display());
        }
    }
    Ok(())
}

fn settings(config: &Config) -> Vec<SettingRow> {
    vec![
        SettingRow {
            key: "discordSecret",
            value: "<set>".to_string(),
        },
        SettingRow {
            key: "spreadsheetId",
            value: config.spreadsheet_id.clone(),
        },
        SettingRow {
            key: "guildId",
            value: config.guild_id.clone(),
        },
        SettingRow {
            key: "sheetId",
            value: config.sheet_id.to_string(),
        },
        SettingRow {
            key: "sheetName",
            value: config
                .sheet_name
                .clone()
                .unwrap_or_else(|| "(first tab)".to_string()),
        },
        SettingRow {
            key: "intervalSecs",
            value: config.interval.as_secs().to_string(),
        },
        SettingRow {
            key: "timezone",
            value: config.timezone.name().to_string(),
        },
        SettingRow {
            key: "credentialsPath",
            value: config.credentials_path.display().to_string(),
        },
        SettingRow {
            key: "tokenPath",
            value: config.token_path.display().to_string(),
        },
    ]
}
