//! `rollcall auth`: run the Google consent exchange and store the token.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use rollcall_core::Config;
use rollcall_google::{Credentials, InstalledApp, Token};

/// Arguments for `rollcall auth`.
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Prompt again even if a token is already stored.
    #[arg(long)]
    pub force: bool,
}

impl AuthArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;

        let existing = Token::load_at(&config.token_path).with_context(|| {
            format!("failed to read token {}", config.token_path.display())
        })?;
        if existing.is_some() && !self.force {
            println!(
                "{} token already stored at {} (use --force to re-authorize)",
                "✓".green(),
                config.token_path.display()
            );
            return Ok(());
        }

        let app = InstalledApp::load_at(&config.credentials_path).with_context(|| {
            format!(
                "failed to load client secret {}",
                config.credentials_path.display()
            )
        })?;
        Credentials::authorize_interactive(app, &config.token_path)
            .context("authorization failed")?;

        println!(
            "{} token stored at {}",
            "✓".green(),
            config.token_path.display()
        );
        Ok(())
    }
}
