//! The long-lived pass context: validated config plus both API clients.

use std::sync::Mutex;

use chrono_tz::Tz;

use rollcall_core::Config;
use rollcall_discord::{DiscordClient, ReadyInfo};
use rollcall_google::{Credentials, SheetsClient};
use rollcall_sync::{pipeline, PassReport, SheetLayout};

use crate::error::DaemonError;

/// Runs one blocking pass. The scheduler only ever sees this seam.
pub trait PassRunner: Send + Sync + 'static {
    fn run_pass(&self) -> PassReport;
}

/// Built once at startup and held by the daemon for its lifetime.
pub struct SyncContext {
    discord: DiscordClient,
    sheets: Mutex<SheetsClient>,
    layout: SheetLayout,
    zone: Tz,
    ready: ReadyInfo,
}

impl SyncContext {
    /// Load credentials (prompting on stdin if no token is stored yet) and
    /// verify the Discord connection. Any failure here is fatal to startup.
    pub fn connect(config: &Config) -> Result<Self, DaemonError> {
        let credentials =
            Credentials::load_or_authorize(&config.credentials_path, &config.token_path)?;
        let discord = DiscordClient::new(&config.discord_secret, config.guild_id.clone());
        let ready = discord.ready()?;

        Ok(Self {
            discord,
            sheets: Mutex::new(SheetsClient::new(config.spreadsheet_id.clone(), credentials)),
            layout: SheetLayout::from_config(config),
            zone: config.timezone,
            ready,
        })
    }

    pub fn ready_info(&self) -> &ReadyInfo {
        &self.ready
    }
}

impl PassRunner for SyncContext {
    fn run_pass(&self) -> PassReport {
        let mut sheets = match self.sheets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pipeline::run_pass(&self.discord, &mut *sheets, &self.layout, self.zone)
    }
}
