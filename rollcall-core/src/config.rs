//! Startup configuration.
//!
//! # File format
//!
//! JSON by default; `.yaml` / `.yml` files are parsed as YAML. Keys are
//! camelCase:
//!
//! ```json
//! { "discordSecret": "…", "spreadsheetId": "…", "guildId": "1234" }
//! ```
//!
//! Optional keys: `sheetId`, `sheetName`, `intervalSecs`, `timezone`,
//! `credentialsPath`, `tokenPath`. Relative paths resolve against the
//! directory holding the config file.
//!
//! # API pattern
//!
//! - `load_with(path, secret_override)`: explicit override; used in tests
//! - `load(path)`: reads the override from `ROLLCALL_DISCORD_SECRET`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Environment variable that overrides `discordSecret`.
pub const DISCORD_SECRET_ENV: &str = "ROLLCALL_DISCORD_SECRET";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    discord_secret: Option<String>,
    spreadsheet_id: Option<String>,
    guild_id: Option<String>,
    sheet_id: Option<i64>,
    sheet_name: Option<String>,
    interval_secs: Option<u64>,
    timezone: Option<String>,
    credentials_path: Option<PathBuf>,
    token_path: Option<PathBuf>,
}

/// Validated configuration, constructed once at startup.
#[derive(Clone)]
pub struct Config {
    pub discord_secret: String,
    pub spreadsheet_id: String,
    pub guild_id: String,
    /// Numeric tab id used for structural edits.
    pub sheet_id: i64,
    /// Tab title used to qualify A1 ranges; `None` targets the first tab.
    pub sheet_name: Option<String>,
    pub interval: Duration,
    pub timezone: Tz,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("discord_secret", &"<redacted>")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("guild_id", &self.guild_id)
            .field("sheet_id", &self.sheet_id)
            .field("sheet_name", &self.sheet_name)
            .field("interval", &self.interval)
            .field("timezone", &self.timezone)
            .field("credentials_path", &self.credentials_path)
            .field("token_path", &self.token_path)
            .finish()
    }
}

impl Config {
    /// Load and validate the config at `path`, honouring the env override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let secret = std::env::var(DISCORD_SECRET_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty());
        Self::load_with(path, secret)
    }

    /// Load and validate the config at `path`.
    ///
    /// `secret_override`, when set, replaces `discordSecret` from the file.
    pub fn load_with(path: &Path, secret_override: Option<String>) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = parse_raw(path, &contents)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_raw(raw, base, secret_override)
    }

    fn from_raw(
        raw: RawConfig,
        base: &Path,
        secret_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let discord_secret = required("discordSecret", secret_override.or(raw.discord_secret))?;
        let spreadsheet_id = required("spreadsheetId", raw.spreadsheet_id)?;
        let guild_id = required("guildId", raw.guild_id)?;
        if !guild_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                key: "guildId",
                reason: format!("expected a numeric snowflake, got '{guild_id}'"),
            });
        }

        let interval_secs = raw.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "intervalSecs",
                reason: "must be greater than zero".to_string(),
            });
        }

        let zone = raw.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE);
        let timezone = Tz::from_str(zone).map_err(|_| ConfigError::Invalid {
            key: "timezone",
            reason: format!("unknown IANA time zone '{zone}'"),
        })?;

        let sheet_name = raw.sheet_name.filter(|name| !name.trim().is_empty());

        Ok(Self {
            discord_secret,
            spreadsheet_id,
            guild_id,
            sheet_id: raw.sheet_id.unwrap_or(0),
            sheet_name,
            interval: Duration::from_secs(interval_secs),
            timezone,
            credentials_path: resolve(
                base,
                raw.credentials_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE)),
            ),
            token_path: resolve(
                base,
                raw.token_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            ),
        })
    }
}

fn parse_raw(path: &Path, contents: &str) -> Result<RawConfig, ConfigError> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    if is_yaml {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_json::from_str(contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { key }),
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
