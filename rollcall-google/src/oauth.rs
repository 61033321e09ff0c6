//! Installed-app OAuth 2.0 for the Sheets API.
//!
//! # Files
//!
//! - client secret (`credentials.json`): the `installed` section downloaded
//!   from the Google Cloud console.
//! - token (`token.json`): `{access_token, refresh_token, scope, token_type,
//!   expiry_date}` with `expiry_date` in Unix milliseconds. Written with mode
//!   `0600` via `.tmp` + rename.
//!
//! # Flow
//!
//! 1. Token file present → load it, refresh lazily when it expires.
//! 2. Token file absent → print the consent URL, read one code from stdin,
//!    exchange it, persist the token.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{http_err, io_err, GoogleError};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry.
const EXPIRY_SKEW_MS: i64 = 60_000;

// ---------------------------------------------------------------------------
// Client secret
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<InstalledApp>,
}

/// The `installed` section of a client secret file.
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl InstalledApp {
    pub fn load_at(path: &Path) -> Result<Self, GoogleError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let file: ClientSecretFile =
            serde_json::from_str(&contents).map_err(|source| GoogleError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        file.installed.ok_or_else(|| GoogleError::NotInstalledApp {
            path: path.to_path_buf(),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost")
    }

    /// Consent URL requesting offline access to spreadsheets.
    pub fn consent_url(&self) -> String {
        format!(
            "{}?access_type=offline&scope={}&response_type=code&client_id={}&redirect_uri={}",
            self.auth_uri,
            urlencoding::encode(SHEETS_SCOPE),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(self.redirect_uri()),
        )
    }

    /// Trade an authorization code for a token.
    pub fn exchange_code(&self, agent: &ureq::Agent, code: &str) -> Result<Token, GoogleError> {
        let response = agent
            .post(&self.token_uri)
            .send_form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri()),
            ])
            .map_err(|e| http_err(&self.token_uri, e))?;
        let grant: TokenGrant = response.into_json().map_err(|source| GoogleError::Decode {
            endpoint: self.token_uri.clone(),
            source,
        })?;
        Ok(Token::from_grant(grant, None))
    }

    /// Trade a refresh token for a fresh access token.
    pub fn refresh(&self, agent: &ureq::Agent, token: &Token) -> Result<Token, GoogleError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or(GoogleError::NoRefreshToken)?;
        let response = agent
            .post(&self.token_uri)
            .send_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .map_err(|e| http_err(&self.token_uri, e))?;
        let grant: TokenGrant = response.into_json().map_err(|source| GoogleError::Decode {
            endpoint: self.token_uri.clone(),
            source,
        })?;
        Ok(Token::from_grant(grant, Some(refresh_token)))
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
}

/// Persisted OAuth token.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

impl Token {
    fn from_grant(grant: TokenGrant, previous_refresh: Option<&str>) -> Self {
        Self {
            access_token: grant.access_token,
            // Refresh responses usually omit the refresh token; keep the old one.
            refresh_token: grant
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            scope: grant.scope,
            token_type: grant.token_type,
            expiry_date: grant
                .expires_in
                .map(|secs| Utc::now().timestamp_millis() + secs * 1000),
        }
    }

    /// Tokens without a recorded expiry are treated as valid.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expiry_date
            .is_some_and(|expiry| now_ms + EXPIRY_SKEW_MS >= expiry)
    }

    /// Load the token at `path`, or `None` if the file does not exist.
    pub fn load_at(path: &Path) -> Result<Option<Self>, GoogleError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| GoogleError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Atomically save the token to `path` with mode `0600`.
    pub fn save_at(&self, path: &Path) -> Result<(), GoogleError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(self).map_err(|source| GoogleError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// An authorized Sheets credential: client secret + current token.
///
/// Refreshes and re-persists the token when it expires.
pub struct Credentials {
    app: InstalledApp,
    token: Token,
    token_path: PathBuf,
    agent: ureq::Agent,
}

impl Credentials {
    pub fn new(app: InstalledApp, token: Token, token_path: PathBuf) -> Self {
        Self {
            app,
            token,
            token_path,
            agent: crate::agent(),
        }
    }

    /// Load the stored token, running the interactive exchange on stdin if
    /// there is none.
    pub fn load_or_authorize(
        credentials_path: &Path,
        token_path: &Path,
    ) -> Result<Self, GoogleError> {
        let app = InstalledApp::load_at(credentials_path)?;
        match Token::load_at(token_path)? {
            Some(token) => {
                tracing::debug!(path = %token_path.display(), "loaded stored token");
                Ok(Self::new(app, token, token_path.to_path_buf()))
            }
            None => Self::authorize_interactive(app, token_path),
        }
    }

    /// Run the consent prompt on the process's stdin/stdout and persist the
    /// resulting token.
    pub fn authorize_interactive(app: InstalledApp, token_path: &Path) -> Result<Self, GoogleError> {
        let code = {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let mut input = stdin.lock();
            let mut output = stdout.lock();
            prompt_for_code(&app.consent_url(), &mut input, &mut output)
                .map_err(|e| io_err("<stdin>", e))?
        };
        let code = code.ok_or(GoogleError::EmptyCode)?;

        let agent = crate::agent();
        let token = app.exchange_code(&agent, &code)?;
        token.save_at(token_path)?;
        tracing::info!(path = %token_path.display(), "token stored");
        Ok(Self {
            app,
            token,
            token_path: token_path.to_path_buf(),
            agent,
        })
    }

    /// A valid access token, refreshing first if the stored one has expired.
    pub fn access_token(&mut self) -> Result<&str, GoogleError> {
        if self.token.is_expired_at(Utc::now().timestamp_millis()) {
            tracing::info!("access token expired; refreshing");
            let refreshed = self.app.refresh(&self.agent, &self.token)?;
            if let Err(err) = refreshed.save_at(&self.token_path) {
                tracing::warn!(error = %err, "failed to persist refreshed token");
            }
            self.token = refreshed;
        }
        Ok(&self.token.access_token)
    }

    pub fn agent(&self) -> &ureq::Agent {
        &self.agent
    }
}

/// Print the consent URL and read one authorization code.
///
/// Accepts either the bare code or the whole redirect URL pasted from the
/// browser. Returns `None` for an empty answer.
pub fn prompt_for_code<R: BufRead, W: Write>(
    consent_url: &str,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<Option<String>> {
    writeln!(output, "Authorize this app by visiting this url: {consent_url}")?;
    write!(output, "Enter the code from that page here: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(extract_code(line.trim()))
}

fn extract_code(answer: &str) -> Option<String> {
    if answer.is_empty() {
        return None;
    }
    let Some((_, query)) = answer.split_once('?') else {
        return Some(answer.to_string());
    };
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "code")
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|code| !code.is_empty())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), GoogleError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), GoogleError> {
    Ok(())
}
