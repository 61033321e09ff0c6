//! Google side of the roster mirror: OAuth credentials and the Sheets v4
//! spreadsheet handle.
//!
//! ```no_run
//! use std::path::Path;
//! use rollcall_google::{oauth::Credentials, SheetsClient};
//!
//! let creds = Credentials::load_or_authorize(
//!     Path::new("credentials.json"),
//!     Path::new("token.json"),
//! )?;
//! let sheets = SheetsClient::new("spreadsheet-id", creds);
//! # Ok::<(), rollcall_google::GoogleError>(())
//! ```

pub mod error;
pub mod oauth;
pub mod sheets;

pub use error::GoogleError;
pub use oauth::{Credentials, InstalledApp, Token};
pub use sheets::SheetsClient;

/// Shared blocking HTTP agent with request timeouts.
pub fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(std::time::Duration::from_secs(10))
        .timeout(std::time::Duration::from_secs(60))
        .build()
}
