use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler, control socket, and pass context.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] rollcall_core::ConfigError),

    #[error("google error: {0}")]
    Google(#[from] rollcall_google::GoogleError),

    #[error("discord error: {0}")]
    Discord(#[from] rollcall_discord::DiscordError),

    #[error("sync error: {0}")]
    Sync(#[from] rollcall_sync::SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
