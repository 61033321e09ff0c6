//! Error types for rollcall-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise outside the per-step sync protocol.
///
/// Step failures are never errors; they are recorded in the
/// [`PassReport`](crate::PassReport).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The directory snapshot could not be fetched.
    #[error("directory snapshot failed: {0}")]
    Directory(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (last-pass store).
    #[error("last-pass JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
