//! Last-pass store: the most recent [`PassReport`], for `rollcall status`.
//!
//! Persists a single JSON document at `<home>/.rollcall/last_pass.json`.
//! Each save replaces the previous record; no history is kept.
//! Writes use an atomic `.tmp` + rename.

use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};
use crate::protocol::PassReport;

/// `~/.rollcall/last_pass.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    home.join(".rollcall").join("last_pass.json")
}

/// Load the last recorded pass, or `None` if no pass has been recorded yet.
pub fn load_at(home: &Path) -> Result<Option<PassReport>, SyncError> {
    let path = store_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save `report` atomically, replacing any previous record.
pub fn save_at(home: &Path, report: &PassReport) -> Result<(), SyncError> {
    let path = store_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid last-pass store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}
