//! Shared pass entrypoint used by CLI and daemon.

use chrono::Utc;
use chrono_tz::Tz;

use rollcall_core::{build_roster_table, DirectorySource, RosterTable};

use crate::protocol::{sync_roster_with_clock, PassReport};
use crate::sheet::{SheetLayout, SpreadsheetHandle};
use crate::SyncError;

/// Snapshot the directory and build this pass's roster table.
pub fn fetch_table<D: DirectorySource>(directory: &D) -> Result<RosterTable, SyncError> {
    let snapshot = directory
        .snapshot()
        .map_err(|err| SyncError::Directory(Box::new(err)))?;
    let table = build_roster_table(&snapshot);
    tracing::info!(
        roles = table.role_count(),
        members = table.member_count(),
        "roster table built"
    );
    Ok(table)
}

/// Run one full pass: snapshot → table → sheet.
///
/// This is the canonical pass entrypoint for both `rollcall sync` and the
/// daemon scheduler. It never fails; a snapshot error yields an aborted
/// report and the sheet is left untouched.
pub fn run_pass<D, H>(directory: &D, handle: &mut H, layout: &SheetLayout, zone: Tz) -> PassReport
where
    D: DirectorySource,
    H: SpreadsheetHandle,
{
    let started_at = Utc::now();
    match fetch_table(directory) {
        Ok(table) => sync_roster_with_clock(handle, layout, &table, started_at, zone, Utc::now),
        Err(err) => {
            tracing::error!(error = %err, "pass aborted before sync");
            PassReport::aborted(started_at, err.to_string())
        }
    }
}
