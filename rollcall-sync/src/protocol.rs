//! Table sync protocol.
//!
//! ## `sync_roster`: 4-step overwrite
//!
//! 1. Clear: delete rows 4+ and columns C+ in one structural edit.
//! 2. Header: append the role header at `C2:2` (raw, overwrite).
//! 3. Members: append the member rows at `A4` (raw, overwrite).
//! 4. Timestamp: update `B1` with the rendered stamp (user-entered).
//!
//! Steps run in order, each to completion. A failed step is logged and
//! recorded; later steps still run. Nothing is rolled back, so a pass may end
//! [`PassStatus::Partial`].

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use rollcall_core::{Cell, RosterTable};

use crate::sheet::{SheetLayout, SpreadsheetHandle, ValueInput};
use crate::timestamp::render_stamp;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// The four protocol steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    Clear,
    Header,
    Members,
    Timestamp,
}

impl SyncStep {
    pub const ALL: [SyncStep; 4] = [
        SyncStep::Clear,
        SyncStep::Header,
        SyncStep::Members,
        SyncStep::Timestamp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncStep::Clear => "clear",
            SyncStep::Header => "header",
            SyncStep::Members => "members",
            SyncStep::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single protocol step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: SyncStep,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

impl StepReport {
    pub fn applied(&self) -> bool {
        matches!(self.outcome, StepOutcome::Applied)
    }
}

/// Aggregate result of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    /// Every step applied.
    Complete,
    /// Some steps applied, some failed.
    Partial,
    /// No step applied, or the pass never reached the sheet.
    Failed,
}

impl PassStatus {
    pub fn from_steps(steps: &[StepReport]) -> Self {
        let applied = steps.iter().filter(|s| s.applied()).count();
        match applied {
            0 => PassStatus::Failed,
            n if n == steps.len() => PassStatus::Complete,
            _ => PassStatus::Partial,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PassStatus::Complete => "complete",
            PassStatus::Partial => "partial",
            PassStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that happened during one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: PassStatus,
    pub roles: usize,
    pub members: usize,
    /// Text written to the stamp cell, if the pass got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepReport>,
    /// Set when the pass stopped before the sheet was touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PassReport {
    /// A pass that never reached the sheet (e.g. the snapshot fetch failed).
    pub fn aborted(started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            status: PassStatus::Failed,
            roles: 0,
            members: 0,
            stamp: None,
            steps: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.applied())
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

// ---------------------------------------------------------------------------
// sync_roster
// ---------------------------------------------------------------------------

/// Overwrite the destination with `table` and stamp it with `now` in `zone`.
///
/// Never returns an error: every step failure is captured in the report.
pub fn sync_roster<H: SpreadsheetHandle>(
    handle: &mut H,
    layout: &SheetLayout,
    table: &RosterTable,
    now: DateTime<Utc>,
    zone: Tz,
) -> PassReport {
    sync_roster_with_clock(handle, layout, table, now, zone, || now)
}

/// Like [`sync_roster`], but the stamp reads `clock` once, right before
/// step 4, so it records when the data finished landing rather than when
/// the pass began.
pub fn sync_roster_with_clock<H, C>(
    handle: &mut H,
    layout: &SheetLayout,
    table: &RosterTable,
    started_at: DateTime<Utc>,
    zone: Tz,
    clock: C,
) -> PassReport
where
    H: SpreadsheetHandle,
    C: FnOnce() -> DateTime<Utc>,
{
    let mut steps = Vec::with_capacity(SyncStep::ALL.len());

    // Step 1: clear everything the previous pass may have left behind.
    let edit = layout.clear_edit();
    steps.push(run_step(SyncStep::Clear, || {
        handle.batch_structural_edit(&edit)
    }));

    // Step 2: role header.
    let header_range = layout.header_range();
    let header = vec![table.header_row()];
    steps.push(run_step(SyncStep::Header, || {
        handle.append_values(&header_range, &header, ValueInput::Raw)
    }));

    // Step 3: member matrix.
    let members_range = layout.members_range();
    steps.push(run_step(SyncStep::Members, || {
        handle.append_values(&members_range, &table.rows, ValueInput::Raw)
    }));

    // Step 4: stamp.
    let stamp = render_stamp(clock(), zone);
    let stamp_range = layout.stamp_range();
    let stamp_rows = vec![vec![Cell::Text(stamp.clone())]];
    steps.push(run_step(SyncStep::Timestamp, || {
        handle.update_values(&stamp_range, &stamp_rows, ValueInput::UserEntered)
    }));

    let status = PassStatus::from_steps(&steps);
    let report = PassReport {
        started_at,
        finished_at: Utc::now(),
        status,
        roles: table.role_count(),
        members: table.member_count(),
        stamp: Some(stamp),
        steps,
        error: None,
    };

    match status {
        PassStatus::Complete => tracing::info!(
            roles = report.roles,
            members = report.members,
            "roster sync complete"
        ),
        _ => tracing::warn!(
            status = %status,
            failed = report.failed_steps().count(),
            "roster sync finished with failed steps"
        ),
    }
    report
}

fn run_step<E: fmt::Display>(step: SyncStep, op: impl FnOnce() -> Result<(), E>) -> StepReport {
    let started = Instant::now();
    let result = op();
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let outcome = match result {
        Ok(()) => {
            tracing::debug!(step = %step, duration_ms, "sync step applied");
            StepOutcome::Applied
        }
        Err(err) => {
            tracing::error!(step = %step, error = %err, "sync step failed");
            StepOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    StepReport {
        step,
        outcome,
        duration_ms,
    }
}
