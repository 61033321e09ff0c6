//! # rollcall-sync
//!
//! Table sync protocol and pass orchestration.
//!
//! Call [`sync_roster`] to push an already-built [`RosterTable`] into a
//! [`SpreadsheetHandle`], or [`pipeline::run_pass`] to snapshot a directory,
//! build the table, and sync it in one go.
//!
//! [`RosterTable`]: rollcall_core::RosterTable

pub mod error;
pub mod last_pass;
pub mod memory;
pub mod pipeline;
pub mod protocol;
pub mod sheet;
pub mod timestamp;

pub use error::SyncError;
pub use memory::{MemorySheet, MemorySheetError, SheetOp};
pub use protocol::{
    sync_roster, sync_roster_with_clock, PassReport, PassStatus, StepOutcome, StepReport, SyncStep,
};
pub use sheet::{SheetLayout, SpreadsheetHandle, StructuralEdit, ValueInput};
