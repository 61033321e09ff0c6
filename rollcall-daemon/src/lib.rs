//! Scheduler daemon: periodic passes, an in-flight guard, and a Unix
//! control socket.
//!
//! ```text
//! ~/.rollcall/daemon.sock    {"cmd":"status"|"sync"|"stop"}
//! ~/.rollcall/last_pass.json most recent PassReport
//! ```

mod context;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use context::{PassRunner, SyncContext};
pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{
    init_tracing, run, start_blocking, PassOutcome, PassState, SKIPPED_ALREADY_RUNNING,
};
