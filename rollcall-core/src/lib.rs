//! Rollcall core library: roster domain types, table builder, config.
//!
//! Public API surface:
//! - [`types`]: newtypes, snapshot and table structs
//! - [`roster`]: [`build_roster_table`]
//! - [`directory`]: [`DirectorySource`], the seam for snapshot providers
//! - [`config`]: [`Config`] loading and validation
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod directory;
pub mod error;
pub mod roster;
pub mod types;

pub use config::Config;
pub use directory::DirectorySource;
pub use error::ConfigError;
pub use roster::build_roster_table;
pub use types::{Cell, DirectorySnapshot, Member, MemberRow, RoleName, RosterTable, Username};
