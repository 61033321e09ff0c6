//! Discord group directory over the REST API.
//!
//! [`DiscordClient`] implements [`rollcall_core::DirectorySource`] for one
//! guild. It needs a bot token with the Server Members privileged intent
//! enabled, otherwise the member listing is refused.

mod client;
mod error;

pub use client::{DiscordClient, ReadyInfo, DISCORD_API, MEMBER_PAGE_LIMIT};
pub use error::DiscordError;
