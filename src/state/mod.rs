//! Shared server state: clients, channels, history, and the registries
//! that tie them together.

mod channel;
mod client;
mod history;
mod matrix;

pub use channel::{BanEntry, Channel, ChannelModes, Member, MemberModes, Topic};
pub use client::{Client, UserModes};
pub use history::{History, HistoryEntry};
pub use matrix::{Matrix, ServerInfo};

/// Connection identifier, unique for the lifetime of the process.
pub type Uid = u64;

/// Maximum channels one client may join.
pub const MAX_CHANNELS: usize = 32;

/// Maximum members one channel may hold.
pub const MAX_CLIENTS: usize = 128;
