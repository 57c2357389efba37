//! Wire protocol support for the ember IRC daemon.
//!
//! This crate owns everything that touches raw protocol text: the line
//! parser and formatter, target classification, the RFC 1459 case folding
//! table and glob matcher, numeric reply codes, and the one-byte message
//! crypt carried over from the classic wire format.

pub mod casemap;
pub mod crypt;
pub mod message;
pub mod response;
pub mod target;
pub mod wildcard;

pub use casemap::{irc_eq, irc_to_lower};
pub use message::{Message, Prefix};
pub use response::Response;
pub use target::Target;
pub use wildcard::wild_match;

/// Maximum length of one IRC line, terminator included (RFC 1459 §2.3).
pub const MAX_LINE_LEN: usize = 512;

/// Maximum number of middle parameters in one message (RFC 1459 §2.3.1).
pub const MAX_PARAMS: usize = 15;

/// Maximum nick length accepted by this server family.
pub const MAX_NICK_LEN: usize = 16;
