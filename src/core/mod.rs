//! Core deterministic primitives.
//!
//! No I/O, no clock reads, no logging. Everything here behaves identically
//! whether it runs on live traffic or on replayed history.

pub mod parse;
pub mod post;
pub mod window;

// Re-export core types
pub use parse::{parse_leading_number, LeadingNumber};
pub use post::{AuthorId, ChannelId, Post, PostId};
pub use window::{RecentAuthorWindow, Spacing};
