//! # Count Keeper
//!
//! Rule engine for a channel counting game: participants post consecutive
//! integers, one step at a time, with enough other people in between.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       COUNT KEEPER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── post.rs     - Posts and ids                             │
//! │  ├── parse.rs    - Leading number parser                     │
//! │  └── window.rs   - Recent author window                      │
//! │                                                              │
//! │  game/           - Game logic                                │
//! │  ├── rules.rs    - Post validation                           │
//! │  ├── state.rs    - Streak, record, high-score phase          │
//! │  └── recovery.rs - History replay after restart              │
//! │                                                              │
//! │  network/        - Chat platform boundary (non-deterministic)│
//! │  ├── platform.rs - ChatPlatform trait                        │
//! │  ├── memory.rs   - In-process platform                       │
//! │  ├── history.rs  - Recovery slice fetching                   │
//! │  ├── queue.rs    - FIFO event queue                          │
//! │  ├── reply.rs    - Reactions and reply text                  │
//! │  ├── session.rs  - Per-post policy, startup                  │
//! │  └── admin.rs    - Administrative commands                   │
//! │                                                              │
//! │  store.rs        - State persistence port                    │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Replay Guarantee
//!
//! Validation is a pure function of the post, the window and the current
//! number. Startup recovery rebuilds both from history and feeds them to the
//! same validator, so a restart never changes how a historical post is
//! judged.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod store;

// Re-export commonly used types
pub use crate::config::{Config, ConfigError};
pub use crate::core::post::{AuthorId, ChannelId, Post, PostId};
pub use crate::core::window::RecentAuthorWindow;
pub use crate::game::rules::{validate, ValidationResult, Violation};
pub use crate::game::state::{GameState, HighScorePhase, PersistedState};
pub use crate::network::session::{start_session, CountingHandle, CountingSession};
pub use crate::store::{JsonFileStore, MemoryStore, StateStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
