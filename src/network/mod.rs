//! Network Layer
//!
//! Everything that talks to the chat platform or depends on timing.
//! Game rules live in `game/`; this layer decides when they run.

pub mod admin;
pub mod history;
pub mod memory;
pub mod platform;
pub mod queue;
pub mod reply;
pub mod session;

pub use admin::{AdminCommand, AdminError, AdminReply};
pub use history::{fetch_recovery_slice, RecoverySlice};
pub use memory::{Effect, MemoryPlatform};
pub use platform::{ChatPlatform, HistoryQuery, PlatformError};
pub use queue::{EventQueue, QueueError, TaskHandle};
pub use session::{
    start_session, CountingHandle, CountingSession, EditOutcome, PostOutcome, SessionError,
    StartupError,
};
