//! Game Logic Module
//!
//! Rules, streak state and history replay. Deterministic apart from the
//! persistence port and the reset timestamp.
//!
//! ## Module Structure
//!
//! - `rules`: post validation
//! - `state`: streak counter, record and high-score phase
//! - `recovery`: rebuilding the streak from channel history

pub mod recovery;
pub mod rules;
pub mod state;

// Re-export key types
pub use recovery::{replay_history, BrokenPost, RecoveryOutcome};
pub use rules::{validate, ValidationResult, Violation, ViolationKind};
pub use state::{GameState, HighScorePhase, PersistedState, StateSnapshot};
