//! Game State
//!
//! Streak counter, best-ever streak and high-score phase. Every mutation is
//! followed by a best-effort save through the injected [`StateStore`]; a
//! failed save is logged and the in-memory state stays authoritative.
//!
//! Only `best` and the reset anchor are persisted. The current number is
//! rebuilt from channel history on every start.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::post::PostId;
use crate::store::StateStore;

// =============================================================================
// HIGH SCORE PHASE
// =============================================================================

/// Whether a new record should still be celebrated.
///
/// Only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum HighScorePhase {
    /// No record broken since start
    #[default]
    NoHighscore,
    /// The record was just broken (celebrated)
    FirstHighscore,
    /// Still extending the record
    SustainedHighscore,
}

impl HighScorePhase {
    /// Phase after the record grows again.
    pub fn advance(self) -> HighScorePhase {
        match self {
            HighScorePhase::NoHighscore => HighScorePhase::FirstHighscore,
            HighScorePhase::FirstHighscore | HighScorePhase::SustainedHighscore => {
                HighScorePhase::SustainedHighscore
            }
        }
    }
}

// =============================================================================
// PERSISTED FORM
// =============================================================================

/// The durable projection of [`GameState`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    /// Best streak ever reached
    pub best: u64,
    /// When the current streak started
    pub last_reset_at: Option<DateTime<Utc>>,
    /// Post that ended the previous streak
    pub last_reset_anchor: Option<PostId>,
}

impl PersistedState {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Full read-only view of the state, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Current streak
    pub current_number: u64,
    /// Best streak ever
    pub best: u64,
    /// Record celebration phase
    pub high_score_phase: HighScorePhase,
    /// When the current streak started
    pub last_reset_at: Option<DateTime<Utc>>,
    /// Post that ended the previous streak
    pub last_reset_anchor: Option<PostId>,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Long-lived streak state.
pub struct GameState {
    current_number: u64,
    best: u64,
    high_score_phase: HighScorePhase,
    last_reset_at: Option<DateTime<Utc>>,
    last_reset_anchor: Option<PostId>,
    store: Arc<dyn StateStore>,
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState")
            .field("current_number", &self.current_number)
            .field("best", &self.best)
            .field("high_score_phase", &self.high_score_phase)
            .field("last_reset_at", &self.last_reset_at)
            .field("last_reset_anchor", &self.last_reset_anchor)
            .finish()
    }
}

impl GameState {
    /// Fresh state.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::from_persisted(PersistedState::default(), store)
    }

    /// State seeded from its durable copy. The current number starts at 0
    /// until recovery sets it.
    pub fn from_persisted(persisted: PersistedState, store: Arc<dyn StateStore>) -> Self {
        Self {
            current_number: 0,
            best: persisted.best,
            high_score_phase: HighScorePhase::NoHighscore,
            last_reset_at: persisted.last_reset_at,
            last_reset_anchor: persisted.last_reset_anchor,
            store,
        }
    }

    /// Current streak.
    pub fn current_number(&self) -> u64 {
        self.current_number
    }

    /// Best streak ever.
    pub fn best(&self) -> u64 {
        self.best
    }

    /// Record celebration phase.
    pub fn high_score_phase(&self) -> HighScorePhase {
        self.high_score_phase
    }

    /// When the current streak started.
    pub fn last_reset_at(&self) -> Option<DateTime<Utc>> {
        self.last_reset_at
    }

    /// Post that ended the previous streak.
    pub fn last_reset_anchor(&self) -> Option<&PostId> {
        self.last_reset_anchor.as_ref()
    }

    /// Count one valid post.
    ///
    /// Returns true exactly when this is the first time since start that the
    /// record was broken, which is the cue to celebrate.
    pub async fn record_success(&mut self) -> bool {
        self.current_number = self.current_number.saturating_add(1);

        let mut celebrate = false;
        if self.current_number > self.best {
            self.best = self.current_number;
            celebrate = self.high_score_phase == HighScorePhase::NoHighscore;
            self.high_score_phase = self.high_score_phase.advance();
        }

        self.persist().await;
        celebrate
    }

    /// End the streak at `anchor`.
    ///
    /// Leaves `best` and the high-score phase untouched.
    pub async fn reset(&mut self, anchor: PostId) {
        self.reset_at(anchor, Utc::now()).await;
    }

    /// [`reset`](Self::reset) with an explicit timestamp.
    pub async fn reset_at(&mut self, anchor: PostId, at: DateTime<Utc>) {
        self.current_number = 0;
        self.last_reset_at = Some(at);
        self.last_reset_anchor = Some(anchor);
        self.persist().await;
    }

    /// Administrative: set the current number. Raises `best` if exceeded.
    pub async fn override_current(&mut self, number: u64) {
        self.current_number = number;
        if number > self.best {
            self.best = number;
        }
        self.persist().await;
    }

    /// Administrative: set the best streak verbatim.
    pub async fn override_best(&mut self, best: u64) {
        self.best = best;
        self.persist().await;
    }

    /// Administrative: move the reset anchor.
    pub async fn override_anchor(&mut self, anchor: PostId, at: DateTime<Utc>) {
        self.last_reset_anchor = Some(anchor);
        self.last_reset_at = Some(at);
        self.persist().await;
    }

    /// Set the current number without saving. Used once by startup recovery;
    /// a recovered streak above the stored record raises the record.
    pub(crate) fn restore_current(&mut self, number: u64) {
        self.current_number = number;
        self.best = self.best.max(number);
    }

    /// Durable projection.
    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            best: self.best,
            last_reset_at: self.last_reset_at,
            last_reset_anchor: self.last_reset_anchor.clone(),
        }
    }

    /// Full view of the state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current_number: self.current_number,
            best: self.best,
            high_score_phase: self.high_score_phase,
            last_reset_at: self.last_reset_at,
            last_reset_anchor: self.last_reset_anchor.clone(),
        }
    }

    /// One-line summary for the bot's status.
    pub fn status_line(&self) -> String {
        format!("Current: {} Best: {}", self.current_number, self.best)
    }

    async fn persist(&self) {
        match self.store.save(&self.to_persisted()).await {
            Ok(()) => debug!("State saved (best {})", self.best),
            Err(e) => warn!("Failed to save state, keeping in-memory copy: {}", e),
        }
    }
}
