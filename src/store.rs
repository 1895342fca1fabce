//! State Persistence
//!
//! Injectable port for the durable copy of the game state, with a JSON file
//! implementation for production and an in-memory one for tests and demos.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::game::state::PersistedState;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// State file is not valid JSON.
    #[error("State file is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// Store-specific failure.
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for [`PersistedState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the stored state. `Ok(None)` when nothing was ever saved.
    async fn load(&self) -> Result<Option<PersistedState>, StoreError>;

    /// Replace the stored state.
    async fn save(&self, state: &PersistedState) -> Result<(), StoreError>;
}

// =============================================================================
// JSON FILE
// =============================================================================

/// Stores the state as a small JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(PersistedState::from_json(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let json = state.to_json()?;
        // Write-then-rename so a crash mid-write never leaves a torn file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

// =============================================================================
// IN MEMORY
// =============================================================================

/// Keeps the state in memory. Counts saves; can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    state: Option<PersistedState>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `state`.
    pub fn with_state(state: PersistedState) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.state = Some(state);
        }
        store
    }

    /// Make every following save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_saves = fail;
        }
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|i| i.saves).unwrap_or(0)
    }

    /// Last saved state.
    pub fn current(&self) -> Option<PersistedState> {
        self.inner.lock().ok().and_then(|i| i.state.clone())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(inner.state.clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        if inner.fail_saves {
            return Err(StoreError::Unavailable("saves disabled".into()));
        }
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }
}
