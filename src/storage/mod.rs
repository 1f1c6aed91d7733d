//! Persistence layer.
//!
//! The ledger saves its whole state as one snapshot after every mutation.
//! `JsonFileStore` writes that snapshot to a pretty-printed JSON file;
//! `MemoryStore` keeps it in memory for tests and embedding.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::types::LedgerState;

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "betbook_state.json";

/// Where ledger snapshots are read from and written to.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore: Send + Sync {
    /// Load the last snapshot. `None` means nothing was saved yet.
    fn load(&self) -> Result<Option<LedgerState>>;

    /// Replace the stored snapshot with `state`.
    fn save(&self, state: &LedgerState) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Snapshot store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<LedgerState>> {
        load_state(&self.path)
    }

    fn save(&self, state: &LedgerState) -> Result<()> {
        save_state(state, &self.path)
    }
}

/// Save ledger state to a JSON file.
pub fn save_state(state: &LedgerState, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .context("Failed to serialise ledger state")?;

    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write state to {}", path.display()))?;

    debug!(
        path = %path.display(),
        users = state.users.len(),
        events = state.events.len(),
        "State saved"
    );
    Ok(())
}

/// Load ledger state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: &Path) -> Result<Option<LedgerState>> {
    if !path.exists() {
        info!(path = %path.display(), "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state from {}", path.display()))?;

    let state: LedgerState = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse state from {}", path.display()))?;

    info!(
        path = %path.display(),
        users = state.users.len(),
        events = state.events.len(),
        next_event_id = state.next_event_id,
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete state file {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Snapshot store that keeps the latest snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<LedgerState>>,
    saves: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_state(state: LedgerState) -> Self {
        Self {
            snapshot: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> u64 {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }

    /// Copy of the last saved snapshot.
    pub fn snapshot(&self) -> Option<LedgerState> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<LedgerState>> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, state: &LedgerState) -> Result<()> {
        *self
            .snapshot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))? = Some(state.clone());
        *self
            .saves
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))? += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
