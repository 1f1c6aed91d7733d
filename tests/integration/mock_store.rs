//! Controllable snapshot store for integration testing.
//!
//! Keeps snapshots in memory and can be told to fail every save, so tests
//! can check what the ledger does when persistence breaks.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use betbook::config::{LedgerConfig, OddsConfig};
use betbook::ledger::Ledger;
use betbook::storage::SnapshotStore;
use betbook::types::LedgerState;

/// Handle shared between a test and the ledger under test.
#[derive(Clone, Default)]
pub struct MockStore {
    snapshot: Arc<Mutex<Option<LedgerState>>>,
    saves: Arc<Mutex<u64>>,
    /// If set, every save returns this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force all subsequent saves to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn saves(&self) -> u64 {
        *self.saves.lock().unwrap()
    }

    pub fn last_snapshot(&self) -> Option<LedgerState> {
        self.snapshot.lock().unwrap().clone()
    }

    /// A ledger writing through a clone of this handle.
    pub fn ledger(&self) -> Ledger {
        Ledger::open(
            Box::new(self.clone()),
            LedgerConfig::default(),
            OddsConfig::default(),
        )
        .unwrap()
    }
}

impl SnapshotStore for MockStore {
    fn load(&self) -> Result<Option<LedgerState>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn save(&self, state: &LedgerState) -> Result<()> {
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{msg}"));
        }
        *self.snapshot.lock().unwrap() = Some(state.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}
