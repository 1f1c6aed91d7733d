//! Ledger store — the single source of truth.
//!
//! `Ledger` owns the in-memory `LedgerState` and an injected
//! `SnapshotStore`. Every state-changing operation goes through here so a
//! snapshot is written after each successful mutation. When the write
//! fails the mutation stays applied in memory and the caller gets
//! `LedgerError::Storage`.

use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::{LedgerConfig, OddsConfig};
use crate::engine::{settlement, wager};
use crate::storage::SnapshotStore;
use crate::types::{
    BetOption, Event, EventStatus, LedgerError, LedgerResult, LedgerState, OddsMode,
    SettlementReport, User,
};

/// An option submitted when creating an event. `cote` only matters for
/// fixed-odds events.
#[derive(Debug, Clone)]
pub struct NewOption {
    pub label: String,
    pub cote: Option<Decimal>,
}

impl NewOption {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            cote: None,
        }
    }

    pub fn with_cote(label: &str, cote: Decimal) -> Self {
        Self {
            label: label.to_string(),
            cote: Some(cote),
        }
    }
}

pub struct Ledger {
    state: LedgerState,
    store: Box<dyn SnapshotStore>,
    config: LedgerConfig,
    odds: OddsConfig,
}

impl Ledger {
    /// Restore the ledger from `store`, or start from the default state.
    pub fn open(
        store: Box<dyn SnapshotStore>,
        config: LedgerConfig,
        odds: OddsConfig,
    ) -> Result<Self> {
        let state = match store.load()? {
            Some(state) => {
                info!(
                    users = state.users.len(),
                    events = state.events.len(),
                    "Resumed from saved state"
                );
                state
            }
            None => {
                info!("Fresh ledger");
                LedgerState::default()
            }
        };
        Ok(Self::with_state(state, store, config, odds))
    }

    pub fn with_state(
        state: LedgerState,
        store: Box<dyn SnapshotStore>,
        config: LedgerConfig,
        odds: OddsConfig,
    ) -> Self {
        Self {
            state,
            store,
            config,
            odds,
        }
    }

    // -- Read accessors ---------------------------------------------------

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn odds_config(&self) -> &OddsConfig {
        &self.odds
    }

    pub fn find_user(&self, username: &str) -> Option<&User> {
        self.state.user(username)
    }

    pub fn find_event(&self, id: u64) -> Option<&Event> {
        self.state.event(id)
    }

    pub fn users(&self) -> &[User] {
        &self.state.users
    }

    pub fn events(&self) -> &[Event] {
        &self.state.events
    }

    pub fn open_events(&self) -> impl Iterator<Item = &Event> {
        self.state.events.iter().filter(|e| e.is_open())
    }

    pub fn closed_events(&self) -> impl Iterator<Item = &Event> {
        self.state.events.iter().filter(|e| !e.is_open())
    }

    /// Top `n` non-admin users by balance, highest first. Ties keep
    /// signup order.
    pub fn leaderboard(&self, n: usize) -> Vec<&User> {
        let mut ranked: Vec<&User> = self.state.users.iter().filter(|u| !u.is_admin).collect();
        ranked.sort_by(|a, b| b.balance.cmp(&a.balance));
        ranked.truncate(n);
        ranked
    }

    // -- Persistence ------------------------------------------------------

    /// Write the whole state through the snapshot store.
    pub fn persist(&self) -> LedgerResult<()> {
        self.store.save(&self.state).map_err(|e| {
            error!(error = %e, "Failed to save ledger snapshot");
            LedgerError::Storage(e.to_string())
        })
    }

    // -- Mutations --------------------------------------------------------

    /// Create an account with the configured starting balance.
    pub fn register_user(
        &mut self,
        username: &str,
        credential: String,
        is_admin: bool,
    ) -> LedgerResult<&User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(LedgerError::InvalidSignup("username is required".into()));
        }
        if credential.is_empty() {
            return Err(LedgerError::InvalidSignup("password is required".into()));
        }
        if self.state.user(username).is_some() {
            warn!(user = username, "Signup rejected: username taken");
            return Err(LedgerError::DuplicateUsername(username.to_string()));
        }

        self.state.users.push(User::new(
            username,
            credential,
            self.config.starting_balance,
            is_admin,
        ));
        info!(
            user = username,
            is_admin,
            balance = %self.config.starting_balance,
            "User registered"
        );
        self.persist()?;

        self.state
            .user(username)
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }

    /// Create an open event. Returns its id.
    pub fn create_event(
        &mut self,
        title: &str,
        options: &[NewOption],
        odds_mode: Option<OddsMode>,
    ) -> LedgerResult<u64> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LedgerError::InvalidEvent("a title is required".into()));
        }
        if options.len() < 2 {
            return Err(LedgerError::InvalidEvent("at least two options are required".into()));
        }
        if options.iter().any(|o| o.label.trim().is_empty()) {
            return Err(LedgerError::InvalidEvent("option labels cannot be empty".into()));
        }
        if let Some(bad) = options.iter().find_map(|o| o.cote.filter(|c| *c <= Decimal::ZERO)) {
            return Err(LedgerError::InvalidEvent(format!("cote must be positive, got {bad}")));
        }
        let max_cote = self.odds.max_cote;
        if let Some(bad) = options.iter().find_map(|o| o.cote.filter(|c| *c > max_cote)) {
            return Err(LedgerError::InvalidEvent(format!(
                "cote must be at most {max_cote}, got {bad}"
            )));
        }

        let odds_mode = odds_mode.unwrap_or(self.odds.default_mode);
        let id = self.state.next_event_id;
        let event = Event {
            id,
            title: title.to_string(),
            options: options
                .iter()
                .map(|o| BetOption::new(o.label.trim(), o.cote.unwrap_or(self.odds.default_cote)))
                .collect(),
            status: EventStatus::Open,
            odds_mode,
            winning_option: None,
            payout_rate: None,
            created_at: Utc::now(),
            closed_at: None,
        };
        info!(event = %event, "Event created");

        self.state.events.push(event);
        self.state.next_event_id += 1;
        self.persist()?;
        Ok(id)
    }

    /// Stake `amount` on an option. Returns the new balance.
    pub fn place_bet(
        &mut self,
        username: &str,
        event_id: u64,
        option_index: usize,
        amount: Decimal,
    ) -> LedgerResult<Decimal> {
        let req = wager::BetRequest {
            username: username.to_string(),
            event_id,
            option_index,
            amount,
        };
        let balance = wager::place_bet(&mut self.state, &req)?;
        info!(
            user = username,
            event_id,
            option = option_index,
            amount = %amount,
            balance = %balance,
            "Bet placed"
        );
        self.persist()?;
        Ok(balance)
    }

    /// Close an event and distribute winnings exactly once.
    pub fn close_event(
        &mut self,
        event_id: u64,
        winning_option: usize,
    ) -> LedgerResult<SettlementReport> {
        let report = settlement::close_event(&mut self.state, event_id, winning_option, &self.odds)?;
        self.persist()?;
        Ok(report)
    }

    /// Flip a user's blocked flag. Returns the new value.
    pub fn toggle_block(&mut self, username: &str) -> LedgerResult<bool> {
        let user = self
            .state
            .user_mut(username)
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))?;
        if user.is_admin {
            warn!(user = username, "Block rejected: target is an administrator");
            return Err(LedgerError::AdminTarget(username.to_string()));
        }
        user.is_blocked = !user.is_blocked;
        let blocked = user.is_blocked;
        info!(user = username, blocked, "Block status changed");
        self.persist()?;
        Ok(blocked)
    }

    /// Grant administrator rights.
    pub fn promote(&mut self, username: &str) -> LedgerResult<()> {
        let user = self
            .state
            .user_mut(username)
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))?;
        if user.is_admin {
            return Ok(());
        }
        user.is_admin = true;
        info!(user = username, "User promoted to administrator");
        self.persist()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
