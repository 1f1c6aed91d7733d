//! Shared types for the BETBOOK ledger.
//!
//! These types form the data model used across all modules and are the
//! exact shape of the persisted snapshot. Engine, storage and API modules
//! depend on them without depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A registered bettor (or administrator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Opaque credential produced by access control.
    pub credential: String,
    pub balance: Decimal,
    pub is_admin: bool,
    pub is_blocked: bool,
    /// Bets on events that have not been settled yet. At most one per event.
    pub active_bets: Vec<ActiveBet>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, credential: String, balance: Decimal, is_admin: bool) -> Self {
        Self {
            username: username.to_string(),
            credential,
            balance,
            is_admin,
            is_blocked: false,
            active_bets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// The active bet this user holds on an event, if any.
    pub fn active_bet_on(&self, event_id: u64) -> Option<&ActiveBet> {
        self.active_bets.iter().find(|b| b.event_id == event_id)
    }

    /// Sum of stakes currently locked in open events.
    pub fn total_at_risk(&self) -> Decimal {
        self.active_bets.iter().map(|b| b.amount).sum()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} balance={} open_bets={}",
            self.username,
            if self.is_admin { " [admin]" } else { "" },
            self.balance,
            self.active_bets.len(),
        )?;
        if self.is_blocked {
            write!(f, " (blocked)")?;
        }
        Ok(())
    }
}

/// A stake held in a user's active list while its event is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveBet {
    pub event_id: u64,
    pub option_index: usize,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Lifecycle of an event. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Open,
    Closed,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Open => write!(f, "open"),
            EventStatus::Closed => write!(f, "closed"),
        }
    }
}

/// How an event prices its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OddsMode {
    /// Cotes are set at creation and never change.
    Fixed,
    /// Cotes follow each option's share of the total stake.
    Dynamic,
}

impl fmt::Display for OddsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OddsMode::Fixed => write!(f, "fixed"),
            OddsMode::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Parse an odds mode (case-insensitive).
impl std::str::FromStr for OddsMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(OddsMode::Fixed),
            "dynamic" | "pari-mutuel" | "parimutuel" => Ok(OddsMode::Dynamic),
            _ => Err(anyhow::anyhow!("Unknown odds mode: {s}")),
        }
    }
}

/// A multi-option event users can bet on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub title: String,
    pub options: Vec<BetOption>,
    pub status: EventStatus,
    pub odds_mode: OddsMode,
    /// Index into `options`, set once when the event closes.
    pub winning_option: Option<usize>,
    /// Cote of the winning option frozen at close time.
    pub payout_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn is_open(&self) -> bool {
        self.status == EventStatus::Open
    }

    /// Sum of all stakes across every option.
    pub fn total_staked(&self) -> Decimal {
        self.options.iter().map(|o| o.total_staked).sum()
    }

    pub fn option(&self, index: usize) -> Option<&BetOption> {
        self.options.get(index)
    }

    /// Label of the winning option once the event is settled.
    pub fn winning_label(&self) -> Option<&str> {
        self.winning_option
            .and_then(|i| self.options.get(i))
            .map(|o| o.label.as_str())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.options.iter().map(|o| o.label.as_str()).collect();
        write!(
            f,
            "#{} {} [{}] ({} odds, {}) staked={}",
            self.id,
            self.title,
            labels.join(" | "),
            self.odds_mode,
            self.status,
            self.total_staked(),
        )
    }
}

/// One selectable outcome of an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetOption {
    pub label: String,
    /// Payout multiplier. For dynamic events this is only meaningful once
    /// the event is closed; live values come from the odds engine.
    pub cote: Decimal,
    pub total_staked: Decimal,
    /// Every stake ever placed on this option, annotated at settlement.
    pub bets: Vec<BetRecord>,
}

impl BetOption {
    pub fn new(label: &str, cote: Decimal) -> Self {
        Self {
            label: label.to_string(),
            cote,
            total_staked: Decimal::ZERO,
            bets: Vec::new(),
        }
    }
}

/// Audit record of a single stake on an option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub username: String,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
    /// `None` until the event is settled.
    pub outcome: Option<BetOutcome>,
}

/// Result of a settled stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetOutcome {
    pub is_winner: bool,
    /// Full payout for winners, negative stake for losers.
    pub winnings: Decimal,
}

// ---------------------------------------------------------------------------
// Ledger state
// ---------------------------------------------------------------------------

/// The whole persisted ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    pub users: Vec<User>,
    pub events: Vec<Event>,
    pub next_event_id: u64,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            events: Vec::new(),
            next_event_id: 1,
        }
    }
}

impl LedgerState {
    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn user_mut(&mut self, username: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.username == username)
    }

    pub fn event(&self, id: u64) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn event_mut(&mut self, id: u64) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.id == id)
    }

    /// Total tokens held in balances plus stakes locked in open events.
    pub fn tokens_in_circulation(&self) -> Decimal {
        self.users.iter().map(|u| u.balance + u.total_at_risk()).sum()
    }
}

// ---------------------------------------------------------------------------
// Settlement report
// ---------------------------------------------------------------------------

/// Per-bet outcome produced while settling an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledBet {
    pub username: String,
    pub option_label: String,
    pub stake: Decimal,
    pub is_winner: bool,
    pub winnings: Decimal,
}

/// Summary of a completed settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub event_id: u64,
    pub title: String,
    pub winning_option: usize,
    pub winning_label: String,
    pub payout_rate: Decimal,
    pub outcomes: Vec<SettledBet>,
    pub total_paid_out: Decimal,
    pub total_lost: Decimal,
}

impl SettlementReport {
    pub fn winners(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_winner).count()
    }

    pub fn losers(&self) -> usize {
        self.outcomes.len() - self.winners()
    }

    /// Tokens kept by the house (negative when winners were paid more
    /// than losers staked).
    pub fn house_result(&self) -> Decimal {
        let winning_stakes: Decimal = self
            .outcomes
            .iter()
            .filter(|o| o.is_winner)
            .map(|o| o.stake)
            .sum();
        self.total_lost - (self.total_paid_out - winning_stakes)
    }
}

impl fmt::Display for SettlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event #{} '{}' won by '{}' @ {}: winners={} losers={} paid={} lost={}",
            self.event_id,
            self.title,
            self.winning_label,
            self.payout_rate,
            self.winners(),
            self.losers(),
            self.total_paid_out,
            self.total_lost,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Broad classification of ledger failures, used to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    StateConflict,
    Authorization,
    Storage,
    Internal,
}

/// Domain errors returned by ledger operations. None of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(u64),

    #[error("Option {index} not found on event {event_id}")]
    OptionNotFound { event_id: u64, index: usize },

    #[error("Invalid amount: {0} (must be a positive whole number of tokens)")]
    InvalidAmount(Decimal),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid signup: {0}")]
    InvalidSignup(String),

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    #[error("User {0} is blocked from betting")]
    UserBlocked(String),

    #[error("Betting is closed for event {0}")]
    EventClosed(u64),

    #[error("User {username} already has a bet on event {event_id}")]
    DuplicateBet { username: String, event_id: u64 },

    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Event {0} is invalid or already closed")]
    AlreadyClosed(u64),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Administrator rights required for {0}")]
    NotAdmin(String),

    #[error("Wrong admin code")]
    WrongAdminCode,

    #[error("Cannot block administrator {0}")]
    AdminTarget(String),

    #[error("Payouts for event {0} are out of range")]
    PayoutOverflow(u64),

    #[error("Storage failure")]
    Storage(String),

    #[error("Credential processing failed")]
    Credential(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::UserNotFound(_)
            | LedgerError::EventNotFound(_)
            | LedgerError::OptionNotFound { .. } => ErrorKind::NotFound,
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidEvent(_)
            | LedgerError::InvalidSignup(_)
            | LedgerError::DuplicateUsername(_) => ErrorKind::Validation,
            LedgerError::UserBlocked(_)
            | LedgerError::EventClosed(_)
            | LedgerError::DuplicateBet { .. }
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::AlreadyClosed(_)
            | LedgerError::PayoutOverflow(_) => ErrorKind::StateConflict,
            LedgerError::Unauthenticated
            | LedgerError::InvalidCredentials
            | LedgerError::NotAdmin(_)
            | LedgerError::WrongAdminCode
            | LedgerError::AdminTarget(_) => ErrorKind::Authorization,
            LedgerError::Storage(_) => ErrorKind::Storage,
            LedgerError::Credential(_) => ErrorKind::Internal,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
