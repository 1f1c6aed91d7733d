//! Read-only projections handed to the presentation layer.
//!
//! Live odds for open events are computed here, lazily, from the odds
//! engine. Nothing in this module mutates the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::engine::{odds, settlement};
use crate::ledger::Ledger;
use crate::types::{Event, EventStatus, LedgerError, LedgerResult, OddsMode, User};

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub index: usize,
    pub label: String,
    pub cote: Decimal,
    pub total_staked: Decimal,
    pub bet_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    pub id: u64,
    pub title: String,
    pub status: EventStatus,
    pub odds_mode: OddsMode,
    pub options: Vec<OptionView>,
    pub total_staked: Decimal,
    pub winning_option: Option<usize>,
    pub payout_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveBetView {
    pub event_id: u64,
    pub event_title: String,
    pub option_index: usize,
    pub option_label: String,
    pub amount: Decimal,
    /// Payout if the option won at the current odds; `None` when out of
    /// range.
    pub potential_payout: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub username: String,
    pub balance: Decimal,
    pub is_admin: bool,
    pub is_blocked: bool,
    pub active_bets: Vec<ActiveBetView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub balance: Decimal,
}

/// One bet in a user's history, open or settled.
#[derive(Debug, Clone, Serialize)]
pub struct BetHistoryEntry {
    pub event_id: u64,
    pub event_title: String,
    pub option_label: String,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
    pub is_winner: Option<bool>,
    pub winnings: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub balance: Decimal,
    pub is_admin: bool,
    pub is_blocked: bool,
    pub bets: Vec<BetHistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettledOutcomeView {
    pub username: String,
    pub option_label: String,
    pub stake: Decimal,
    pub is_winner: bool,
    pub winnings: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementView {
    pub event_id: u64,
    pub title: String,
    pub winning_label: String,
    pub payout_rate: Decimal,
    pub closed_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<SettledOutcomeView>,
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

pub fn event_view(ledger: &Ledger, event: &Event) -> EventView {
    let cotes = odds::live_cotes(event, ledger.odds_config());
    EventView {
        id: event.id,
        title: event.title.clone(),
        status: event.status,
        odds_mode: event.odds_mode,
        options: event
            .options
            .iter()
            .zip(cotes)
            .enumerate()
            .map(|(index, (o, cote))| OptionView {
                index,
                label: o.label.clone(),
                cote,
                total_staked: o.total_staked,
                bet_count: o.bets.len(),
            })
            .collect(),
        total_staked: event.total_staked(),
        winning_option: event.winning_option,
        payout_rate: event.payout_rate,
        created_at: event.created_at,
        closed_at: event.closed_at,
    }
}

/// Open events with live odds, as shown to bettors.
pub fn open_events(ledger: &Ledger) -> Vec<EventView> {
    ledger.open_events().map(|e| event_view(ledger, e)).collect()
}

/// Every event, open or closed, for administrators.
pub fn all_events(ledger: &Ledger) -> Vec<EventView> {
    ledger.events().iter().map(|e| event_view(ledger, e)).collect()
}

pub fn account(ledger: &Ledger, username: &str) -> LedgerResult<AccountView> {
    let user = ledger
        .find_user(username)
        .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))?;

    let active_bets = user
        .active_bets
        .iter()
        .filter_map(|bet| {
            let event = ledger.find_event(bet.event_id)?;
            let label = event.option(bet.option_index)?.label.clone();
            let cote = odds::live_cote(event, bet.option_index, ledger.odds_config())?;
            Some(ActiveBetView {
                event_id: event.id,
                event_title: event.title.clone(),
                option_index: bet.option_index,
                option_label: label,
                amount: bet.amount,
                potential_payout: settlement::payout(bet.amount, cote),
            })
        })
        .collect();

    Ok(AccountView {
        username: user.username.clone(),
        balance: user.balance,
        is_admin: user.is_admin,
        is_blocked: user.is_blocked,
        active_bets,
    })
}

pub fn leaderboard(ledger: &Ledger, n: usize) -> Vec<LeaderboardEntry> {
    ledger
        .leaderboard(n)
        .into_iter()
        .enumerate()
        .map(|(i, u)| LeaderboardEntry {
            rank: i + 1,
            username: u.username.clone(),
            balance: u.balance,
        })
        .collect()
}

fn bet_history(ledger: &Ledger, user: &User) -> Vec<BetHistoryEntry> {
    let mut bets: Vec<BetHistoryEntry> = ledger
        .events()
        .iter()
        .flat_map(|event| {
            event.options.iter().flat_map(move |option| {
                option
                    .bets
                    .iter()
                    .filter(move |r| r.username == user.username)
                    .map(move |r| BetHistoryEntry {
                        event_id: event.id,
                        event_title: event.title.clone(),
                        option_label: option.label.clone(),
                        amount: r.amount,
                        placed_at: r.placed_at,
                        is_winner: r.outcome.map(|o| o.is_winner),
                        winnings: r.outcome.map(|o| o.winnings),
                    })
            })
        })
        .collect();
    bets.sort_by_key(|b| b.placed_at);
    bets
}

/// Every user with their full bet history, for administrators.
pub fn users_with_history(ledger: &Ledger) -> Vec<UserSummary> {
    ledger
        .users()
        .iter()
        .map(|u| UserSummary {
            username: u.username.clone(),
            balance: u.balance,
            is_admin: u.is_admin,
            is_blocked: u.is_blocked,
            bets: bet_history(ledger, u),
        })
        .collect()
}

/// Closed events with the per-user outcome of every bet.
pub fn settlement_history(ledger: &Ledger) -> Vec<SettlementView> {
    ledger
        .closed_events()
        .map(|event| SettlementView {
            event_id: event.id,
            title: event.title.clone(),
            winning_label: event.winning_label().unwrap_or_default().to_string(),
            payout_rate: event.payout_rate.unwrap_or_default(),
            closed_at: event.closed_at,
            outcomes: event
                .options
                .iter()
                .flat_map(|option| {
                    option.bets.iter().filter_map(move |r| {
                        r.outcome.map(|o| SettledOutcomeView {
                            username: r.username.clone(),
                            option_label: option.label.clone(),
                            stake: r.amount,
                            is_winner: o.is_winner,
                            winnings: o.winnings,
                        })
                    })
                })
                .collect(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
