//! Wager processor — validates and applies a single bet.
//!
//! All checks run before any field is touched, so a rejected bet leaves
//! the state exactly as it was. Persistence is the caller's job.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::types::{ActiveBet, BetRecord, LedgerError, LedgerResult, LedgerState};

/// A request to stake `amount` on one option of an event.
#[derive(Debug, Clone)]
pub struct BetRequest {
    pub username: String,
    pub event_id: u64,
    pub option_index: usize,
    pub amount: Decimal,
}

/// Check every precondition for `req` without mutating anything.
///
/// Order matters: the first violated rule decides the error.
pub fn validate_bet(state: &LedgerState, req: &BetRequest) -> LedgerResult<()> {
    let user = state
        .user(&req.username)
        .ok_or_else(|| LedgerError::UserNotFound(req.username.clone()))?;
    let event = state
        .event(req.event_id)
        .ok_or(LedgerError::EventNotFound(req.event_id))?;
    if event.option(req.option_index).is_none() {
        return Err(LedgerError::OptionNotFound {
            event_id: req.event_id,
            index: req.option_index,
        });
    }

    if user.is_blocked {
        return Err(LedgerError::UserBlocked(user.username.clone()));
    }
    if !event.is_open() {
        return Err(LedgerError::EventClosed(event.id));
    }
    if user.active_bet_on(event.id).is_some() {
        return Err(LedgerError::DuplicateBet {
            username: user.username.clone(),
            event_id: event.id,
        });
    }
    // Stakes are whole tokens, like balances and payouts.
    if req.amount <= Decimal::ZERO || !req.amount.fract().is_zero() {
        return Err(LedgerError::InvalidAmount(req.amount));
    }
    if user.balance < req.amount {
        return Err(LedgerError::InsufficientBalance {
            needed: req.amount,
            available: user.balance,
        });
    }
    Ok(())
}

/// Validate and apply a bet. Returns the user's new balance.
pub fn place_bet(state: &mut LedgerState, req: &BetRequest) -> LedgerResult<Decimal> {
    if let Err(e) = validate_bet(state, req) {
        warn!(
            user = %req.username,
            event_id = req.event_id,
            option = req.option_index,
            amount = %req.amount,
            error = %e,
            "Bet rejected"
        );
        return Err(e);
    }

    let placed_at = Utc::now();

    // Both lookups succeeded in validate_bet.
    let event = state
        .event_mut(req.event_id)
        .ok_or(LedgerError::EventNotFound(req.event_id))?;
    let option = event
        .options
        .get_mut(req.option_index)
        .ok_or(LedgerError::OptionNotFound {
            event_id: req.event_id,
            index: req.option_index,
        })?;
    option.total_staked += req.amount;
    option.bets.push(BetRecord {
        username: req.username.clone(),
        amount: req.amount,
        placed_at,
        outcome: None,
    });

    let user = state
        .user_mut(&req.username)
        .ok_or_else(|| LedgerError::UserNotFound(req.username.clone()))?;
    user.balance -= req.amount;
    user.active_bets.push(ActiveBet {
        event_id: req.event_id,
        option_index: req.option_index,
        amount: req.amount,
        placed_at,
    });

    debug!(
        user = %user.username,
        event_id = req.event_id,
        option = req.option_index,
        amount = %req.amount,
        balance = %user.balance,
        "Bet applied"
    );

    Ok(user.balance)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
