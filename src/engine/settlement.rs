//! Settlement engine — closes an event and pays out winners.
//!
//! Closing is a one-way transition. Cotes are frozen at their live value
//! first, then every active bet on the event is resolved in one pass.
//! Winners are credited the full payout `round(stake * rate)`, stake
//! included; losers forfeit their stake. Persistence is the caller's job.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use crate::config::OddsConfig;
use crate::engine::odds;
use crate::types::{
    BetOption, BetOutcome, BetRecord, Event, EventStatus, LedgerError, LedgerResult, LedgerState,
    SettledBet, SettlementReport,
};

/// Full payout for a winning stake, rounded half away from zero to whole
/// tokens. `None` when the product does not fit in a `Decimal`.
pub fn payout(stake: Decimal, rate: Decimal) -> Option<Decimal> {
    stake
        .checked_mul(rate)
        .map(|p| p.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

/// How one active bet resolves, computed before anything is mutated.
struct Resolution {
    user_index: usize,
    bet_index: usize,
    is_winner: bool,
    winnings: Decimal,
    balance_after: Decimal,
}

/// Close `event_id` with `winning_option` and distribute winnings.
///
/// Every bet is resolved before the state is touched, so a failure
/// (including an out-of-range payout) leaves the event open and all
/// balances as they were.
pub fn close_event(
    state: &mut LedgerState,
    event_id: u64,
    winning_option: usize,
    odds_config: &OddsConfig,
) -> LedgerResult<SettlementReport> {
    let event = state
        .event(event_id)
        .ok_or(LedgerError::EventNotFound(event_id))?;
    if event.status == EventStatus::Closed {
        warn!(event_id, "Close rejected: event already closed");
        return Err(LedgerError::AlreadyClosed(event_id));
    }
    let not_found = LedgerError::OptionNotFound {
        event_id,
        index: winning_option,
    };
    if winning_option >= event.options.len() {
        return Err(not_found);
    }

    // Freeze odds while the event still reads as open.
    let frozen = odds::live_cotes(event, odds_config);
    let payout_rate = frozen.get(winning_option).copied().ok_or(not_found)?;
    let title = event.title.clone();
    let labels: Vec<String> = event.options.iter().map(|o| o.label.clone()).collect();

    let overflow = || {
        warn!(event_id, rate = %payout_rate, "Close rejected: payout out of range");
        LedgerError::PayoutOverflow(event_id)
    };

    let mut plan = Vec::new();
    let mut total_paid_out = Decimal::ZERO;
    let mut total_lost = Decimal::ZERO;
    for (user_index, user) in state.users.iter().enumerate() {
        let Some(bet_index) = user.active_bets.iter().position(|b| b.event_id == event_id) else {
            continue;
        };
        let bet = &user.active_bets[bet_index];
        let is_winner = bet.option_index == winning_option;
        let (winnings, balance_after) = if is_winner {
            let won = payout(bet.amount, payout_rate).ok_or_else(overflow)?;
            total_paid_out = total_paid_out.checked_add(won).ok_or_else(overflow)?;
            (won, user.balance.checked_add(won).ok_or_else(overflow)?)
        } else {
            total_lost = total_lost.checked_add(bet.amount).ok_or_else(overflow)?;
            (-bet.amount, user.balance)
        };
        plan.push(Resolution {
            user_index,
            bet_index,
            is_winner,
            winnings,
            balance_after,
        });
    }

    let event = state
        .event_mut(event_id)
        .ok_or(LedgerError::EventNotFound(event_id))?;
    for (option, cote) in event.options.iter_mut().zip(frozen) {
        option.cote = cote;
    }
    event.status = EventStatus::Closed;
    event.winning_option = Some(winning_option);
    event.payout_rate = Some(payout_rate);
    event.closed_at = Some(Utc::now());

    let mut outcomes = Vec::with_capacity(plan.len());
    for r in plan {
        let user = &mut state.users[r.user_index];
        let bet = user.active_bets.remove(r.bet_index);
        user.balance = r.balance_after;

        debug!(
            user = %user.username,
            event_id,
            stake = %bet.amount,
            is_winner = r.is_winner,
            winnings = %r.winnings,
            "Bet settled"
        );

        outcomes.push(SettledBet {
            username: user.username.clone(),
            option_label: labels.get(bet.option_index).cloned().unwrap_or_default(),
            stake: bet.amount,
            is_winner: r.is_winner,
            winnings: r.winnings,
        });

        // Annotate the audit record kept on the option.
        let outcome = BetOutcome {
            is_winner: r.is_winner,
            winnings: r.winnings,
        };
        if let Some(option) = option_mut(&mut state.events, event_id, bet.option_index) {
            match option
                .bets
                .iter_mut()
                .find(|rec| rec.username == user.username && rec.outcome.is_none())
            {
                Some(record) => record.outcome = Some(outcome),
                None => option.bets.push(BetRecord {
                    username: user.username.clone(),
                    amount: bet.amount,
                    placed_at: bet.placed_at,
                    outcome: Some(outcome),
                }),
            }
        }
    }

    let report = SettlementReport {
        event_id,
        title,
        winning_label: labels.get(winning_option).cloned().unwrap_or_default(),
        winning_option,
        payout_rate,
        outcomes,
        total_paid_out,
        total_lost,
    };

    info!(
        event_id,
        winner = %report.winning_label,
        rate = %payout_rate,
        winners = report.winners(),
        losers = report.losers(),
        paid = %report.total_paid_out,
        lost = %report.total_lost,
        house = %report.house_result(),
        "Event settled"
    );

    Ok(report)
}

fn option_mut(events: &mut [Event], event_id: u64, index: usize) -> Option<&mut BetOption> {
    events
        .iter_mut()
        .find(|e| e.id == event_id)
        .and_then(|e| e.options.get_mut(index))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
