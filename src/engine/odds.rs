//! Odds engine — payout multipliers per event option.
//!
//! Fixed events report the cote chosen at creation. Dynamic events derive
//! each option's cote from its share of the total stake, minus the house
//! margin, and are recomputed on every read. Nothing here mutates state;
//! the settlement engine freezes these values when an event closes.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::OddsConfig;
use crate::types::{Event, OddsMode};

/// Dynamic cote for an option holding `stake` out of `total`.
///
/// `max(minimum_cote, floor(total / stake * (1 - margin), 2 dp))`, or the
/// default cote when the option has no stake. A ratio too large for
/// `Decimal` saturates at `Decimal::MAX`; settlement then refuses to pay it.
pub fn dynamic_cote(stake: Decimal, total: Decimal, config: &OddsConfig) -> Decimal {
    if stake <= Decimal::ZERO || total <= Decimal::ZERO {
        return config.default_cote;
    }

    let raw = total
        .checked_div(stake)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE - config.margin))
        .unwrap_or(Decimal::MAX);
    let floored = raw.round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity);
    floored.max(config.minimum_cote)
}

/// Current cote of one option.
///
/// Closed events always report their frozen cotes, whatever their mode.
pub fn live_cote(event: &Event, option_index: usize, config: &OddsConfig) -> Option<Decimal> {
    let option = event.options.get(option_index)?;

    if !event.is_open() || event.odds_mode == OddsMode::Fixed {
        return Some(option.cote);
    }

    Some(dynamic_cote(option.total_staked, event.total_staked(), config))
}

/// Current cotes of every option, in option order.
pub fn live_cotes(event: &Event, config: &OddsConfig) -> Vec<Decimal> {
    (0..event.options.len())
        .filter_map(|i| live_cote(event, i, config))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
