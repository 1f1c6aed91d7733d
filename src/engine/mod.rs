//! Core engine — odds, bet placement and settlement.
//!
//! Every function here works on an explicit `LedgerState` borrowed from
//! the caller. None of them persist; `Ledger` does that after a
//! successful mutation.

pub mod odds;
pub mod wager;
pub mod settlement;
