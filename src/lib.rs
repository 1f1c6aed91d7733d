//! BETBOOK — token betting ledger with admin-settled events
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod storage;
pub mod engine;
pub mod ledger;
pub mod access;
pub mod views;
pub mod api;
