//! End-to-end ledger scenarios.
//!
//! Drives the public ledger, access and view APIs the way the HTTP layer
//! does, against in-memory and on-disk snapshot stores.

mod mock_store;
mod restart;
mod scenarios;
