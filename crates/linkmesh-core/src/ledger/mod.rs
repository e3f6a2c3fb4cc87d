//! Credit ledger: single-row balances with an append-only transaction
//! log. The log is the audit source of truth; the account row is a
//! projection kept consistent through optimistic commits.

mod config;
mod engine;

pub use config::LedgerConfig;
pub use engine::LedgerEngine;
