//! Exchange orchestration: route search over the inventory and the
//! execution saga that composes ledger, graph, inventory and anchors
//! into one logical transaction with explicit compensation.

mod config;
mod engine;

pub use config::ExchangeConfig;
pub use engine::{AnchorChoice, ExchangeEngine, ExchangeReceipt, MatchedRoute};
