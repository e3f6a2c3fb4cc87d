//! Risk/quality scoring: deterministic trust verdicts for domains and
//! pages, plus the credit price of a placed link. Every applied factor is
//! recorded so a verdict can be explained and reproduced.

mod cache;
mod config;
mod credit;
mod domain;

pub use cache::DomainScorer;
pub use config::ScoringConfig;
pub use credit::credit_value;
pub use domain::{score_domain, score_page, DomainVerdict, PageVerdict};
