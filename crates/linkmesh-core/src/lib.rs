//! Peer-to-peer link exchange core: users contribute pages on their own
//! sites as shared inventory, and other users spend earned credits to
//! place backlinks into that inventory, gated by graph-safety rules
//! (no reciprocal links, minimum hop distance, no tight clustering).
//!
//! The crate is the engine only. Dashboards, CMS publishing and content
//! generation are external collaborators: they feed page submissions,
//! exchange requests and link observations in, and consume ledger
//! entries, graph edges and accept/reject decisions out.

pub mod anchor;
pub mod api;
pub mod error;
pub mod exchange;
pub mod graph;
pub mod inventory;
pub mod ledger;
pub mod maintenance;
pub mod scoring;
pub mod storage;
pub mod types;

pub use api::{AuditReport, LinkMesh, MeshConfig};
pub use error::{MeshError, Result};
pub use types::*;

pub use anchor::{AnchorAllocator, AnchorConfig, AnchorPick};
pub use exchange::{AnchorChoice, ExchangeConfig, ExchangeEngine, ExchangeReceipt, MatchedRoute};
pub use graph::{
    cluster_risk, detect_patterns, AdjacencySnapshot, BlockedReason, LinkGraph, PatternReport,
    RouteCheck, SafetyPolicy, UNREACHABLE,
};
pub use inventory::{
    HttpProbe, InventoryPool, PageSubmission, ProbeOutcome, ReachabilityProbe, RejectedPage,
    StaticProbe, SubmissionReport,
};
pub use ledger::{LedgerConfig, LedgerEngine};
pub use maintenance::{
    DecayReport, MaintenanceEngine, MaintenanceSummary, ReverifyReport, SettlementReport,
};
pub use scoring::{credit_value, score_domain, score_page, DomainScorer, DomainVerdict, ScoringConfig};
pub use storage::{
    EdgeFilter, InventoryFilter, MemoryStore, RedbStore, Store, StoreStats, CURRENT_SCHEMA_VERSION,
};

#[cfg(test)]
mod tests;
