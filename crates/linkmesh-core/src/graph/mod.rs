//! Link-graph safety analysis: the rules that keep the exchange from
//! leaving a reciprocal/short-loop/cluster footprint. Route validation
//! runs a fixed-order rule pipeline over an adjacency snapshot built in
//! one storage read.

mod analyzer;
mod patterns;
mod snapshot;
mod types;

pub use analyzer::LinkGraph;
pub use patterns::{cluster_risk, detect_patterns, PatternReport};
pub use snapshot::AdjacencySnapshot;
pub use types::{BlockedReason, RouteCheck, SafetyPolicy, UNREACHABLE};
