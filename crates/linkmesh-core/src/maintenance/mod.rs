//! Periodic maintenance: pending-credit settlement, idle decay,
//! inventory re-verification and blacklist expiry. Batch passes never
//! abort on a single bad record.

mod engine;

pub use engine::{
    DecayReport, MaintenanceEngine, MaintenanceSummary, ReverifyReport, SettlementReport,
};
