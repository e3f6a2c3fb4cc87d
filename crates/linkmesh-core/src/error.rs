use crate::graph::BlockedReason;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, MeshError>;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Insufficient credits: need {required}, have {available}")]
    InsufficientCredits {
        required: Decimal,
        available: Decimal,
    },

    #[error("Concurrent ledger update for user {0}, retry exhausted")]
    VersionConflict(Uuid),

    #[error("Inventory page not found: {0}")]
    PageNotFound(Uuid),

    #[error("Link edge not found: {0}")]
    EdgeNotFound(Uuid),

    #[error("No outbound slot available on page {0}")]
    SlotExhausted(Uuid),

    #[error("Route blocked: {0}")]
    RouteBlocked(BlockedReason),

    #[error("Daily acquisition cap reached for tier {tier}: {cap} links/day")]
    DailyCapReached { tier: u8, cap: u32 },

    #[error("Validation error: {0}")]
    Validation(String),
}
