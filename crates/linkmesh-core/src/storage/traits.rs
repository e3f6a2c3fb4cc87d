use crate::error::Result;
use crate::storage::filters::{EdgeFilter, InventoryFilter, StoreStats};
use crate::types::{
    AnchorUsage, BlacklistEntry, DomainScore, InventoryPage, LedgerAccount, LinkEdge, LinkId,
    PageId, PairKey, Transaction, UserId,
};
use chrono::{DateTime, Utc};

/// Storage port for the exchange. One implementation per backing store;
/// every engine is generic over this trait so it can run against the
/// redb store in production and the in-memory store in tests.
pub trait Store: Send + Sync {
    // === Inventory Pages ===

    /// Store a page (insert or update).
    fn put_page(&self, page: &InventoryPage) -> Result<()>;

    /// Retrieve a page by ID.
    fn get_page(&self, id: PageId) -> Result<Option<InventoryPage>>;

    /// Look up a page by its upsert key.
    fn page_by_owner_url(&self, owner: UserId, url: &str) -> Result<Option<InventoryPage>>;

    /// List pages matching the filter.
    fn list_pages(&self, filter: InventoryFilter) -> Result<Vec<InventoryPage>>;

    /// Atomically claim one outbound slot on a page: checks
    /// `current_outbound < max_outbound` and increments in a single
    /// write transaction. Returns false when the capacity is gone.
    fn reserve_outbound_slot(&self, id: PageId) -> Result<bool>;

    /// Compensating release of a reserved slot, clamped at zero.
    fn release_outbound_slot(&self, id: PageId) -> Result<()>;

    // === Credit Ledger ===

    /// Retrieve a user's account, if one exists yet.
    fn get_account(&self, user: UserId) -> Result<Option<LedgerAccount>>;

    /// List every account (decay sweep input).
    fn list_accounts(&self) -> Result<Vec<LedgerAccount>>;

    /// Commit a ledger mutation: compare-and-swap on the stored account
    /// version, then write the account and append its transaction in the
    /// same storage transaction. `expected_version` is the version the
    /// caller read (0 for a not-yet-persisted account); returns
    /// `MeshError::VersionConflict` when another writer won the race.
    fn commit_ledger(
        &self,
        expected_version: u64,
        account: &LedgerAccount,
        txn: &Transaction,
    ) -> Result<()>;

    /// Transaction log for a user, oldest first.
    fn transactions_for(&self, user: UserId) -> Result<Vec<Transaction>>;

    // === Link Edges ===

    /// Store an edge (insert or update).
    fn put_edge(&self, edge: &LinkEdge) -> Result<()>;

    /// Retrieve an edge by ID.
    fn get_edge(&self, id: LinkId) -> Result<Option<LinkEdge>>;

    /// All edges where the user is the link host.
    fn edges_from(&self, user: UserId) -> Result<Vec<LinkEdge>>;

    /// All edges where the user is the link beneficiary.
    fn edges_to(&self, user: UserId) -> Result<Vec<LinkEdge>>;

    /// Every edge ever created between the pair, either direction.
    fn edges_between(&self, pair: PairKey) -> Result<Vec<LinkEdge>>;

    /// List edges matching the filter.
    fn list_edges(&self, filter: EdgeFilter) -> Result<Vec<LinkEdge>>;

    // === Anchor Usage Log ===

    /// Append one allocation record. Append-only, never updated.
    fn append_anchor_usage(&self, usage: &AnchorUsage) -> Result<()>;

    /// Usage rows for a user, optionally bounded to `since`, oldest first.
    fn anchor_usage_for(
        &self,
        user: UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AnchorUsage>>;

    // === Domain Score Cache ===

    /// Upsert a memoized scoring result.
    fn put_domain_score(&self, score: &DomainScore) -> Result<()>;

    /// Cached score for a domain, if any.
    fn get_domain_score(&self, domain: &str) -> Result<Option<DomainScore>>;

    // === Pair Blacklist ===

    /// Insert or replace a cool-down entry for a pair.
    fn put_blacklist(&self, entry: &BlacklistEntry) -> Result<()>;

    /// Current entry for a pair, expired or not.
    fn get_blacklist(&self, pair: PairKey) -> Result<Option<BlacklistEntry>>;

    /// Every blacklist entry (expiry sweep input).
    fn list_blacklist(&self) -> Result<Vec<BlacklistEntry>>;

    /// Remove a pair's entry.
    fn remove_blacklist(&self, pair: PairKey) -> Result<()>;

    // === Maintenance ===

    /// Record counts across the durable sets.
    fn stats(&self) -> Result<StoreStats>;
}
