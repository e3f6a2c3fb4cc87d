use crate::anchor::{AnchorAllocator, AnchorConfig, AnchorPick};
use crate::error::Result;
use crate::exchange::{
    AnchorChoice, ExchangeConfig, ExchangeEngine, ExchangeReceipt, MatchedRoute,
};
use crate::graph::{cluster_risk, detect_patterns, LinkGraph, PatternReport, RouteCheck, SafetyPolicy};
use crate::inventory::{InventoryPool, PageSubmission, ReachabilityProbe, SubmissionReport};
use crate::ledger::{LedgerConfig, LedgerEngine};
use crate::maintenance::{MaintenanceEngine, MaintenanceSummary};
use crate::scoring::ScoringConfig;
use crate::storage::{InventoryFilter, MemoryStore, RedbStore, Store, StoreStats};
use crate::types::{
    Channel, InventoryPage, LedgerAccount, LinkId, PageId, Tier, Transaction, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;

/// Config for embedded use: one struct aggregating every engine's knobs.
#[derive(Debug, Clone, Default)]
pub struct MeshConfig {
    pub scoring: ScoringConfig,
    pub anchors: AnchorConfig,
    pub safety: SafetyPolicy,
    pub ledger: LedgerConfig,
    pub exchange: ExchangeConfig,

    /// Seed for anchor tie-breaking. None draws from entropy; tests pin
    /// a seed for determinism.
    pub rng_seed: Option<u64>,
}

impl MeshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.anchors.validate()?;
        self.safety.validate()?;
        self.ledger.validate()?;
        self.exchange.validate()?;
        Ok(())
    }
}

/// Result of auditing one user's books against the transaction log.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditReport {
    pub user: UserId,

    /// Balance reconstructed from the log alone.
    pub replayed: Decimal,

    /// Balance the account row projects.
    pub projected: Decimal,

    pub consistent: bool,
}

/// High-level, embedded exchange API. No server required.
///
/// # Example
/// ```rust,no_run
/// use linkmesh_core::{LinkMesh, MeshConfig, InventoryFilter};
/// use uuid::Uuid;
///
/// let mesh = LinkMesh::open("./mesh.redb", MeshConfig::default()).unwrap();
/// let requester = Uuid::now_v7();
/// let routes = mesh.find_routes(requester, InventoryFilter::new()).unwrap();
/// ```
pub struct LinkMesh<S: Store = RedbStore> {
    store: Arc<S>,
    ledger: Arc<LedgerEngine<S>>,
    graph: Arc<LinkGraph<S>>,
    pool: Arc<InventoryPool<S>>,
    anchors: Arc<AnchorAllocator<S>>,
    exchange: ExchangeEngine<S>,
    maintenance: MaintenanceEngine<S>,
}

impl LinkMesh<RedbStore> {
    /// Open (or create) a durable exchange database at the given path.
    pub fn open(path: impl AsRef<Path>, config: MeshConfig) -> Result<Self> {
        Self::with_store(Arc::new(RedbStore::open(path)?), config)
    }
}

impl LinkMesh<MemoryStore> {
    /// Fully in-memory instance; nothing survives the process.
    pub fn in_memory(config: MeshConfig) -> Result<Self> {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }
}

impl<S: Store> LinkMesh<S> {
    /// Wire every engine over a caller-provided store.
    pub fn with_store(store: Arc<S>, config: MeshConfig) -> Result<Self> {
        config.validate()?;

        let ledger = Arc::new(LedgerEngine::new(store.clone(), config.ledger.clone()));
        let graph = Arc::new(LinkGraph::new(store.clone(), config.safety.clone()));
        let pool = Arc::new(InventoryPool::new(store.clone(), config.scoring.clone()));
        let anchors = Arc::new(match config.rng_seed {
            Some(seed) => AnchorAllocator::with_seed(store.clone(), config.anchors.clone(), seed),
            None => AnchorAllocator::new(store.clone(), config.anchors.clone()),
        });
        let exchange = ExchangeEngine::new(
            store.clone(),
            config.exchange.clone(),
            ledger.clone(),
            graph.clone(),
            pool.clone(),
            anchors.clone(),
        );
        let maintenance = MaintenanceEngine::new(store.clone(), ledger.clone(), pool.clone());

        Ok(Self {
            store,
            ledger,
            graph,
            pool,
            anchors,
            exchange,
            maintenance,
        })
    }

    // --- Inventory ---

    /// Validate, score, price and upsert a batch of offered pages.
    pub fn submit_inventory(
        &self,
        owner: UserId,
        pages: Vec<PageSubmission>,
    ) -> Result<SubmissionReport> {
        self.pool.submit(owner, pages)
    }

    /// Reachability check for a submitted page.
    pub fn verify_page(&self, page: PageId, probe: &dyn ReachabilityProbe) -> Result<InventoryPage> {
        self.pool.verify_page(page, probe)
    }

    /// Record an indexation observation and reprice the page.
    pub fn mark_page_indexed(&self, page: PageId, indexed: bool) -> Result<InventoryPage> {
        self.pool.mark_indexed(page, indexed)
    }

    /// Routable inventory visible to a requester.
    pub fn available_inventory(
        &self,
        requester: UserId,
        filter: InventoryFilter,
    ) -> Result<Vec<InventoryPage>> {
        self.pool.available(requester, filter)
    }

    // --- Exchange ---

    /// Ranked, validated route candidates for a requester.
    pub fn find_routes(
        &self,
        requester: UserId,
        filter: InventoryFilter,
    ) -> Result<Vec<MatchedRoute>> {
        self.exchange.find_routes(requester, filter)
    }

    /// Execute one exchange against a chosen route.
    pub fn execute_exchange(
        &self,
        requester: UserId,
        page: PageId,
        target_url: &str,
        anchor: AnchorChoice,
    ) -> Result<ExchangeReceipt> {
        self.exchange.execute(requester, page, target_url, anchor)
    }

    /// Run the safety rules for a prospective source → target route.
    pub fn validate_route(&self, source: UserId, target: UserId) -> Result<RouteCheck> {
        self.graph.validate_route(source, target)
    }

    /// Allocate an anchor outside the exchange flow (distribution use).
    pub fn select_anchor(
        &self,
        user: UserId,
        target_url: &str,
        keyword: &str,
        site_name: &str,
        tier: Tier,
        channel: Channel,
    ) -> Result<AnchorPick> {
        self.anchors
            .select(user, target_url, keyword, site_name, tier, channel)
    }

    // --- Ledger ---

    pub fn balance(&self, user: UserId) -> Result<Decimal> {
        self.ledger.balance(user)
    }

    pub fn account(&self, user: UserId) -> Result<LedgerAccount> {
        self.ledger.account(user)
    }

    pub fn history(&self, user: UserId) -> Result<Vec<Transaction>> {
        self.ledger.history(user)
    }

    /// Admin grant (signup credit, goodwill).
    pub fn grant_credits(
        &self,
        user: UserId,
        amount: Decimal,
        reason: &str,
    ) -> Result<LedgerAccount> {
        self.ledger.award_bonus(user, amount, reason)
    }

    /// Every account in the store.
    pub fn accounts(&self) -> Result<Vec<LedgerAccount>> {
        self.store.list_accounts()
    }

    /// Replay a user's transaction log and compare with the projection.
    pub fn audit(&self, user: UserId) -> Result<AuditReport> {
        let replayed = self.ledger.replay(user)?;
        let projected = self.ledger.account(user)?.balance;
        Ok(AuditReport {
            user,
            replayed,
            projected,
            consistent: replayed == projected,
        })
    }

    // --- Diagnostics ---

    /// Neighborhood overlap of two users, 0-100.
    pub fn cluster_risk(&self, a: UserId, b: UserId) -> Result<u8> {
        Ok(cluster_risk(&self.graph.snapshot()?, a, b))
    }

    /// Reciprocity and clustering diagnostics for one user.
    pub fn user_patterns(&self, user: UserId) -> Result<PatternReport> {
        Ok(detect_patterns(&self.graph.snapshot()?, user))
    }

    // --- Maintenance ---

    /// Record an external link-checker observation on an edge.
    pub fn record_link_observation(
        &self,
        link: LinkId,
        is_live: bool,
        is_indexed: bool,
    ) -> Result<()> {
        self.maintenance
            .record_link_observation(link, is_live, is_indexed)
    }

    /// One full maintenance run as of `now`.
    pub fn run_maintenance(
        &self,
        probe: Option<&dyn ReachabilityProbe>,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceSummary> {
        self.maintenance.run_all(probe, now)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    // --- Component access for embedders that need the full surface ---

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ledger(&self) -> &LedgerEngine<S> {
        &self.ledger
    }

    pub fn graph(&self) -> &LinkGraph<S> {
        &self.graph
    }

    pub fn inventory(&self) -> &InventoryPool<S> {
        &self.pool
    }

    pub fn exchange(&self) -> &ExchangeEngine<S> {
        &self.exchange
    }

    pub fn maintenance(&self) -> &MaintenanceEngine<S> {
        &self.maintenance
    }
}
