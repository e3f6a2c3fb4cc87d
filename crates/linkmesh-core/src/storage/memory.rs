use crate::error::{MeshError, Result};
use crate::storage::filters::{EdgeFilter, InventoryFilter, StoreStats};
use crate::storage::traits::Store;
use crate::types::{
    AnchorUsage, BlacklistEntry, DomainScore, InventoryPage, LedgerAccount, LinkEdge, LinkId,
    PageId, PairKey, Transaction, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    pages: HashMap<PageId, InventoryPage>,
    pages_by_owner_url: HashMap<(UserId, String), PageId>,
    accounts: HashMap<UserId, LedgerAccount>,
    transactions: Vec<Transaction>,
    edges: HashMap<LinkId, LinkEdge>,
    anchor_usage: Vec<AnchorUsage>,
    domain_scores: HashMap<String, DomainScore>,
    blacklist: HashMap<PairKey, BlacklistEntry>,
}

/// In-memory implementation of the storage port. Backs unit tests and
/// fully-embedded use; keeps nothing across process restarts.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    fn put_page(&self, page: &InventoryPage) -> Result<()> {
        let mut inner = self.write();
        inner
            .pages_by_owner_url
            .insert((page.owner, page.page_url.clone()), page.id);
        inner.pages.insert(page.id, page.clone());
        Ok(())
    }

    fn get_page(&self, id: PageId) -> Result<Option<InventoryPage>> {
        Ok(self.read().pages.get(&id).cloned())
    }

    fn page_by_owner_url(&self, owner: UserId, url: &str) -> Result<Option<InventoryPage>> {
        let inner = self.read();
        Ok(inner
            .pages_by_owner_url
            .get(&(owner, url.to_string()))
            .and_then(|id| inner.pages.get(id))
            .cloned())
    }

    fn list_pages(&self, filter: InventoryFilter) -> Result<Vec<InventoryPage>> {
        let inner = self.read();
        let mut out: Vec<InventoryPage> = inner
            .pages
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn reserve_outbound_slot(&self, id: PageId) -> Result<bool> {
        let mut inner = self.write();
        let page = inner.pages.get_mut(&id).ok_or(MeshError::PageNotFound(id))?;
        if page.current_outbound >= page.max_outbound {
            return Ok(false);
        }
        page.current_outbound += 1;
        page.updated_at = Utc::now();
        Ok(true)
    }

    fn release_outbound_slot(&self, id: PageId) -> Result<()> {
        let mut inner = self.write();
        let page = inner.pages.get_mut(&id).ok_or(MeshError::PageNotFound(id))?;
        page.current_outbound = page.current_outbound.saturating_sub(1);
        page.updated_at = Utc::now();
        Ok(())
    }

    fn get_account(&self, user: UserId) -> Result<Option<LedgerAccount>> {
        Ok(self.read().accounts.get(&user).cloned())
    }

    fn list_accounts(&self) -> Result<Vec<LedgerAccount>> {
        let mut out: Vec<LedgerAccount> = self.read().accounts.values().cloned().collect();
        out.sort_by(|a, b| a.user.cmp(&b.user));
        Ok(out)
    }

    fn commit_ledger(
        &self,
        expected_version: u64,
        account: &LedgerAccount,
        txn: &Transaction,
    ) -> Result<()> {
        let mut inner = self.write();
        let stored_version = inner.accounts.get(&account.user).map(|a| a.version).unwrap_or(0);
        if stored_version != expected_version {
            return Err(MeshError::VersionConflict(account.user));
        }
        inner.accounts.insert(account.user, account.clone());
        inner.transactions.push(txn.clone());
        Ok(())
    }

    fn transactions_for(&self, user: UserId) -> Result<Vec<Transaction>> {
        let mut out: Vec<Transaction> = self
            .read()
            .transactions
            .iter()
            .filter(|t| t.user == user)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn put_edge(&self, edge: &LinkEdge) -> Result<()> {
        self.write().edges.insert(edge.id, edge.clone());
        Ok(())
    }

    fn get_edge(&self, id: LinkId) -> Result<Option<LinkEdge>> {
        Ok(self.read().edges.get(&id).cloned())
    }

    fn edges_from(&self, user: UserId) -> Result<Vec<LinkEdge>> {
        self.list_edges(EdgeFilter::new().with_source(user))
    }

    fn edges_to(&self, user: UserId) -> Result<Vec<LinkEdge>> {
        self.list_edges(EdgeFilter::new().with_target(user))
    }

    fn edges_between(&self, pair: PairKey) -> Result<Vec<LinkEdge>> {
        let mut out: Vec<LinkEdge> = self
            .read()
            .edges
            .values()
            .filter(|e| PairKey::new(e.source, e.target) == pair)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn list_edges(&self, filter: EdgeFilter) -> Result<Vec<LinkEdge>> {
        let mut out: Vec<LinkEdge> = self
            .read()
            .edges
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn append_anchor_usage(&self, usage: &AnchorUsage) -> Result<()> {
        self.write().anchor_usage.push(usage.clone());
        Ok(())
    }

    fn anchor_usage_for(
        &self,
        user: UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AnchorUsage>> {
        let mut out: Vec<AnchorUsage> = self
            .read()
            .anchor_usage
            .iter()
            .filter(|u| u.user == user)
            .filter(|u| since.map(|s| u.created_at >= s).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn put_domain_score(&self, score: &DomainScore) -> Result<()> {
        self.write()
            .domain_scores
            .insert(score.domain.clone(), score.clone());
        Ok(())
    }

    fn get_domain_score(&self, domain: &str) -> Result<Option<DomainScore>> {
        Ok(self.read().domain_scores.get(domain).cloned())
    }

    fn put_blacklist(&self, entry: &BlacklistEntry) -> Result<()> {
        self.write().blacklist.insert(entry.pair, entry.clone());
        Ok(())
    }

    fn get_blacklist(&self, pair: PairKey) -> Result<Option<BlacklistEntry>> {
        Ok(self.read().blacklist.get(&pair).cloned())
    }

    fn list_blacklist(&self) -> Result<Vec<BlacklistEntry>> {
        let mut out: Vec<BlacklistEntry> = self.read().blacklist.values().cloned().collect();
        out.sort_by(|a, b| a.pair.cmp(&b.pair));
        Ok(out)
    }

    fn remove_blacklist(&self, pair: PairKey) -> Result<()> {
        self.write().blacklist.remove(&pair);
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let inner = self.read();
        Ok(StoreStats {
            page_count: inner.pages.len() as u64,
            account_count: inner.accounts.len() as u64,
            transaction_count: inner.transactions.len() as u64,
            edge_count: inner.edges.len() as u64,
            anchor_usage_count: inner.anchor_usage.len() as u64,
            domain_score_count: inner.domain_scores.len() as u64,
            blacklist_count: inner.blacklist.len() as u64,
        })
    }
}
