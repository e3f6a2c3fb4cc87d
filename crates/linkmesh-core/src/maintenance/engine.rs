use crate::error::{MeshError, Result};
use crate::inventory::{InventoryPool, ProbeOutcome, ReachabilityProbe};
use crate::ledger::LedgerEngine;
use crate::storage::{EdgeFilter, InventoryFilter, Store};
use crate::types::{CreditStatus, LinkId, PageId, UserId, VerificationStatus};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Outcome of one pending-credit settlement pass.
#[derive(Debug, Clone, Default)]
pub struct SettlementReport {
    /// Pending edges old enough to settle this pass.
    pub examined: usize,
    pub converted: Vec<LinkId>,
    pub clawed_back: Vec<LinkId>,
    pub errors: Vec<(LinkId, String)>,
}

/// Outcome of one network-wide decay sweep.
#[derive(Debug, Clone, Default)]
pub struct DecayReport {
    pub charged: usize,
    pub total_decayed: Decimal,
    pub errors: Vec<(UserId, String)>,
}

/// Outcome of one inventory re-verification pass.
#[derive(Debug, Clone, Default)]
pub struct ReverifyReport {
    pub verified: Vec<PageId>,
    pub rejected: Vec<PageId>,
    pub expired: Vec<PageId>,
    pub errors: Vec<(PageId, String)>,
}

/// Aggregate of a full maintenance run.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceSummary {
    pub settlement: SettlementReport,
    pub decay: DecayReport,
    pub reverify: Option<ReverifyReport>,
    pub blacklist_purged: usize,
}

/// Periodic batch jobs: settle aged pending credits, erode idle
/// balances, re-verify inventory, purge expired blacklist entries.
///
/// Every pass accumulates per-item errors and continues; one bad record
/// never aborts a batch.
pub struct MaintenanceEngine<S: Store> {
    store: Arc<S>,
    ledger: Arc<LedgerEngine<S>>,
    pool: Arc<InventoryPool<S>>,
}

impl<S: Store> MaintenanceEngine<S> {
    pub fn new(store: Arc<S>, ledger: Arc<LedgerEngine<S>>, pool: Arc<InventoryPool<S>>) -> Self {
        Self {
            store,
            ledger,
            pool,
        }
    }

    /// Settle every pending edge older than the hold window: convert if
    /// the link is still live, claw back if it died. Earned credits are
    /// never re-debited after conversion; a link that dies later only
    /// flips `is_live` via observations.
    pub fn settle_pending(&self, now: DateTime<Utc>) -> Result<SettlementReport> {
        let window = Duration::days(self.ledger.config().pending_window_days);
        let pending = self
            .store
            .list_edges(EdgeFilter::new().with_credit_status(CreditStatus::Pending))?;

        let mut report = SettlementReport::default();
        for mut edge in pending {
            if now - edge.created_at < window {
                continue;
            }
            report.examined += 1;

            let outcome = if edge.is_live {
                self.ledger
                    .convert_pending(
                        edge.source,
                        edge.credits_awarded,
                        "link survived the hold window",
                        edge.id,
                    )
                    .map(|_| CreditStatus::Awarded)
            } else {
                self.ledger
                    .clawback(
                        edge.source,
                        edge.credits_awarded,
                        "link removed inside the hold window",
                        edge.id,
                    )
                    .map(|_| CreditStatus::ClawedBack)
            };

            match outcome {
                Ok(status) => {
                    edge.credit_status = status;
                    edge.updated_at = now;
                    if let Err(e) = self.store.put_edge(&edge) {
                        // Money already moved; the edge still reads
                        // pending and would settle twice next pass.
                        log::error!(
                            "ledger/edge mismatch: edge {} settled but status write failed: {}",
                            edge.id,
                            e
                        );
                        report.errors.push((edge.id, e.to_string()));
                        continue;
                    }
                    match status {
                        CreditStatus::Awarded => report.converted.push(edge.id),
                        _ => report.clawed_back.push(edge.id),
                    }
                }
                Err(e) => {
                    log::warn!("settlement of edge {} failed: {}", edge.id, e);
                    report.errors.push((edge.id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Charge idle decay across every account.
    pub fn run_decay(&self, now: DateTime<Utc>) -> Result<DecayReport> {
        let mut report = DecayReport::default();
        for account in self.store.list_accounts()? {
            match self.ledger.apply_decay(account.user, now) {
                Ok(Some(txn)) => {
                    report.charged += 1;
                    report.total_decayed += -txn.amount;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("decay for {} failed: {}", account.user, e);
                    report.errors.push((account.user, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Re-check reachability across the active pool. Pending pages get
    /// their first verification; verified pages that stopped resolving
    /// expire; expired pages that resolve again are restored.
    pub fn reverify_inventory(&self, probe: &dyn ReachabilityProbe) -> Result<ReverifyReport> {
        let pages = self.store.list_pages(InventoryFilter::new())?;
        let mut report = ReverifyReport::default();

        for page in pages {
            match page.status {
                VerificationStatus::Pending => match self.pool.verify_page(page.id, probe) {
                    Ok(updated) => match updated.status {
                        VerificationStatus::Verified => report.verified.push(page.id),
                        _ => report.rejected.push(page.id),
                    },
                    Err(e) => report.errors.push((page.id, e.to_string())),
                },
                VerificationStatus::Verified | VerificationStatus::Expired => {
                    if let Err(e) = self.recheck(page.id, page.status, probe, &mut report) {
                        report.errors.push((page.id, e.to_string()));
                    }
                }
                VerificationStatus::Rejected => {}
            }
        }
        Ok(report)
    }

    fn recheck(
        &self,
        page_id: PageId,
        status: VerificationStatus,
        probe: &dyn ReachabilityProbe,
        report: &mut ReverifyReport,
    ) -> Result<()> {
        let mut page = self
            .store
            .get_page(page_id)?
            .ok_or(MeshError::PageNotFound(page_id))?;

        match probe.check(&page.page_url) {
            ProbeOutcome::Reachable => {
                if status == VerificationStatus::Expired {
                    page.status = VerificationStatus::Verified;
                    page.status_reason = None;
                    page.updated_at = Utc::now();
                    self.store.put_page(&page)?;
                    report.verified.push(page_id);
                }
            }
            ProbeOutcome::Unreachable(detail) => {
                if status == VerificationStatus::Verified {
                    page.status = VerificationStatus::Expired;
                    page.status_reason = Some(format!("URL unreachable: {}", detail));
                    page.updated_at = Utc::now();
                    self.store.put_page(&page)?;
                    report.expired.push(page_id);
                }
            }
        }
        Ok(())
    }

    /// Remove blacklist entries past their TTL. Expired entries already
    /// stopped blocking; this reclaims the rows.
    pub fn expire_blacklist(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut purged = 0;
        for entry in self.store.list_blacklist()? {
            if entry.is_expired(now) {
                self.store.remove_blacklist(entry.pair)?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Record an external link-checker observation on an edge. Liveness
    /// recorded here is what the next settlement pass reads.
    pub fn record_link_observation(
        &self,
        link: LinkId,
        is_live: bool,
        is_indexed: bool,
    ) -> Result<()> {
        let mut edge = self
            .store
            .get_edge(link)?
            .ok_or(MeshError::EdgeNotFound(link))?;
        edge.is_live = is_live;
        edge.is_indexed = is_indexed;
        edge.updated_at = Utc::now();
        self.store.put_edge(&edge)
    }

    /// One full maintenance run. Reverification only happens when a
    /// probe is supplied (offline deployments skip it).
    pub fn run_all(
        &self,
        probe: Option<&dyn ReachabilityProbe>,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceSummary> {
        let settlement = self.settle_pending(now)?;
        let decay = self.run_decay(now)?;
        let blacklist_purged = self.expire_blacklist(now)?;
        let reverify = match probe {
            Some(p) => Some(self.reverify_inventory(p)?),
            None => None,
        };

        log::info!(
            "maintenance: {} settled ({} converted, {} clawed back), {} accounts decayed, {} blacklist entries purged",
            settlement.examined,
            settlement.converted.len(),
            settlement.clawed_back.len(),
            decay.charged,
            blacklist_purged
        );

        Ok(MaintenanceSummary {
            settlement,
            decay,
            reverify,
            blacklist_purged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{PageSubmission, StaticProbe};
    use crate::ledger::LedgerConfig;
    use crate::scoring::ScoringConfig;
    use crate::storage::MemoryStore;
    use crate::types::{
        AnchorType, BlacklistEntry, ContentPlacement, LinkEdge, LinkType, PairKey, Tier,
        Transaction, TxnKind,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: Arc<LedgerEngine<MemoryStore>>,
        pool: Arc<InventoryPool<MemoryStore>>,
        maintenance: MaintenanceEngine<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(LedgerEngine::new(store.clone(), LedgerConfig::default()));
        let pool = Arc::new(InventoryPool::new(store.clone(), ScoringConfig::default()));
        let maintenance = MaintenanceEngine::new(store.clone(), ledger.clone(), pool.clone());
        Fixture {
            store,
            ledger,
            pool,
            maintenance,
        }
    }

    /// A pending edge with its matching pending award, aged by `days`.
    fn pending_edge(f: &Fixture, earner: UserId, amount: Decimal, days: i64) -> LinkEdge {
        let mut edge = LinkEdge::new(
            earner,
            Uuid::now_v7(),
            Uuid::now_v7(),
            "https://target.example/page",
            "target",
            AnchorType::Branded,
            999,
            amount,
        );
        edge.created_at = Utc::now() - Duration::days(days);
        f.store.put_edge(&edge).unwrap();
        f.ledger
            .award_pending(earner, amount, "link placed", edge.id)
            .unwrap();
        edge
    }

    #[test]
    fn live_edges_past_the_window_convert() {
        let f = fixture();
        let earner = Uuid::now_v7();
        let edge = pending_edge(&f, earner, dec!(15), 8);

        let report = f.maintenance.settle_pending(Utc::now()).unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.converted, vec![edge.id]);
        assert!(report.clawed_back.is_empty());
        assert!(report.errors.is_empty());

        let account = f.ledger.account(earner).unwrap();
        assert_eq!(account.balance, dec!(15));
        assert_eq!(account.pending, Decimal::ZERO);
        assert_eq!(account.lifetime_earned, dec!(15));

        let settled = f.store.get_edge(edge.id).unwrap().unwrap();
        assert_eq!(settled.credit_status, CreditStatus::Awarded);
    }

    #[test]
    fn dead_edges_past_the_window_claw_back() {
        let f = fixture();
        let earner = Uuid::now_v7();
        let edge = pending_edge(&f, earner, dec!(15), 8);
        f.maintenance
            .record_link_observation(edge.id, false, false)
            .unwrap();

        let report = f.maintenance.settle_pending(Utc::now()).unwrap();
        assert_eq!(report.clawed_back, vec![edge.id]);

        let account = f.ledger.account(earner).unwrap();
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.pending, Decimal::ZERO);
        assert_eq!(account.lifetime_earned, Decimal::ZERO);

        let settled = f.store.get_edge(edge.id).unwrap().unwrap();
        assert_eq!(settled.credit_status, CreditStatus::ClawedBack);

        let kinds: Vec<TxnKind> = f
            .ledger
            .history(earner)
            .unwrap()
            .iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds, vec![TxnKind::Pending, TxnKind::Clawback]);
    }

    #[test]
    fn young_edges_stay_pending() {
        let f = fixture();
        let earner = Uuid::now_v7();
        let edge = pending_edge(&f, earner, dec!(15), 5);

        let report = f.maintenance.settle_pending(Utc::now()).unwrap();
        assert_eq!(report.examined, 0);

        let account = f.ledger.account(earner).unwrap();
        assert_eq!(account.pending, dec!(15));
        assert_eq!(
            f.store.get_edge(edge.id).unwrap().unwrap().credit_status,
            CreditStatus::Pending
        );
    }

    #[test]
    fn mixed_batch_settles_each_edge_independently() {
        let f = fixture();
        let earner = Uuid::now_v7();
        let live = pending_edge(&f, earner, dec!(10), 9);
        let dead = pending_edge(&f, earner, dec!(7), 9);
        f.maintenance
            .record_link_observation(dead.id, false, false)
            .unwrap();

        let report = f.maintenance.settle_pending(Utc::now()).unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.converted, vec![live.id]);
        assert_eq!(report.clawed_back, vec![dead.id]);

        let account = f.ledger.account(earner).unwrap();
        assert_eq!(account.balance, dec!(10));
        assert_eq!(account.pending, Decimal::ZERO);
        assert!(f.ledger.verify(earner).unwrap());
    }

    #[test]
    fn settled_edges_do_not_settle_twice() {
        let f = fixture();
        let earner = Uuid::now_v7();
        pending_edge(&f, earner, dec!(15), 8);

        f.maintenance.settle_pending(Utc::now()).unwrap();
        let second = f.maintenance.settle_pending(Utc::now()).unwrap();
        assert_eq!(second.examined, 0);
        assert_eq!(f.ledger.account(earner).unwrap().balance, dec!(15));
    }

    #[test]
    fn decay_sweep_only_touches_idle_accounts() {
        let f = fixture();
        let idle = Uuid::now_v7();
        let active = Uuid::now_v7();
        f.ledger.award(idle, dec!(100), "seed").unwrap();
        f.ledger.award(active, dec!(100), "seed").unwrap();

        // Backdate the idle user's earn stamp by two months.
        let mut account = f.store.get_account(idle).unwrap().unwrap();
        account.last_earned_at = Some(Utc::now() - Duration::days(65));
        let expected = account.version;
        account.version += 1;
        let marker = Transaction::new(idle, TxnKind::Bonus, dec!(0.01), account.balance, "adjust");
        f.store.commit_ledger(expected, &account, &marker).unwrap();

        let report = f.maintenance.run_decay(Utc::now()).unwrap();
        assert_eq!(report.charged, 1);
        assert_eq!(report.total_decayed, dec!(10.00));
        assert_eq!(f.ledger.balance(idle).unwrap(), dec!(90.00));
        assert_eq!(f.ledger.balance(active).unwrap(), dec!(100));
    }

    fn submit_page(f: &Fixture, owner: UserId, url: &str) -> PageId {
        let report = f
            .pool
            .submit(
                owner,
                vec![PageSubmission {
                    page_url: url.to_string(),
                    domain_rating: 55,
                    trust_flow: 40,
                    traffic_estimate: 5000,
                    niche: "tech".to_string(),
                    tier: Tier::Two,
                    link_type: LinkType::Dofollow,
                    placement: ContentPlacement::Contextual,
                    max_outbound: 3,
                    age_months: Some(36),
                }],
            )
            .unwrap();
        report.submitted[0]
    }

    #[test]
    fn reverify_promotes_pending_and_expires_dead_pages() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let fresh = submit_page(&f, owner, "https://example.org/guides/rust");
        let dying = submit_page(&f, owner, "https://example.org/guides/tokio");
        f.pool.verify_page(dying, &StaticProbe::reachable()).unwrap();

        // The whole pool is unreachable this pass: the pending page gets
        // rejected, the verified one expires.
        let down = f
            .maintenance
            .reverify_inventory(&StaticProbe::unreachable("timeout"))
            .unwrap();
        assert_eq!(down.rejected, vec![fresh]);
        assert_eq!(down.expired, vec![dying]);

        let expired = f.store.get_page(dying).unwrap().unwrap();
        assert_eq!(expired.status, VerificationStatus::Expired);
        assert!(expired.status_reason.as_deref().unwrap().contains("unreachable"));

        // Back up: the expired page is restored, the rejected one stays.
        let up = f
            .maintenance
            .reverify_inventory(&StaticProbe::reachable())
            .unwrap();
        assert_eq!(up.verified, vec![dying]);
        let restored = f.store.get_page(dying).unwrap().unwrap();
        assert_eq!(restored.status, VerificationStatus::Verified);
        assert_eq!(
            f.store.get_page(fresh).unwrap().unwrap().status,
            VerificationStatus::Rejected
        );
    }

    #[test]
    fn blacklist_purge_removes_only_expired_entries() {
        let f = fixture();
        let fresh = BlacklistEntry::new(
            PairKey::new(Uuid::now_v7(), Uuid::now_v7()),
            "recent violation",
            90,
        );
        let mut stale = BlacklistEntry::new(
            PairKey::new(Uuid::now_v7(), Uuid::now_v7()),
            "old violation",
            90,
        );
        stale.expires_at = Utc::now() - Duration::days(1);
        f.store.put_blacklist(&fresh).unwrap();
        f.store.put_blacklist(&stale).unwrap();

        let purged = f.maintenance.expire_blacklist(Utc::now()).unwrap();
        assert_eq!(purged, 1);
        assert!(f.store.get_blacklist(fresh.pair).unwrap().is_some());
        assert!(f.store.get_blacklist(stale.pair).unwrap().is_none());
    }

    #[test]
    fn observations_update_edge_flags() {
        let f = fixture();
        let edge = pending_edge(&f, Uuid::now_v7(), dec!(5), 1);

        f.maintenance
            .record_link_observation(edge.id, true, true)
            .unwrap();
        let observed = f.store.get_edge(edge.id).unwrap().unwrap();
        assert!(observed.is_live);
        assert!(observed.is_indexed);

        let missing = f
            .maintenance
            .record_link_observation(Uuid::now_v7(), true, true)
            .unwrap_err();
        assert!(matches!(missing, MeshError::EdgeNotFound(_)));
    }

    #[test]
    fn run_all_aggregates_every_pass() {
        let f = fixture();
        let earner = Uuid::now_v7();
        pending_edge(&f, earner, dec!(15), 8);

        let summary = f.maintenance.run_all(None, Utc::now()).unwrap();
        assert_eq!(summary.settlement.converted.len(), 1);
        assert!(summary.reverify.is_none());

        let with_probe = f
            .maintenance
            .run_all(Some(&StaticProbe::reachable()), Utc::now())
            .unwrap();
        assert!(with_probe.reverify.is_some());
    }
}
