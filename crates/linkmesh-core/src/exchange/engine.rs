use crate::anchor::{bare_domain, AnchorAllocator};
use crate::error::{MeshError, Result};
use crate::exchange::ExchangeConfig;
use crate::graph::LinkGraph;
use crate::inventory::InventoryPool;
use crate::ledger::LedgerEngine;
use crate::storage::{EdgeFilter, InventoryFilter, Store};
use crate::types::{
    AnchorType, Channel, InventoryPage, LinkEdge, PageId, PairKey, Tier, UserId,
    VerificationStatus,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A route candidate that survived validation, ranked for presentation.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub page: InventoryPage,

    /// Distance between the page owner and the requester at search time.
    pub hop_distance: u32,

    /// `dr×0.4 + quality×0.3 + hop×5` under the default weights. Hop
    /// distance is a safety bonus, so unconnected pairs rank first.
    pub score: f32,
}

/// How the anchor for a placement is chosen.
#[derive(Debug, Clone)]
pub enum AnchorChoice {
    /// Caller supplies the exact anchor. Still subject to the reuse cap;
    /// an overused text is substituted with the naked domain.
    Explicit { text: String, anchor_type: AnchorType },

    /// Let the allocator pick against the requester's distribution.
    Allocated { keyword: String, site_name: String },
}

/// Outcome of a successful exchange, returned so the caller can render
/// state without a second read.
#[derive(Debug, Clone)]
pub struct ExchangeReceipt {
    pub link: LinkEdge,

    /// Requester's spendable balance after the debit.
    pub payer_balance: Decimal,

    pub cost: Decimal,

    /// Set when this exchange used up the pair's connection allowance
    /// and the pair went on cool-down.
    pub pair_blacklisted: bool,
}

/// The exchange orchestrator: route search over the inventory plus the
/// execution saga that composes ledger, graph and inventory.
///
/// Execution is a saga, not a single atomic commit: every step after the
/// debit that fails issues a compensating refund, so the requester never
/// ends up debited without an edge.
pub struct ExchangeEngine<S: Store> {
    store: Arc<S>,
    config: ExchangeConfig,
    ledger: Arc<LedgerEngine<S>>,
    graph: Arc<LinkGraph<S>>,
    pool: Arc<InventoryPool<S>>,
    anchors: Arc<AnchorAllocator<S>>,
}

impl<S: Store> ExchangeEngine<S> {
    pub fn new(
        store: Arc<S>,
        config: ExchangeConfig,
        ledger: Arc<LedgerEngine<S>>,
        graph: Arc<LinkGraph<S>>,
        pool: Arc<InventoryPool<S>>,
        anchors: Arc<AnchorAllocator<S>>,
    ) -> Self {
        Self {
            store,
            config,
            ledger,
            graph,
            pool,
            anchors,
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Find routable inventory for a requester: pull candidates, validate
    /// each against one graph snapshot, rank survivors, return the top N.
    /// Blocked candidates are skipped silently; their reasons only
    /// surface on an execution attempt.
    pub fn find_routes(
        &self,
        requester: UserId,
        filter: InventoryFilter,
    ) -> Result<Vec<MatchedRoute>> {
        let candidates = self.pool.available(requester, filter)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.graph.snapshot()?;
        let mut routes = Vec::new();
        for page in candidates {
            let check = self
                .graph
                .validate_route_with(&snapshot, page.owner, requester)?;
            if !check.is_valid() {
                continue;
            }
            let score = self.config.domain_rating_weight * page.domain_rating as f32
                + self.config.quality_weight * page.quality_score as f32
                + self.config.hop_distance_weight * check.hop_distance as f32;
            routes.push(MatchedRoute {
                page,
                hop_distance: check.hop_distance,
                score,
            });
        }

        routes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        routes.truncate(self.config.max_routes);
        Ok(routes)
    }

    /// Execute one exchange: place a link on `page_id` pointing at the
    /// requester's `target_url`.
    ///
    /// 1. Re-validate the route (search results go stale).
    /// 2. Enforce the requester's per-tier daily acquisition cap.
    /// 3. Resolve the anchor (usage is logged only once the edge lands).
    /// 4. Debit the requester.
    /// 5. Reserve an outbound slot; refund if the slot is gone.
    /// 6. Create the edge; release + refund on failure.
    /// 7. Record the anchor usage and award pending credits to the
    ///    page owner.
    /// 8. Blacklist the pair if this hit the connection cap.
    pub fn execute(
        &self,
        requester: UserId,
        page_id: PageId,
        target_url: &str,
        anchor: AnchorChoice,
    ) -> Result<ExchangeReceipt> {
        let page = self
            .store
            .get_page(page_id)?
            .ok_or(MeshError::PageNotFound(page_id))?;
        // Capacity is deliberately not pre-checked here; the slot
        // reservation below is the atomic check.
        if page.status != VerificationStatus::Verified || !page.is_active {
            return Err(MeshError::Validation(format!(
                "page {} is not routable",
                page_id
            )));
        }

        let check = self.graph.validate_route(page.owner, requester)?;
        if let Some(reason) = check.blocked {
            return Err(MeshError::RouteBlocked(reason));
        }

        self.check_daily_tier_cap(requester, page.tier)?;

        let (anchor_text, anchor_type) = self.resolve_anchor(requester, target_url, anchor, page.tier)?;

        let cost = page.credits_per_link;
        let after_debit = self.ledger.spend(
            requester,
            cost,
            &format!("link placement on {}", page.domain),
            Some(page.id),
        )?;

        if !self.store.reserve_outbound_slot(page.id)? {
            self.compensate(requester, cost, page.id, "outbound slot lost to a concurrent request");
            return Err(MeshError::SlotExhausted(page.id));
        }

        let edge = LinkEdge::new(
            page.owner,
            requester,
            page.id,
            target_url,
            anchor_text,
            anchor_type,
            check.hop_distance,
            cost,
        );
        if let Err(reason) = edge.validate() {
            self.release_and_compensate(requester, cost, page.id);
            return Err(MeshError::Validation(reason));
        }
        if let Err(e) = self.store.put_edge(&edge) {
            self.release_and_compensate(requester, cost, page.id);
            return Err(e);
        }

        // The edge exists and the debit stands; a failure from here on is
        // an inconsistency to repair via audit, not grounds to unwind.
        if let Err(e) = self.anchors.record(
            requester,
            target_url,
            &edge.anchor_text,
            edge.anchor_type,
            Channel::Exchange,
        ) {
            log::warn!(
                "anchor usage for edge {} not recorded, caps will undercount: {}",
                edge.id,
                e
            );
        }
        if let Err(e) = self.ledger.award_pending(
            page.owner,
            cost,
            &format!("link hosted for {}", bare_domain(target_url)),
            edge.id,
        ) {
            log::error!(
                "ledger/edge mismatch: edge {} created but pending award to {} failed: {}",
                edge.id,
                page.owner,
                e
            );
        }

        let pair = PairKey::new(page.owner, requester);
        let pair_count = self.store.edges_between(pair)?.len() as u32;
        let mut pair_blacklisted = false;
        if pair_count >= self.graph.policy().max_connections_per_pair {
            self.graph
                .blacklist_pair(page.owner, requester, "connection cap reached")?;
            pair_blacklisted = true;
        }

        Ok(ExchangeReceipt {
            link: edge,
            payer_balance: after_debit.balance,
            cost,
            pair_blacklisted,
        })
    }

    /// Links the requester acquired today into pages of this tier.
    fn check_daily_tier_cap(&self, requester: UserId, tier: Tier) -> Result<()> {
        let day_ago = Utc::now() - Duration::hours(24);
        let recent = self.store.list_edges(
            EdgeFilter::new()
                .with_target(requester)
                .created_after(day_ago),
        )?;

        let mut acquired = 0u32;
        for edge in &recent {
            if let Some(source_page) = self.store.get_page(edge.source_page)? {
                if source_page.tier == tier {
                    acquired += 1;
                }
            }
        }

        let cap = self.config.daily_cap(tier);
        if acquired >= cap {
            return Err(MeshError::DailyCapReached {
                tier: tier.as_u8(),
                cap,
            });
        }
        Ok(())
    }

    /// Resolve the anchor text and type. Nothing is persisted here: the
    /// usage row is recorded only after the edge is created, so aborted
    /// exchanges never burn the requester's anchor budget.
    fn resolve_anchor(
        &self,
        requester: UserId,
        target_url: &str,
        anchor: AnchorChoice,
        tier: Tier,
    ) -> Result<(String, AnchorType)> {
        match anchor {
            AnchorChoice::Allocated { keyword, site_name } => {
                let pick = self
                    .anchors
                    .pick(requester, target_url, &keyword, &site_name, tier)?;
                Ok((pick.text, pick.anchor_type))
            }
            AnchorChoice::Explicit { text, anchor_type } => {
                if self.anchors.check_anchor_safety(requester, &text)? {
                    Ok((text, anchor_type))
                } else {
                    Ok((bare_domain(target_url), AnchorType::Naked))
                }
            }
        }
    }

    fn release_and_compensate(&self, requester: UserId, cost: Decimal, page: PageId) {
        if let Err(e) = self.store.release_outbound_slot(page) {
            log::error!("slot release failed for page {}: {}", page, e);
        }
        self.compensate(requester, cost, page, "edge creation failed");
    }

    /// Refund a committed debit. A failure here breaks the books and has
    /// no automatic reconciliation; it is logged as critical.
    fn compensate(&self, requester: UserId, cost: Decimal, page: PageId, why: &str) {
        if let Err(e) = self
            .ledger
            .refund(requester, cost, &format!("exchange aborted: {}", why), Some(page))
        {
            log::error!(
                "ledger/edge mismatch: refund of {} to {} failed after abort ({}): {}",
                cost,
                requester,
                why,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorConfig;
    use crate::graph::{BlockedReason, SafetyPolicy, UNREACHABLE};
    use crate::inventory::{PageSubmission, StaticProbe};
    use crate::ledger::LedgerConfig;
    use crate::scoring::ScoringConfig;
    use crate::storage::MemoryStore;
    use crate::types::{AnchorUsage, ContentPlacement, LinkType, TxnKind};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: Arc<LedgerEngine<MemoryStore>>,
        graph: Arc<LinkGraph<MemoryStore>>,
        pool: Arc<InventoryPool<MemoryStore>>,
        exchange: ExchangeEngine<MemoryStore>,
    }

    fn fixture() -> Fixture {
        fixture_with(SafetyPolicy::default(), ExchangeConfig::default())
    }

    fn fixture_with(policy: SafetyPolicy, config: ExchangeConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(LedgerEngine::new(store.clone(), LedgerConfig::default()));
        let graph = Arc::new(LinkGraph::new(store.clone(), policy));
        let pool = Arc::new(InventoryPool::new(store.clone(), ScoringConfig::default()));
        let anchors = Arc::new(AnchorAllocator::with_seed(
            store.clone(),
            AnchorConfig::default(),
            11,
        ));
        let exchange = ExchangeEngine::new(
            store.clone(),
            config,
            ledger.clone(),
            graph.clone(),
            pool.clone(),
            anchors,
        );
        Fixture {
            store,
            ledger,
            graph,
            pool,
            exchange,
        }
    }

    /// Submit and verify one routable tier-2 page; price is 14.40.
    fn routable_page(f: &Fixture, owner: UserId, url: &str) -> InventoryPage {
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
        assert_eq!(report.submitted.len(), 1, "{:?}", report.rejected);
        f.pool
            .verify_page(report.submitted[0], &StaticProbe::reachable())
            .unwrap()
    }

    fn explicit(text: &str) -> AnchorChoice {
        AnchorChoice::Explicit {
            text: text.to_string(),
            anchor_type: AnchorType::Branded,
        }
    }

    #[test]
    fn happy_path_moves_credits_and_creates_the_edge() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");
        f.ledger.award_bonus(requester, dec!(50), "seed").unwrap();

        let receipt = f
            .exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap();

        assert_eq!(receipt.cost, dec!(14.40));
        assert_eq!(receipt.payer_balance, dec!(35.60));
        assert_eq!(receipt.link.source, owner);
        assert_eq!(receipt.link.target, requester);
        assert_eq!(receipt.link.hop_distance_at_creation, UNREACHABLE);
        assert!(!receipt.pair_blacklisted);

        // The owner holds the amount as pending, not balance.
        let owner_account = f.ledger.account(owner).unwrap();
        assert_eq!(owner_account.pending, dec!(14.40));
        assert_eq!(owner_account.balance, Decimal::ZERO);

        // One slot consumed, edge persisted.
        let stored = f.store.get_page(page.id).unwrap().unwrap();
        assert_eq!(stored.current_outbound, 1);
        assert!(f.store.get_edge(receipt.link.id).unwrap().is_some());
    }

    #[test]
    fn insufficient_funds_is_terminal_and_side_effect_free() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");

        let err = f
            .exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap_err();
        assert!(matches!(err, MeshError::InsufficientCredits { .. }));

        let stored = f.store.get_page(page.id).unwrap().unwrap();
        assert_eq!(stored.current_outbound, 0);
        assert!(f.store.edges_to(requester).unwrap().is_empty());
        assert_eq!(f.ledger.balance(requester).unwrap(), Decimal::ZERO);
        // No link placed, no anchor budget burned.
        assert!(f.store.anchor_usage_for(requester, None).unwrap().is_empty());
    }

    #[test]
    fn blocked_route_rejects_before_any_debit() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");
        f.ledger.award_bonus(requester, dec!(50), "seed").unwrap();

        // An existing live edge between the pair makes any further route
        // a direct reciprocal footprint.
        let mut prior = LinkEdge::new(
            requester,
            owner,
            Uuid::now_v7(),
            "https://owner.example/",
            "owner",
            AnchorType::Branded,
            UNREACHABLE,
            dec!(5),
        );
        prior.created_at = Utc::now() - Duration::days(2);
        f.store.put_edge(&prior).unwrap();

        let err = f
            .exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            MeshError::RouteBlocked(BlockedReason::ReciprocalLink)
        ));
        assert_eq!(f.ledger.balance(requester).unwrap(), dec!(50));
    }

    #[test]
    fn lost_slot_race_refunds_the_debit() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");
        f.ledger.award_bonus(requester, dec!(50), "seed").unwrap();

        // Another requester grabs the last slot between validation and
        // reservation: simulate by filling capacity after verification.
        let mut stored = f.store.get_page(page.id).unwrap().unwrap();
        stored.max_outbound = 1;
        stored.current_outbound = 1;
        f.store.put_page(&stored).unwrap();

        let err = f
            .exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap_err();
        assert!(matches!(err, MeshError::SlotExhausted(_)));

        // Debit and refund cancel out; both sit in the log.
        assert_eq!(f.ledger.balance(requester).unwrap(), dec!(50));
        let log = f.ledger.history(requester).unwrap();
        let kinds: Vec<TxnKind> = log.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TxnKind::Spent));
        assert!(kinds.contains(&TxnKind::Bonus));
        assert!(f.ledger.verify(requester).unwrap());
        assert!(f.store.anchor_usage_for(requester, None).unwrap().is_empty());
    }

    #[test]
    fn hitting_the_pair_cap_blacklists_the_pair() {
        let policy = SafetyPolicy::default().with_max_connections_per_pair(1);
        let f = fixture_with(policy, ExchangeConfig::default());
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");
        f.ledger.award_bonus(requester, dec!(50), "seed").unwrap();

        let receipt = f
            .exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap();
        assert!(receipt.pair_blacklisted);
        assert!(f.graph.is_blacklisted(owner, requester).unwrap());
    }

    #[test]
    fn daily_tier_cap_limits_acquisitions() {
        let config = ExchangeConfig::default().with_daily_caps(3, 1, 15);
        let f = fixture_with(SafetyPolicy::default(), config);
        let requester = Uuid::now_v7();
        f.ledger.award_bonus(requester, dec!(100), "seed").unwrap();

        let first = routable_page(&f, Uuid::now_v7(), "https://example.org/guides/rust");
        let second = routable_page(&f, Uuid::now_v7(), "https://example.org/guides/tokio");

        f.exchange
            .execute(
                requester,
                first.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap();

        let err = f
            .exchange
            .execute(
                requester,
                second.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap_err();
        assert!(matches!(err, MeshError::DailyCapReached { tier: 2, cap: 1 }));
    }

    #[test]
    fn find_routes_skips_blocked_and_ranks_survivors() {
        let f = fixture();
        let requester = Uuid::now_v7();
        let near_owner = Uuid::now_v7();
        let far_owner = Uuid::now_v7();

        let near = routable_page(&f, near_owner, "https://example.org/guides/rust");
        let far = routable_page(&f, far_owner, "https://example.org/guides/tokio");
        // Requester's own inventory must never come back.
        routable_page(&f, requester, "https://example.org/guides/serde");

        // A live edge requester → near_owner blocks that candidate.
        let mut prior = LinkEdge::new(
            requester,
            near_owner,
            Uuid::now_v7(),
            "https://near.example/",
            "near",
            AnchorType::Branded,
            UNREACHABLE,
            dec!(5),
        );
        prior.created_at = Utc::now() - Duration::days(2);
        f.store.put_edge(&prior).unwrap();

        let routes = f
            .exchange
            .find_routes(requester, InventoryFilter::new())
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].page.id, far.id);
        assert_eq!(routes[0].hop_distance, UNREACHABLE);
        assert_ne!(routes[0].page.id, near.id);
    }

    #[test]
    fn unconnected_routes_outrank_connected_safe_ones() {
        let policy = SafetyPolicy::default().with_min_hop_distance(2);
        let f = fixture_with(policy, ExchangeConfig::default());
        let requester = Uuid::now_v7();
        let linked_owner = Uuid::now_v7();
        let stranger = Uuid::now_v7();
        let via = Uuid::now_v7();

        let linked = routable_page(&f, linked_owner, "https://example.org/guides/rust");
        let unlinked = routable_page(&f, stranger, "https://example.org/guides/tokio");

        // requester — via — linked_owner: distance 2, valid under the
        // relaxed policy but ranked below the unconnected stranger.
        for (s, t) in [(requester, via), (via, linked_owner)] {
            let mut e = LinkEdge::new(
                s,
                t,
                Uuid::now_v7(),
                "https://x.example/",
                "x",
                AnchorType::Branded,
                UNREACHABLE,
                dec!(5),
            );
            e.created_at = Utc::now() - Duration::days(2);
            f.store.put_edge(&e).unwrap();
        }

        let routes = f
            .exchange
            .find_routes(requester, InventoryFilter::new())
            .unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].page.id, unlinked.id);
        assert_eq!(routes[1].page.id, linked.id);
        assert_eq!(routes[1].hop_distance, 2);
    }

    #[test]
    fn overused_explicit_anchor_is_substituted() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");
        f.ledger.award_bonus(requester, dec!(50), "seed").unwrap();

        for _ in 0..3 {
            let usage = AnchorUsage::new(
                requester,
                "https://requester.example/landing",
                "Requester Co",
                AnchorType::Branded,
                Channel::Exchange,
            );
            f.store.append_anchor_usage(&usage).unwrap();
        }

        let receipt = f
            .exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap();
        assert_eq!(receipt.link.anchor_text, "requester.example");
        assert_eq!(receipt.link.anchor_type, AnchorType::Naked);
    }

    #[test]
    fn execution_logs_anchor_usage() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");
        f.ledger.award_bonus(requester, dec!(50), "seed").unwrap();

        f.exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                AnchorChoice::Allocated {
                    keyword: "rust hosting".to_string(),
                    site_name: "Requester Co".to_string(),
                },
            )
            .unwrap();

        let usage = f.store.anchor_usage_for(requester, None).unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].channel, Channel::Exchange);
    }

    #[test]
    fn inactive_page_is_not_executable() {
        let f = fixture();
        let owner = Uuid::now_v7();
        let requester = Uuid::now_v7();
        let page = routable_page(&f, owner, "https://example.org/guides/rust");
        f.ledger.award_bonus(requester, dec!(50), "seed").unwrap();
        f.pool.deactivate(page.id).unwrap();

        let err = f
            .exchange
            .execute(
                requester,
                page.id,
                "https://requester.example/landing",
                explicit("Requester Co"),
            )
            .unwrap_err();
        assert!(matches!(err, MeshError::Validation(_)));
        assert_eq!(f.ledger.balance(requester).unwrap(), dec!(50));
    }
}
