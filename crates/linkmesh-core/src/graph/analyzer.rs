use crate::error::Result;
use crate::graph::{AdjacencySnapshot, BlockedReason, RouteCheck, SafetyPolicy, UNREACHABLE};
use crate::storage::{EdgeFilter, Store};
use crate::types::{BlacklistEntry, PairKey, UserId};
use chrono::Utc;
use std::sync::Arc;

/// The link-graph safety analyzer. Maintains no state of its own; every
/// verdict is computed against a snapshot of the stored edge set.
pub struct LinkGraph<S: Store> {
    store: Arc<S>,
    policy: SafetyPolicy,
}

impl<S: Store> LinkGraph<S> {
    pub fn new(store: Arc<S>, policy: SafetyPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// One storage round trip; validate batches of candidates against
    /// the result rather than re-reading per candidate.
    pub fn snapshot(&self) -> Result<AdjacencySnapshot> {
        let edges = self.store.list_edges(EdgeFilter::new())?;
        Ok(AdjacencySnapshot::build(&edges))
    }

    /// Convenience single-route validation; builds its own snapshot.
    pub fn validate_route(&self, source: UserId, target: UserId) -> Result<RouteCheck> {
        let snapshot = self.snapshot()?;
        self.validate_route_with(&snapshot, source, target)
    }

    /// Evaluate the safety rules in order; the first violation wins.
    ///
    /// 1. blacklist cool-down
    /// 2. direct reciprocal link (either direction)
    /// 3. hop distance below minimum (unreachable passes)
    /// 4. per-pair lifetime connection cap
    /// 5. length-2 loop through an intermediary
    /// 6. host's daily link velocity
    pub fn validate_route_with(
        &self,
        snapshot: &AdjacencySnapshot,
        source: UserId,
        target: UserId,
    ) -> Result<RouteCheck> {
        if source == target {
            return Ok(RouteCheck::blocked(0, BlockedReason::SelfRoute));
        }

        let pair = PairKey::new(source, target);

        if let Some(entry) = self.store.get_blacklist(pair)? {
            if !entry.is_expired(Utc::now()) {
                return Ok(RouteCheck::blocked(
                    UNREACHABLE,
                    BlockedReason::Blacklisted {
                        expires_at: entry.expires_at,
                    },
                ));
            }
        }

        if snapshot.has_live_edge(source, target) || snapshot.has_live_edge(target, source) {
            return Ok(RouteCheck::blocked(1, BlockedReason::ReciprocalLink));
        }

        let hop_distance = snapshot.hop_distance(source, target, self.policy.max_search_depth);
        if hop_distance > 0 && hop_distance < self.policy.min_hop_distance {
            return Ok(RouteCheck::blocked(
                hop_distance,
                BlockedReason::HopDistanceTooShort {
                    distance: hop_distance,
                    minimum: self.policy.min_hop_distance,
                },
            ));
        }

        let pair_count = snapshot.pair_count(pair);
        if pair_count >= self.policy.max_connections_per_pair {
            return Ok(RouteCheck::blocked(
                hop_distance,
                BlockedReason::ConnectionCapReached {
                    count: pair_count,
                    cap: self.policy.max_connections_per_pair,
                },
            ));
        }

        // A removed link doesn't erase its footprint: intermediaries are
        // drawn from every edge ever created, not just live ones.
        for &via in snapshot.incoming_sources(source) {
            if via != target && snapshot.has_any_edge(via, target) {
                return Ok(RouteCheck::blocked(
                    hop_distance,
                    BlockedReason::ShortLoop { via },
                ));
            }
        }

        let today = snapshot.links_created_today(source);
        if today >= self.policy.max_new_links_per_day {
            return Ok(RouteCheck::blocked(
                hop_distance,
                BlockedReason::VelocityExceeded {
                    today,
                    cap: self.policy.max_new_links_per_day,
                },
            ));
        }

        Ok(RouteCheck::valid(hop_distance))
    }

    /// Put a pair on cool-down for the configured TTL.
    pub fn blacklist_pair(
        &self,
        a: UserId,
        b: UserId,
        reason: impl Into<String>,
    ) -> Result<BlacklistEntry> {
        let entry = BlacklistEntry::new(PairKey::new(a, b), reason, self.policy.blacklist_ttl_days);
        self.store.put_blacklist(&entry)?;
        Ok(entry)
    }

    /// Is the pair currently on cool-down?
    pub fn is_blacklisted(&self, a: UserId, b: UserId) -> Result<bool> {
        Ok(self
            .store
            .get_blacklist(PairKey::new(a, b))?
            .map(|e| !e.is_expired(Utc::now()))
            .unwrap_or(false))
    }

    /// Edges ever created between the pair.
    pub fn pair_connection_count(&self, a: UserId, b: UserId) -> Result<u32> {
        Ok(self.store.edges_between(PairKey::new(a, b))?.len() as u32)
    }
}
