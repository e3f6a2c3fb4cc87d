use crate::types::{CreditStatus, Tier, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Filter criteria for querying inventory pages
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    /// Only pages owned by this user.
    pub owner: Option<UserId>,

    /// Exclude pages owned by this user (route search never offers the
    /// requester their own inventory).
    pub exclude_owner: Option<UserId>,

    /// Only verified + active pages with free outbound capacity.
    pub routable_only: bool,

    pub min_domain_rating: Option<u32>,
    pub max_risk_score: Option<u8>,
    pub niche: Option<String>,
    pub tier: Option<Tier>,

    /// Include soft-deleted pages in results.
    pub include_inactive: bool,

    pub limit: Option<usize>,
}

impl InventoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn excluding_owner(mut self, owner: UserId) -> Self {
        self.exclude_owner = Some(owner);
        self
    }

    pub fn routable_only(mut self) -> Self {
        self.routable_only = true;
        self
    }

    pub fn with_min_domain_rating(mut self, dr: u32) -> Self {
        self.min_domain_rating = Some(dr);
        self
    }

    pub fn with_max_risk_score(mut self, risk: u8) -> Self {
        self.max_risk_score = Some(risk);
        self
    }

    pub fn with_niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = Some(niche.into());
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply the non-index parts of the filter to a page.
    pub fn matches(&self, page: &crate::types::InventoryPage) -> bool {
        if let Some(owner) = self.owner {
            if page.owner != owner {
                return false;
            }
        }
        if let Some(excluded) = self.exclude_owner {
            if page.owner == excluded {
                return false;
            }
        }
        if !self.include_inactive && !page.is_active {
            return false;
        }
        if self.routable_only && !page.is_routable() {
            return false;
        }
        if let Some(min_dr) = self.min_domain_rating {
            if page.domain_rating < min_dr {
                return false;
            }
        }
        if let Some(max_risk) = self.max_risk_score {
            if page.risk_score > max_risk {
                return false;
            }
        }
        if let Some(ref niche) = self.niche {
            if &page.niche != niche {
                return false;
            }
        }
        if let Some(tier) = self.tier {
            if page.tier != tier {
                return false;
            }
        }
        true
    }
}

/// Filter criteria for querying link edges
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub source: Option<UserId>,
    pub target: Option<UserId>,
    pub credit_status: Option<CreditStatus>,

    /// Only edges currently observed live.
    pub live_only: bool,

    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EdgeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: UserId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_target(mut self, target: UserId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_credit_status(mut self, status: CreditStatus) -> Self {
        self.credit_status = Some(status);
        self
    }

    pub fn live_only(mut self) -> Self {
        self.live_only = true;
        self
    }

    pub fn created_after(mut self, time: DateTime<Utc>) -> Self {
        self.created_after = Some(time);
        self
    }

    pub fn created_before(mut self, time: DateTime<Utc>) -> Self {
        self.created_before = Some(time);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, edge: &crate::types::LinkEdge) -> bool {
        if let Some(source) = self.source {
            if edge.source != source {
                return false;
            }
        }
        if let Some(target) = self.target {
            if edge.target != target {
                return false;
            }
        }
        if let Some(status) = self.credit_status {
            if edge.credit_status != status {
                return false;
            }
        }
        if self.live_only && !edge.is_live {
            return false;
        }
        if let Some(after) = self.created_after {
            if edge.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if edge.created_at >= before {
                return false;
            }
        }
        true
    }
}

/// Record counts across the durable sets
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub page_count: u64,
    pub account_count: u64,
    pub transaction_count: u64,
    pub edge_count: u64,
    pub anchor_usage_count: u64,
    pub domain_score_count: u64,
    pub blacklist_count: u64,
}
