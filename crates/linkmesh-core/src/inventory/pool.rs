use crate::error::{MeshError, Result};
use crate::inventory::{ProbeOutcome, ReachabilityProbe};
use crate::scoring::{credit_value, score_page, DomainScorer, ScoringConfig};
use crate::storage::{InventoryFilter, Store};
use crate::types::{
    Channel, ContentPlacement, DomainMeta, InventoryPage, LinkType, PageId, Tier, UserId,
    VerificationStatus,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// One page offered for the pool, as received from the site-registration
/// flow. Authority metrics come from the external data provider.
#[derive(Debug, Clone)]
pub struct PageSubmission {
    pub page_url: String,
    pub domain_rating: u32,
    pub trust_flow: u32,
    pub traffic_estimate: u64,
    pub niche: String,
    pub tier: Tier,
    pub link_type: LinkType,
    pub placement: ContentPlacement,
    pub max_outbound: u32,
    pub age_months: Option<u32>,
}

/// Per-batch outcome. Rejections are data; the batch never aborts on a
/// page that fails validation.
#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    pub submitted: Vec<PageId>,
    pub rejected: Vec<RejectedPage>,
}

#[derive(Debug, Clone)]
pub struct RejectedPage {
    pub page_url: String,
    pub reason: String,
}

/// The shared inventory of link-target pages. Validates and prices
/// submissions, owns the reachability lifecycle, and serves the
/// filtered read path that route search consumes.
pub struct InventoryPool<S: Store> {
    store: Arc<S>,
    scorer: DomainScorer<S>,
}

impl<S: Store> InventoryPool<S> {
    pub fn new(store: Arc<S>, scoring: ScoringConfig) -> Self {
        let scorer = DomainScorer::new(store.clone(), scoring);
        Self { store, scorer }
    }

    /// Validate, score, price and upsert a batch of pages. Each page is
    /// judged independently; rejected pages never enter the pool.
    /// Resubmitting an (owner, url) pair updates the stored page in
    /// place instead of duplicating it.
    pub fn submit(&self, owner: UserId, pages: Vec<PageSubmission>) -> Result<SubmissionReport> {
        let mut report = SubmissionReport::default();

        for submission in pages {
            match self.admit(owner, &submission) {
                Ok(page_id) => report.submitted.push(page_id),
                Err(AdmitRejection(reason)) => report.rejected.push(RejectedPage {
                    page_url: submission.page_url.clone(),
                    reason,
                }),
            }
        }

        Ok(report)
    }

    fn admit(
        &self,
        owner: UserId,
        submission: &PageSubmission,
    ) -> std::result::Result<PageId, AdmitRejection> {
        let domain = match host_of(&submission.page_url) {
            Some(host) => host,
            None => {
                return Err(AdmitRejection(format!(
                    "invalid URL: {}",
                    submission.page_url
                )))
            }
        };
        if submission.max_outbound == 0 {
            return Err(AdmitRejection("max_outbound must be > 0".to_string()));
        }

        let meta = DomainMeta {
            domain_rating: submission.domain_rating,
            trust_flow: submission.trust_flow,
            traffic_estimate: submission.traffic_estimate,
            age_months: submission.age_months,
        };
        // The pool feeds the exchange, so the exchange bar applies.
        let verdict = self
            .scorer
            .score(&domain, &meta, Channel::Exchange)
            .map_err(|e| AdmitRejection(format!("scoring failed: {}", e)))?;
        if !verdict.is_eligible {
            return Err(AdmitRejection(verdict.rejection_reason()));
        }

        let page_verdict = score_page(&submission.page_url, &verdict, self.scorer.config());
        let now = Utc::now();

        let existing = self
            .store
            .page_by_owner_url(owner, &submission.page_url)
            .map_err(|e| AdmitRejection(format!("storage failure: {}", e)))?;

        let page = match existing {
            Some(mut page) => {
                page.domain = domain;
                page.domain_rating = submission.domain_rating;
                page.trust_flow = submission.trust_flow;
                page.traffic_estimate = submission.traffic_estimate;
                page.niche = submission.niche.clone();
                page.tier = submission.tier;
                page.link_type = submission.link_type;
                page.placement = submission.placement;
                page.max_outbound = submission.max_outbound.max(page.current_outbound);
                page.quality_score = page_verdict.quality_score;
                page.risk_score = page_verdict.risk_score;
                page.credits_per_link = credit_value(
                    submission.domain_rating,
                    verdict.trust_score,
                    page.is_indexed,
                    submission.tier,
                );
                // A previously rejected page earns a fresh verification
                // attempt; verified pages keep their status.
                if page.status == VerificationStatus::Rejected {
                    page.status = VerificationStatus::Pending;
                    page.status_reason = None;
                }
                page.is_active = true;
                page.updated_at = now;
                page
            }
            None => InventoryPage {
                id: Uuid::now_v7(),
                owner,
                page_url: submission.page_url.clone(),
                domain,
                domain_rating: submission.domain_rating,
                trust_flow: submission.trust_flow,
                traffic_estimate: submission.traffic_estimate,
                niche: submission.niche.clone(),
                tier: submission.tier,
                link_type: submission.link_type,
                placement: submission.placement,
                max_outbound: submission.max_outbound,
                current_outbound: 0,
                quality_score: page_verdict.quality_score,
                risk_score: page_verdict.risk_score,
                credits_per_link: credit_value(
                    submission.domain_rating,
                    verdict.trust_score,
                    false,
                    submission.tier,
                ),
                status: VerificationStatus::Pending,
                status_reason: None,
                is_active: true,
                is_indexed: false,
                created_at: now,
                updated_at: now,
            },
        };

        if let Err(reason) = page.validate() {
            return Err(AdmitRejection(reason));
        }
        self.store
            .put_page(&page)
            .map_err(|e| AdmitRejection(format!("storage failure: {}", e)))?;
        Ok(page.id)
    }

    /// Reachability check for a pending page. Unreachable (including
    /// probe failures) marks the page rejected with a reason; it does
    /// not abort the caller.
    pub fn verify_page(
        &self,
        page_id: PageId,
        probe: &dyn ReachabilityProbe,
    ) -> Result<InventoryPage> {
        let mut page = self
            .store
            .get_page(page_id)?
            .ok_or(MeshError::PageNotFound(page_id))?;

        match probe.check(&page.page_url) {
            ProbeOutcome::Reachable => {
                page.status = VerificationStatus::Verified;
                page.status_reason = None;
            }
            ProbeOutcome::Unreachable(detail) => {
                page.status = VerificationStatus::Rejected;
                page.status_reason = Some(format!("URL unreachable: {}", detail));
            }
        }
        page.updated_at = Utc::now();
        self.store.put_page(&page)?;
        Ok(page)
    }

    /// Record an indexation observation and reprice the page.
    pub fn mark_indexed(&self, page_id: PageId, indexed: bool) -> Result<InventoryPage> {
        let mut page = self
            .store
            .get_page(page_id)?
            .ok_or(MeshError::PageNotFound(page_id))?;
        if page.is_indexed == indexed {
            return Ok(page);
        }

        page.is_indexed = indexed;
        let meta = DomainMeta {
            domain_rating: page.domain_rating,
            trust_flow: page.trust_flow,
            traffic_estimate: page.traffic_estimate,
            age_months: None,
        };
        let verdict = self.scorer.score(&page.domain, &meta, Channel::Exchange)?;
        page.credits_per_link =
            credit_value(page.domain_rating, verdict.trust_score, indexed, page.tier);
        page.updated_at = Utc::now();
        self.store.put_page(&page)?;
        Ok(page)
    }

    /// The read path behind route search: routable pages that are not
    /// the requester's own, narrowed by the caller's filters.
    pub fn available(&self, requester: UserId, filter: InventoryFilter) -> Result<Vec<InventoryPage>> {
        self.store
            .list_pages(filter.routable_only().excluding_owner(requester))
    }

    /// Soft-delete a page. Historical edges keep their source reference.
    pub fn deactivate(&self, page_id: PageId) -> Result<()> {
        let mut page = self
            .store
            .get_page(page_id)?
            .ok_or(MeshError::PageNotFound(page_id))?;
        page.is_active = false;
        page.updated_at = Utc::now();
        self.store.put_page(&page)
    }

    pub fn get(&self, page_id: PageId) -> Result<Option<InventoryPage>> {
        self.store.get_page(page_id)
    }
}

/// Internal rejection carrier; becomes a `RejectedPage` row.
struct AdmitRejection(String);

/// Lowercased host with any `www.` prefix dropped.
fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_lowercase())
}
