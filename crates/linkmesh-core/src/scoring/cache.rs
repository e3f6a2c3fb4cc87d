use crate::error::Result;
use crate::scoring::{score_domain, DomainVerdict, ScoringConfig};
use crate::storage::Store;
use crate::types::{Channel, DomainMeta, RiskLevel};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Store-backed memoization of domain verdicts. Scoring is pure and
/// cheap, but the verdict trail is also a read model for dashboards, so
/// results are kept per domain and refreshed once they age out.
pub struct DomainScorer<S: Store> {
    store: Arc<S>,
    config: ScoringConfig,
}

impl<S: Store> DomainScorer<S> {
    pub fn new(store: Arc<S>, config: ScoringConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Cached verdict when fresh, recomputed and upserted otherwise.
    /// Eligibility is always re-derived for the requested channel.
    pub fn score(&self, domain: &str, meta: &DomainMeta, channel: Channel) -> Result<DomainVerdict> {
        let domain_key = domain.trim().to_lowercase();
        let max_age = Duration::days(self.config.cache_max_age_days);

        if let Some(cached) = self.store.get_domain_score(&domain_key)? {
            if Utc::now() - cached.scored_at < max_age {
                let mut verdict = DomainVerdict {
                    domain: cached.domain,
                    trust_score: cached.trust_score,
                    risk_score: cached.risk_score,
                    risk_level: cached.risk_level,
                    is_eligible: false,
                    factors: cached.factors,
                };
                verdict.is_eligible = verdict.risk_level != RiskLevel::Critical
                    && verdict.trust_score >= self.config.min_trust(channel);
                return Ok(verdict);
            }
        }

        let verdict = score_domain(&domain_key, meta, channel, &self.config);
        self.store.put_domain_score(&verdict.to_record(meta))?;
        Ok(verdict)
    }
}
