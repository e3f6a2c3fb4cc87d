use crate::anchor::AnchorConfig;
use crate::error::Result;
use crate::storage::Store;
use crate::types::{AnchorType, AnchorUsage, Channel, Tier, UserId};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A completed allocation: the anchor to place and why it was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorPick {
    pub text: String,
    pub anchor_type: AnchorType,
    pub reason: String,
}

/// Chooses anchor text so each user's realized anchor-type distribution
/// tracks the per-tier targets. `select` couples allocation and logging:
/// the usage row is appended before the pick is returned, so the next
/// allocation always sees updated history. Flows that may still abort
/// after choosing an anchor stage the two halves with [`pick`] and
/// [`record`] instead.
///
/// [`pick`]: AnchorAllocator::pick
/// [`record`]: AnchorAllocator::record
pub struct AnchorAllocator<S: Store> {
    store: Arc<S>,
    config: AnchorConfig,

    /// Injected randomness; seedable so tests are deterministic.
    rng: Mutex<StdRng>,
}

impl<S: Store> AnchorAllocator<S> {
    pub fn new(store: Arc<S>, config: AnchorConfig) -> Self {
        Self {
            store,
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic allocator for tests.
    pub fn with_seed(store: Arc<S>, config: AnchorConfig, seed: u64) -> Self {
        Self {
            store,
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Allocate an anchor for a placement and log it.
    pub fn select(
        &self,
        user: UserId,
        target_url: &str,
        keyword: &str,
        site_name: &str,
        tier: Tier,
        channel: Channel,
    ) -> Result<AnchorPick> {
        let pick = self.pick(user, target_url, keyword, site_name, tier)?;
        self.record(user, target_url, &pick.text, pick.anchor_type, channel)?;
        Ok(pick)
    }

    /// Compute an anchor for a placement without logging it. The pick is
    /// invisible to future allocations until [`record`] is called, so a
    /// caller that aborts never burns the user's anchor budget.
    ///
    /// [`record`]: AnchorAllocator::record
    pub fn pick(
        &self,
        user: UserId,
        target_url: &str,
        keyword: &str,
        site_name: &str,
        tier: Tier,
    ) -> Result<AnchorPick> {
        let history = self.store.anchor_usage_for(user, None)?;

        let (mut anchor_type, mut reason) = if history.is_empty() {
            let picked = self.weighted_cold_start();
            (picked, "no history, weighted cold-start pick".to_string())
        } else {
            self.deficit_pick(&history, tier)
        };

        // Daily caps on the aggressive types.
        let day_ago = Utc::now() - Duration::hours(24);
        let today: Vec<&AnchorUsage> =
            history.iter().filter(|u| u.created_at >= day_ago).collect();
        if anchor_type == AnchorType::Keyword {
            let used = today
                .iter()
                .filter(|u| u.anchor_type == AnchorType::Keyword)
                .count();
            if used >= self.config.daily_keyword_cap {
                anchor_type = AnchorType::Branded;
                reason = format!(
                    "daily keyword cap reached ({}/{}), fell back to branded",
                    used, self.config.daily_keyword_cap
                );
            }
        }
        if anchor_type == AnchorType::Partial {
            let used = today
                .iter()
                .filter(|u| u.anchor_type == AnchorType::Partial)
                .count();
            if used >= self.config.daily_partial_cap {
                anchor_type = AnchorType::Generic;
                reason = format!(
                    "daily partial cap reached ({}/{}), fell back to generic",
                    used, self.config.daily_partial_cap
                );
            }
        }

        let mut text = self.generate_text(anchor_type, target_url, keyword, site_name);

        // Repetition cap on the exact text inside the reuse window.
        if self.is_overused(&history, &text) {
            let substitute = if text != site_name {
                (site_name.to_string(), AnchorType::Branded)
            } else {
                (bare_domain(target_url), AnchorType::Naked)
            };
            reason = format!(
                "anchor \"{}\" reused {}x in {} days, substituted",
                text, self.config.reuse_cap, self.config.reuse_window_days
            );
            text = substitute.0;
            anchor_type = substitute.1;
        }

        Ok(AnchorPick {
            text,
            anchor_type,
            reason,
        })
    }

    /// Append the usage row that makes an anchor visible to future picks.
    pub fn record(
        &self,
        user: UserId,
        target_url: &str,
        text: &str,
        anchor_type: AnchorType,
        channel: Channel,
    ) -> Result<()> {
        let usage = AnchorUsage::new(user, target_url, text, anchor_type, channel);
        self.store.append_anchor_usage(&usage)
    }

    /// Realized share per anchor type over a user's whole history.
    pub fn realized_distribution(&self, user: UserId) -> Result<HashMap<AnchorType, f32>> {
        let history = self.store.anchor_usage_for(user, None)?;
        Ok(distribution(&history))
    }

    /// Would this exact text violate the repetition cap right now?
    pub fn check_anchor_safety(&self, user: UserId, text: &str) -> Result<bool> {
        let history = self.store.anchor_usage_for(user, None)?;
        Ok(!self.is_overused(&history, text))
    }

    /// Pick the type with the largest (target − realized) deficit, with
    /// the keyword safety override.
    fn deficit_pick(&self, history: &[AnchorUsage], tier: Tier) -> (AnchorType, String) {
        let realized = distribution(history);

        let mut best = AnchorType::Branded;
        let mut best_deficit = f32::MIN;
        for &anchor_type in AnchorType::ALL.iter() {
            let target = self.config.target_share(tier, anchor_type);
            let current = realized.get(&anchor_type).copied().unwrap_or(0.0);
            let deficit = target - current;
            if deficit > best_deficit {
                best = anchor_type;
                best_deficit = deficit;
            }
        }

        if best == AnchorType::Keyword {
            let target = self.config.target_share(tier, AnchorType::Keyword);
            let current = realized.get(&AnchorType::Keyword).copied().unwrap_or(0.0);
            if current > target * self.config.keyword_overuse_factor {
                return (
                    AnchorType::Branded,
                    format!(
                        "keyword over-represented ({:.0}% > {:.1}x target), fell back to branded",
                        current * 100.0,
                        self.config.keyword_overuse_factor
                    ),
                );
            }
        }

        let target = self.config.target_share(tier, best);
        (
            best,
            format!(
                "largest deficit: {} at {:.0}% target vs {:.0}% realized",
                best,
                target * 100.0,
                (target - best_deficit) * 100.0
            ),
        )
    }

    fn weighted_cold_start(&self) -> AnchorType {
        let total: f32 = self.config.cold_start_weights.iter().map(|(_, w)| w).sum();
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut roll = rng.gen_range(0.0..total);
        for &(anchor_type, weight) in &self.config.cold_start_weights {
            if roll < weight {
                return anchor_type;
            }
            roll -= weight;
        }
        AnchorType::Branded
    }

    fn generate_text(
        &self,
        anchor_type: AnchorType,
        target_url: &str,
        keyword: &str,
        site_name: &str,
    ) -> String {
        match anchor_type {
            AnchorType::Branded => site_name.to_string(),
            AnchorType::Naked => bare_domain(target_url),
            AnchorType::Keyword => keyword.to_string(),
            AnchorType::Partial => {
                let template = self.pick_from(&self.config.partial_templates);
                template.replace("{keyword}", keyword)
            }
            AnchorType::Generic => self.pick_from(&self.config.generic_phrases),
            AnchorType::Lsi => {
                let words: Vec<&str> = keyword.split_whitespace().collect();
                if words.len() >= 2 {
                    format!("{} {}", words[0], words[1])
                } else {
                    format!("{} resource", keyword)
                }
            }
        }
    }

    fn pick_from(&self, pool: &[String]) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let idx = rng.gen_range(0..pool.len());
        pool[idx].clone()
    }

    fn is_overused(&self, history: &[AnchorUsage], text: &str) -> bool {
        let window_start = Utc::now() - Duration::days(self.config.reuse_window_days);
        let count = history
            .iter()
            .filter(|u| u.created_at >= window_start && u.anchor_text == text)
            .count();
        count >= self.config.reuse_cap
    }
}

/// Share of each anchor type within a usage history.
fn distribution(history: &[AnchorUsage]) -> HashMap<AnchorType, f32> {
    let mut counts: HashMap<AnchorType, usize> = HashMap::new();
    for usage in history {
        *counts.entry(usage.anchor_type).or_insert(0) += 1;
    }
    let total = history.len().max(1) as f32;
    counts
        .into_iter()
        .map(|(t, c)| (t, c as f32 / total))
        .collect()
}

/// Bare registrable host of a URL: no scheme, no www, no path.
pub(crate) fn bare_domain(url: &str) -> String {
    let host = match url::Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or("").to_string(),
        Err(_) => url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or("")
            .to_string(),
    };
    host.trim_start_matches("www.").to_string()
}
