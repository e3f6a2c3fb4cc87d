use crate::error::Result;

/// Configuration for domain/page trust scoring.
///
/// Factor values are signed adjustments applied to the neutral baseline
/// in a fixed order; the scorer records every applied factor so a verdict
/// is reproducible and explainable from the same inputs.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Neutral starting trust. Default: 50.
    pub baseline: i32,

    /// Substring matches anywhere in the domain name. Default list covers
    /// the usual gray-market vocabulary.
    pub spam_keywords: Vec<String>,

    /// Applied once on the first spam keyword hit. Default: -40.
    pub spam_penalty: i32,

    /// TLD suffixes with a poor abuse record. Default: free/cheap zones.
    pub risky_tlds: Vec<String>,

    /// Default: -20.
    pub risky_tld_penalty: i32,

    /// Ordered (suffix, bonus) pairs; first match wins. Default: gov/edu
    /// heavy, org/io light.
    pub trusted_tlds: Vec<(String, i32)>,

    /// Domains younger than this many months are penalized. Default: 6.
    pub young_age_months: u32,

    /// Default: -15.
    pub young_age_penalty: i32,

    /// Domains older than this many months get a bonus. Default: 24.
    pub mature_age_months: u32,

    /// Default: +10.
    pub mature_age_bonus: i32,

    /// Minimum trust for the distribution surface. Default: 30.
    pub min_trust_distribution: u8,

    /// Minimum trust for the exchange surface. Higher because credits
    /// carry real value. Default: 40.
    pub min_trust_exchange: u8,

    /// Page-level adjustment for homepage-root URLs. Default: -10.
    pub homepage_penalty: i32,

    /// Page-level adjustment for query-string URLs. Default: -5.
    pub dynamic_url_penalty: i32,

    /// Page-level bonus for deep inner pages. Default: +5.
    pub deep_page_bonus: i32,

    /// How long a cached domain verdict stays fresh. Default: 7 days.
    pub cache_max_age_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let spam = [
            "casino", "poker", "betting", "gambling", "viagra", "cialis", "pills", "pharma",
            "payday", "porn", "xxx", "adult", "escort", "replica", "warez", "torrent", "crack",
        ];
        let risky = [
            ".tk", ".ml", ".ga", ".cf", ".gq", ".top", ".click", ".loan", ".win", ".bid",
            ".date", ".download",
        ];
        Self {
            baseline: 50,
            spam_keywords: spam.iter().map(|s| s.to_string()).collect(),
            spam_penalty: -40,
            risky_tlds: risky.iter().map(|s| s.to_string()).collect(),
            risky_tld_penalty: -20,
            trusted_tlds: vec![
                (".gov".to_string(), 30),
                (".edu".to_string(), 25),
                (".mil".to_string(), 20),
                (".org".to_string(), 10),
                (".io".to_string(), 5),
            ],
            young_age_months: 6,
            young_age_penalty: -15,
            mature_age_months: 24,
            mature_age_bonus: 10,
            min_trust_distribution: 30,
            min_trust_exchange: 40,
            homepage_penalty: -10,
            dynamic_url_penalty: -5,
            deep_page_bonus: 5,
            cache_max_age_days: 7,
        }
    }
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spam_keywords(mut self, keywords: Vec<String>) -> Self {
        self.spam_keywords = keywords;
        self
    }

    pub fn with_min_trust_exchange(mut self, min: u8) -> Self {
        self.min_trust_exchange = min;
        self
    }

    pub fn with_cache_max_age_days(mut self, days: i64) -> Self {
        self.cache_max_age_days = days;
        self
    }

    /// Minimum trust bar for a surface.
    pub fn min_trust(&self, channel: crate::types::Channel) -> u8 {
        match channel {
            crate::types::Channel::Distribution => self.min_trust_distribution,
            crate::types::Channel::Exchange => self.min_trust_exchange,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=100).contains(&self.baseline) {
            return Err(crate::error::MeshError::Validation(
                "baseline must be within 0..=100".into(),
            ));
        }
        if self.min_trust_distribution > 100 || self.min_trust_exchange > 100 {
            return Err(crate::error::MeshError::Validation(
                "trust bars must be within 0..=100".into(),
            ));
        }
        if self.cache_max_age_days < 0 {
            return Err(crate::error::MeshError::Validation(
                "cache_max_age_days must not be negative".into(),
            ));
        }
        Ok(())
    }
}
