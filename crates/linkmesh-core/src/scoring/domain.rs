use crate::scoring::ScoringConfig;
use crate::types::{Channel, DomainMeta, DomainScore, RiskLevel, ScoreFactor};
use chrono::Utc;

/// Outcome of scoring a domain for a given surface.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainVerdict {
    pub domain: String,
    pub trust_score: u8,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub is_eligible: bool,

    /// Every factor applied, in application order. The audit trail.
    pub factors: Vec<ScoreFactor>,
}

impl DomainVerdict {
    /// Re-derive eligibility for a different surface without re-scoring.
    pub fn eligible_for(&self, channel: Channel, config: &ScoringConfig) -> bool {
        self.risk_level != RiskLevel::Critical && self.trust_score >= config.min_trust(channel)
    }

    /// One-line rejection summary built from the negative factors.
    pub fn rejection_reason(&self) -> String {
        let negatives: Vec<&str> = self
            .factors
            .iter()
            .filter(|f| f.impact < 0)
            .map(|f| f.detail.as_str())
            .collect();
        if negatives.is_empty() {
            format!("trust score {} below minimum", self.trust_score)
        } else {
            negatives.join("; ")
        }
    }

    /// Durable cache record for this verdict.
    pub fn to_record(&self, meta: &DomainMeta) -> DomainScore {
        DomainScore {
            domain: self.domain.clone(),
            trust_score: self.trust_score,
            risk_score: self.risk_score,
            risk_level: self.risk_level,
            domain_rating: meta.domain_rating,
            factors: self.factors.clone(),
            scored_at: Utc::now(),
        }
    }
}

/// Score a domain deterministically: neutral baseline, then additive
/// factors in fixed order (spam keyword, risky TLD, trusted TLD, domain
/// age, domain rating), clamped to [0, 100].
pub fn score_domain(
    domain: &str,
    meta: &DomainMeta,
    channel: Channel,
    config: &ScoringConfig,
) -> DomainVerdict {
    let domain = domain.trim().to_lowercase();
    let mut trust = config.baseline;
    let mut factors = Vec::new();

    // 1. Spam keyword substring match. First hit only.
    if let Some(keyword) = config
        .spam_keywords
        .iter()
        .find(|k| domain.contains(k.as_str()))
    {
        trust += config.spam_penalty;
        factors.push(ScoreFactor::new(
            "spam_keyword",
            config.spam_penalty,
            format!("domain contains spam keyword \"{}\"", keyword),
        ));
    }

    // 2. Risky TLD.
    if let Some(tld) = config
        .risky_tlds
        .iter()
        .find(|t| domain.ends_with(t.as_str()))
    {
        trust += config.risky_tld_penalty;
        factors.push(ScoreFactor::new(
            "risky_tld",
            config.risky_tld_penalty,
            format!("high-abuse TLD \"{}\"", tld),
        ));
    }

    // 3. Trusted TLD, first match wins.
    if let Some((tld, bonus)) = config
        .trusted_tlds
        .iter()
        .find(|(t, _)| domain.ends_with(t.as_str()))
    {
        trust += bonus;
        factors.push(ScoreFactor::new(
            "trusted_tld",
            *bonus,
            format!("trusted TLD \"{}\"", tld),
        ));
    }

    // 4. Domain age bucket, when the provider knows it.
    if let Some(age) = meta.age_months {
        if age < config.young_age_months {
            trust += config.young_age_penalty;
            factors.push(ScoreFactor::new(
                "young_domain",
                config.young_age_penalty,
                format!("domain is {} months old", age),
            ));
        } else if age > config.mature_age_months {
            trust += config.mature_age_bonus;
            factors.push(ScoreFactor::new(
                "mature_domain",
                config.mature_age_bonus,
                format!("domain is {} months old", age),
            ));
        }
    }

    // 5. Domain rating bucket.
    let dr_impact = match meta.domain_rating {
        0..=9 => -15,
        10..=19 => -10,
        20..=39 => 0,
        40..=59 => 10,
        _ => 15,
    };
    if dr_impact != 0 {
        trust += dr_impact;
        factors.push(ScoreFactor::new(
            "domain_rating",
            dr_impact,
            format!("domain rating {}", meta.domain_rating),
        ));
    }

    let trust_score = trust.clamp(0, 100) as u8;
    let risk_score = 100 - trust_score;
    let risk_level = RiskLevel::from_risk_score(risk_score);
    let is_eligible = risk_level != RiskLevel::Critical && trust_score >= config.min_trust(channel);

    DomainVerdict {
        domain,
        trust_score,
        risk_score,
        risk_level,
        is_eligible,
        factors,
    }
}

/// Outcome of scoring a specific page URL on an already-scored domain.
#[derive(Debug, Clone, PartialEq)]
pub struct PageVerdict {
    pub quality_score: u8,
    pub risk_score: u8,
    pub factors: Vec<ScoreFactor>,
}

/// Adjust a domain verdict for the specifics of one URL: homepage roots
/// and query-string URLs lose points, deep inner pages gain.
pub fn score_page(url: &str, domain: &DomainVerdict, config: &ScoringConfig) -> PageVerdict {
    let mut quality = domain.trust_score as i32;
    let mut factors = domain.factors.clone();

    let (path, query) = split_url(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        quality += config.homepage_penalty;
        factors.push(ScoreFactor::new(
            "homepage_root",
            config.homepage_penalty,
            "link target is the homepage root",
        ));
    } else if segments.len() >= 2 {
        quality += config.deep_page_bonus;
        factors.push(ScoreFactor::new(
            "deep_page",
            config.deep_page_bonus,
            "deep inner page",
        ));
    }

    if query {
        quality += config.dynamic_url_penalty;
        factors.push(ScoreFactor::new(
            "dynamic_url",
            config.dynamic_url_penalty,
            "URL carries a query string",
        ));
    }

    let quality_score = quality.clamp(0, 100) as u8;
    PageVerdict {
        quality_score,
        risk_score: 100 - quality_score,
        factors,
    }
}

/// Path and has-query split that tolerates scheme-less input.
fn split_url(url: &str) -> (String, bool) {
    match url::Url::parse(url) {
        Ok(parsed) => (parsed.path().to_string(), parsed.query().is_some()),
        Err(_) => {
            let rest = url
                .trim_start_matches("https://")
                .trim_start_matches("http://");
            let has_query = rest.contains('?');
            let rest = rest.split('?').next().unwrap_or("");
            let path = match rest.find('/') {
                Some(idx) => rest[idx..].to_string(),
                None => String::new(),
            };
            (path, has_query)
        }
    }
}
