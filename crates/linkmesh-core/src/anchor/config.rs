use crate::error::Result;
use crate::types::{AnchorType, Tier};

/// Target anchor-type shares and rate limits per tier.
///
/// Shares per tier sum to 1.0. Tier 1 skews hard toward branded/naked
/// (money sites must look natural); tier 2 tolerates more keyword
/// anchors; tier 3 leans on naked + generic volume.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    pub tier1_targets: Vec<(AnchorType, f32)>,
    pub tier2_targets: Vec<(AnchorType, f32)>,
    pub tier3_targets: Vec<(AnchorType, f32)>,

    /// Weighted pick used when a user has no allocation history yet.
    pub cold_start_weights: Vec<(AnchorType, f32)>,

    /// Keyword anchors are refused once their realized share exceeds
    /// `target × this factor`. Default: 1.5.
    pub keyword_overuse_factor: f32,

    /// Identical anchor text may repeat at most this many times per user
    /// inside the reuse window. Default: 3.
    pub reuse_cap: usize,

    /// Default: 30 days.
    pub reuse_window_days: i64,

    /// Keyword anchors allowed per user per day. Default: 2.
    pub daily_keyword_cap: usize,

    /// Partial-match anchors allowed per user per day. Default: 3.
    pub daily_partial_cap: usize,

    /// Templates for partial-match anchors; `{keyword}` is substituted.
    pub partial_templates: Vec<String>,

    /// Fixed pool of generic phrases.
    pub generic_phrases: Vec<String>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        use AnchorType::*;
        Self {
            tier1_targets: vec![
                (Branded, 0.45),
                (Naked, 0.35),
                (Keyword, 0.05),
                (Partial, 0.05),
                (Generic, 0.05),
                (Lsi, 0.05),
            ],
            tier2_targets: vec![
                (Branded, 0.30),
                (Naked, 0.25),
                (Keyword, 0.15),
                (Partial, 0.15),
                (Generic, 0.10),
                (Lsi, 0.05),
            ],
            tier3_targets: vec![
                (Branded, 0.20),
                (Naked, 0.30),
                (Keyword, 0.05),
                (Partial, 0.10),
                (Generic, 0.25),
                (Lsi, 0.10),
            ],
            cold_start_weights: vec![
                (Branded, 0.40),
                (Naked, 0.30),
                (Keyword, 0.05),
                (Partial, 0.05),
                (Generic, 0.10),
                (Lsi, 0.10),
            ],
            keyword_overuse_factor: 1.5,
            reuse_cap: 3,
            reuse_window_days: 30,
            daily_keyword_cap: 2,
            daily_partial_cap: 3,
            partial_templates: vec![
                "{keyword} guide".to_string(),
                "best {keyword}".to_string(),
                "{keyword} tips".to_string(),
                "complete {keyword} overview".to_string(),
                "why {keyword} matters".to_string(),
            ],
            generic_phrases: vec![
                "click here".to_string(),
                "learn more".to_string(),
                "read more".to_string(),
                "visit website".to_string(),
                "this site".to_string(),
                "more info".to_string(),
                "check it out".to_string(),
            ],
        }
    }
}

impl AnchorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reuse_cap(mut self, cap: usize) -> Self {
        self.reuse_cap = cap;
        self
    }

    pub fn with_daily_keyword_cap(mut self, cap: usize) -> Self {
        self.daily_keyword_cap = cap;
        self
    }

    /// Target shares for a tier.
    pub fn targets(&self, tier: Tier) -> &[(AnchorType, f32)] {
        match tier {
            Tier::One => &self.tier1_targets,
            Tier::Two => &self.tier2_targets,
            Tier::Three => &self.tier3_targets,
        }
    }

    /// Target share of one type within a tier.
    pub fn target_share(&self, tier: Tier, anchor_type: AnchorType) -> f32 {
        self.targets(tier)
            .iter()
            .find(|(t, _)| *t == anchor_type)
            .map(|(_, share)| *share)
            .unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, targets) in [
            ("tier1_targets", &self.tier1_targets),
            ("tier2_targets", &self.tier2_targets),
            ("tier3_targets", &self.tier3_targets),
        ] {
            let sum: f32 = targets.iter().map(|(_, s)| s).sum();
            if (sum - 1.0).abs() > 0.001 {
                return Err(crate::error::MeshError::Validation(format!(
                    "{} shares sum to {}, expected 1.0",
                    name, sum
                )));
            }
        }
        if self.partial_templates.is_empty() || self.generic_phrases.is_empty() {
            return Err(crate::error::MeshError::Validation(
                "template pools must not be empty".into(),
            ));
        }
        if self.keyword_overuse_factor < 1.0 {
            return Err(crate::error::MeshError::Validation(
                "keyword_overuse_factor must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}
