use crate::error::Result;
use crate::types::Tier;

/// Configuration for route search and exchange execution.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// How many ranked routes a search returns. Default: 10.
    pub max_routes: usize,

    /// Ranking weight on the source page's domain rating. Default: 0.4.
    pub domain_rating_weight: f32,

    /// Ranking weight on the source page's quality score. Default: 0.3.
    pub quality_weight: f32,

    /// Ranking weight on hop distance. Greater distance is a safety
    /// bonus, not a tiebreak, so this multiplies the raw hop count.
    /// Default: 5.0.
    pub hop_distance_weight: f32,

    /// Links a requester may acquire per day into a tier-1 page.
    /// Default: 3.
    pub tier1_daily_cap: u32,

    /// Default: 8.
    pub tier2_daily_cap: u32,

    /// Default: 15.
    pub tier3_daily_cap: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            max_routes: 10,
            domain_rating_weight: 0.4,
            quality_weight: 0.3,
            hop_distance_weight: 5.0,
            tier1_daily_cap: 3,
            tier2_daily_cap: 8,
            tier3_daily_cap: 15,
        }
    }
}

impl ExchangeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_routes(mut self, n: usize) -> Self {
        self.max_routes = n;
        self
    }

    pub fn with_daily_caps(mut self, tier1: u32, tier2: u32, tier3: u32) -> Self {
        self.tier1_daily_cap = tier1;
        self.tier2_daily_cap = tier2;
        self.tier3_daily_cap = tier3;
        self
    }

    /// Daily acquisition cap for a tier.
    pub fn daily_cap(&self, tier: Tier) -> u32 {
        match tier {
            Tier::One => self.tier1_daily_cap,
            Tier::Two => self.tier2_daily_cap,
            Tier::Three => self.tier3_daily_cap,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_routes == 0 {
            return Err(crate::error::MeshError::Validation(
                "max_routes must be > 0".into(),
            ));
        }
        if self.tier1_daily_cap == 0 || self.tier2_daily_cap == 0 || self.tier3_daily_cap == 0 {
            return Err(crate::error::MeshError::Validation(
                "daily caps must be > 0".into(),
            ));
        }
        Ok(())
    }
}
