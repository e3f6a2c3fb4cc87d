use crate::error::Result;
use rust_decimal::Decimal;

/// Configuration for the credit ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// How long earned credits stay in the pending pool before the
    /// maintenance job settles them. Default: 7 days.
    pub pending_window_days: i64,

    /// Balance fraction eroded per idle month. Default: 0.05.
    pub monthly_decay_rate: Decimal,

    /// Ceiling on a single decay event, however long the idle streak.
    /// Default: 0.20.
    pub max_decay_fraction: Decimal,

    /// Retries for the optimistic commit loop before giving up.
    /// Default: 5.
    pub max_commit_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pending_window_days: 7,
            monthly_decay_rate: Decimal::new(5, 2),
            max_decay_fraction: Decimal::new(20, 2),
            max_commit_retries: 5,
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_window_days(mut self, days: i64) -> Self {
        self.pending_window_days = days;
        self
    }

    pub fn with_monthly_decay_rate(mut self, rate: Decimal) -> Self {
        self.monthly_decay_rate = rate;
        self
    }

    pub fn with_max_decay_fraction(mut self, fraction: Decimal) -> Self {
        self.max_decay_fraction = fraction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pending_window_days < 0 {
            return Err(crate::error::MeshError::Validation(
                "pending_window_days must not be negative".into(),
            ));
        }
        if self.monthly_decay_rate < Decimal::ZERO || self.monthly_decay_rate > Decimal::ONE {
            return Err(crate::error::MeshError::Validation(
                "monthly_decay_rate must be within 0..=1".into(),
            ));
        }
        if self.max_decay_fraction < self.monthly_decay_rate {
            return Err(crate::error::MeshError::Validation(
                "max_decay_fraction must be >= monthly_decay_rate".into(),
            ));
        }
        if self.max_commit_retries == 0 {
            return Err(crate::error::MeshError::Validation(
                "max_commit_retries must be > 0".into(),
            ));
        }
        Ok(())
    }
}
