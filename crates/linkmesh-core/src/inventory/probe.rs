use crate::error::{MeshError, Result};
use std::time::Duration;

/// Result of a reachability check. A failure here is data, not an
/// error: unreachable pages get rejected, the batch keeps going.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable(String),
}

/// Port for the external reachability check. The HTTP implementation
/// below is the production one; tests inject fixed outcomes.
pub trait ReachabilityProbe: Send + Sync {
    fn check(&self, url: &str) -> ProbeOutcome;
}

/// HEAD-request probe with a hard timeout so a dead host cannot stall a
/// verification batch.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    /// Default 5 s timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeshError::Validation(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl ReachabilityProbe for HttpProbe {
    fn check(&self, url: &str) -> ProbeOutcome {
        match self.client.head(url).send() {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    ProbeOutcome::Reachable
                } else {
                    ProbeOutcome::Unreachable(format!("HTTP {}", status.as_u16()))
                }
            }
            Err(e) => ProbeOutcome::Unreachable(e.to_string()),
        }
    }
}

/// Fixed-outcome probe for tests and offline use.
pub struct StaticProbe {
    outcome: ProbeOutcome,
}

impl StaticProbe {
    pub fn reachable() -> Self {
        Self {
            outcome: ProbeOutcome::Reachable,
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            outcome: ProbeOutcome::Unreachable(reason.into()),
        }
    }
}

impl ReachabilityProbe for StaticProbe {
    fn check(&self, _url: &str) -> ProbeOutcome {
        self.outcome.clone()
    }
}
