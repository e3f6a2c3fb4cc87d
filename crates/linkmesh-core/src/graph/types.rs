use crate::error::Result;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel hop distance for an unconnected pair. Absence of a path is
/// safe, not risky, so this value always passes the distance rule.
pub const UNREACHABLE: u32 = 999;

/// Thresholds for the route-safety rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Minimum safe hop distance between two connected users. Default: 3.
    pub min_hop_distance: u32,

    /// BFS search bound. Pairs further apart than this read as
    /// unreachable. Default: 6.
    pub max_search_depth: u32,

    /// Edges ever allowed between one unordered pair. Default: 2.
    pub max_connections_per_pair: u32,

    /// Cool-down length for blacklisted pairs. Default: 90 days.
    pub blacklist_ttl_days: i64,

    /// New outgoing links one host may create per day. Default: 3.
    pub max_new_links_per_day: u32,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            min_hop_distance: 3,
            max_search_depth: 6,
            max_connections_per_pair: 2,
            blacklist_ttl_days: 90,
            max_new_links_per_day: 3,
        }
    }
}

impl SafetyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_hop_distance(mut self, hops: u32) -> Self {
        self.min_hop_distance = hops;
        self
    }

    pub fn with_max_search_depth(mut self, depth: u32) -> Self {
        self.max_search_depth = depth;
        self
    }

    pub fn with_max_connections_per_pair(mut self, cap: u32) -> Self {
        self.max_connections_per_pair = cap;
        self
    }

    pub fn with_max_new_links_per_day(mut self, cap: u32) -> Self {
        self.max_new_links_per_day = cap;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_hop_distance == 0 {
            return Err(crate::error::MeshError::Validation(
                "min_hop_distance must be > 0".into(),
            ));
        }
        if self.max_search_depth < self.min_hop_distance {
            return Err(crate::error::MeshError::Validation(
                "max_search_depth must be >= min_hop_distance".into(),
            ));
        }
        if self.max_connections_per_pair == 0 {
            return Err(crate::error::MeshError::Validation(
                "max_connections_per_pair must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Why a route was rejected. Carried both as a silent skip during search
/// and as the surfaced error on an execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockedReason {
    /// Source and requester are the same user.
    SelfRoute,

    /// The pair is on cool-down from a prior violation.
    Blacklisted { expires_at: DateTime<Utc> },

    /// A live link already exists between the pair, either direction.
    ReciprocalLink,

    /// Connected, but too close in the graph.
    HopDistanceTooShort { distance: u32, minimum: u32 },

    /// The pair has used up its lifetime connection allowance.
    ConnectionCapReached { count: u32, cap: u32 },

    /// An intermediary links to both ends — a length-2 loop footprint.
    ShortLoop { via: UserId },

    /// The host created too many links today.
    VelocityExceeded { today: u32, cap: u32 },
}

impl std::fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockedReason::SelfRoute => write!(f, "source and target are the same user"),
            BlockedReason::Blacklisted { expires_at } => {
                write!(f, "pair is blacklisted until {}", expires_at.format("%Y-%m-%d"))
            }
            BlockedReason::ReciprocalLink => {
                write!(f, "a direct link already exists between these users")
            }
            BlockedReason::HopDistanceTooShort { distance, minimum } => {
                write!(f, "hop distance {} is below the minimum of {}", distance, minimum)
            }
            BlockedReason::ConnectionCapReached { count, cap } => {
                write!(f, "pair already has {} connections (cap {})", count, cap)
            }
            BlockedReason::ShortLoop { via } => {
                write!(f, "short loop through intermediary {}", via)
            }
            BlockedReason::VelocityExceeded { today, cap } => {
                write!(f, "host created {} links today (cap {})", today, cap)
            }
        }
    }
}

/// Verdict of a route validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCheck {
    /// BFS distance at validation time; `UNREACHABLE` when unconnected.
    pub hop_distance: u32,

    /// First rule violated, if any. Rules are evaluated in a fixed
    /// order and evaluation stops at the first hit.
    pub blocked: Option<BlockedReason>,
}

impl RouteCheck {
    pub fn valid(hop_distance: u32) -> Self {
        RouteCheck {
            hop_distance,
            blocked: None,
        }
    }

    pub fn blocked(hop_distance: u32, reason: BlockedReason) -> Self {
        RouteCheck {
            hop_distance,
            blocked: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.blocked.is_none()
    }
}
