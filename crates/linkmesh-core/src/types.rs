use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type alias for user identifiers. Users are an external identity;
/// the core never creates them, only attaches records to them.
pub type UserId = Uuid;

/// Type alias for inventory page identifiers
pub type PageId = Uuid;

/// Type alias for link edge identifiers
pub type LinkId = Uuid;

/// Type alias for ledger transaction identifiers
pub type TxnId = Uuid;

/// Position of a link in the authority-flow hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Money site. Final beneficiary of authority. Scarce, handled carefully.
    One,

    /// Buffer layer between amplification and money sites.
    Two,

    /// Amplification / outer layer. Highest volume, loosest rules.
    Three,
}

impl Tier {
    pub fn as_u8(self) -> u8 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Tier::One),
            2 => Some(Tier::Two),
            3 => Some(Tier::Three),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Whether the placed link passes authority
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkType {
    Dofollow,
    Nofollow,
}

/// Where on the host page the link is placed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentPlacement {
    /// In the body of the content. Most valuable.
    Contextual,
    Sidebar,
    Footer,
    AuthorBio,
}

/// Lifecycle of an inventory page's verification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Submitted and scored, not yet confirmed reachable.
    Pending,

    /// Confirmed reachable. Routable if also active.
    Verified,

    /// Failed validation or reachability. Never routable.
    Rejected,

    /// Was verified, later failed a re-verification pass.
    Expired,
}

/// A page a user offers as a link target in the shared pool.
///
/// Only `verified ∧ is_active` pages with free outbound capacity are
/// routable. Pages are soft-deleted (`is_active = false`), never removed,
/// so historical edges keep a valid source reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryPage {
    /// Unique identifier. UUIDv7 for time-sortability.
    pub id: PageId,

    /// Owning user. Pages are upserted per (owner, url).
    pub owner: UserId,

    /// Full URL of the page that will host placed links.
    pub page_url: String,

    /// Registrable domain, lowercased. Derived from the URL at submission.
    pub domain: String,

    /// Externally supplied authority metric (0-100).
    pub domain_rating: u32,

    /// Externally supplied trust metric (0-100).
    pub trust_flow: u32,

    /// Externally supplied monthly traffic estimate.
    pub traffic_estimate: u64,

    /// Topical niche, free-form lowercase label.
    pub niche: String,

    pub tier: Tier,
    pub link_type: LinkType,
    pub placement: ContentPlacement,

    /// Capacity. Invariant: `current_outbound <= max_outbound`.
    pub max_outbound: u32,
    pub current_outbound: u32,

    /// Computed at submission from domain + page heuristics. 0-100.
    pub quality_score: u8,

    /// `100 - quality_score` at submission time. 0-100.
    pub risk_score: u8,

    /// Price a requester pays per placed link.
    pub credits_per_link: Decimal,

    pub status: VerificationStatus,

    /// Why the page holds its current status. Set for rejected and
    /// expired pages.
    pub status_reason: Option<String>,

    /// Soft-delete flag.
    pub is_active: bool,

    /// Whether the page was observed indexed. Affects credit pricing.
    pub is_indexed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryPage {
    /// Remaining outbound capacity.
    pub fn free_slots(&self) -> u32 {
        self.max_outbound.saturating_sub(self.current_outbound)
    }

    /// Routable = verified, active, and has a free slot.
    pub fn is_routable(&self) -> bool {
        self.status == VerificationStatus::Verified && self.is_active && self.free_slots() > 0
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.page_url.is_empty() {
            return Err("page_url must not be empty".to_string());
        }
        if self.domain.is_empty() {
            return Err("domain must not be empty".to_string());
        }
        if self.max_outbound == 0 {
            return Err("max_outbound must be > 0".to_string());
        }
        if self.current_outbound > self.max_outbound {
            return Err(format!(
                "current_outbound {} exceeds max_outbound {}",
                self.current_outbound, self.max_outbound
            ));
        }
        if self.credits_per_link < Decimal::ZERO {
            return Err("credits_per_link must not be negative".to_string());
        }
        Ok(())
    }
}

/// Single-row credit account, one per user. Lazy-initialized on first
/// economic activity.
///
/// The live balance is a cached projection; the `Transaction` log is the
/// source of truth for audit. `version` is the optimistic-concurrency
/// counter checked by `Store::commit_ledger`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerAccount {
    pub user: UserId,

    /// Spendable credits. Never negative.
    pub balance: Decimal,

    /// Earned-but-held credits, released after the pending window.
    /// Never negative.
    pub pending: Decimal,

    pub lifetime_earned: Decimal,
    pub lifetime_spent: Decimal,

    /// Last time spendable credits were earned (award or conversion).
    /// Drives decay idleness.
    pub last_earned_at: Option<DateTime<Utc>>,

    /// Last time a decay event was charged. Prevents double-charging
    /// the same idle month when maintenance runs daily.
    pub last_decay_at: Option<DateTime<Utc>>,

    /// Compare-and-swap counter, bumped on every committed mutation.
    pub version: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerAccount {
    /// Fresh zero-balance account for a user.
    pub fn new(user: UserId) -> Self {
        let now = Utc::now();
        LedgerAccount {
            user,
            balance: Decimal::ZERO,
            pending: Decimal::ZERO,
            lifetime_earned: Decimal::ZERO,
            lifetime_spent: Decimal::ZERO,
            last_earned_at: None,
            last_decay_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.balance < Decimal::ZERO {
            return Err(format!("balance {} is negative", self.balance));
        }
        if self.pending < Decimal::ZERO {
            return Err(format!("pending {} is negative", self.pending));
        }
        Ok(())
    }
}

/// Category of a ledger transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TxnKind {
    /// Spendable credits received (direct award or pending conversion).
    Earned,

    /// Spendable credits paid out for a placed link.
    Spent,

    /// Credits awarded into the held pool, not yet spendable.
    Pending,

    /// Held credits reversed because the underlying link died.
    Clawback,

    /// Balance eroded by the idle-decay pass.
    Decay,

    /// Direct grant or saga-compensation refund.
    Bonus,
}

impl TxnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxnKind::Earned => "earned",
            TxnKind::Spent => "spent",
            TxnKind::Pending => "pending",
            TxnKind::Clawback => "clawback",
            TxnKind::Decay => "decay",
            TxnKind::Bonus => "bonus",
        }
    }

    /// Whether this kind moves the spendable balance (as opposed to the
    /// held pending pool).
    pub fn touches_balance(self) -> bool {
        !matches!(self, TxnKind::Pending | TxnKind::Clawback)
    }
}

impl std::fmt::Display for TxnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only ledger entry. Immutable once written.
///
/// `amount` is signed: positive for credits in, negative for credits out.
/// `balance_after` snapshots the spendable balance after the mutation so
/// the log alone can answer "what did the user see at the time".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: TxnId,
    pub user: UserId,
    pub kind: TxnKind,
    pub amount: Decimal,
    pub balance_after: Decimal,

    /// Human-readable reason, surfaced in history views.
    pub reason: String,

    pub related_link: Option<LinkId>,
    pub related_page: Option<PageId>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user: UserId,
        kind: TxnKind,
        amount: Decimal,
        balance_after: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Transaction {
            id: Uuid::now_v7(),
            user,
            kind,
            amount,
            balance_after,
            reason: reason.into(),
            related_link: None,
            related_page: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_link(mut self, link: LinkId) -> Self {
        self.related_link = Some(link);
        self
    }

    pub fn with_page(mut self, page: PageId) -> Self {
        self.related_page = Some(page);
        self
    }
}

/// Credit settlement state of a link edge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CreditStatus {
    /// Awarded into the earner's pending pool, inside the hold window.
    Pending,

    /// Survived the hold window; converted to spendable balance.
    Awarded,

    /// Link died inside the hold window; pending credits reversed.
    ClawedBack,
}

/// A directed edge in the exchange graph: `source` hosts a link on one of
/// their inventory pages pointing at `target`'s URL.
///
/// Created only by a successful exchange transaction; mutated only by the
/// maintenance job (liveness, indexation, settlement), never by direct
/// user action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkEdge {
    pub id: LinkId,

    /// Owner of the hosting inventory page.
    pub source: UserId,

    /// User whose URL receives the link.
    pub target: UserId,

    /// The hosting inventory page.
    pub source_page: PageId,

    /// Destination URL the anchor points at.
    pub target_url: String,

    pub anchor_text: String,
    pub anchor_type: AnchorType,

    /// Hop distance between source and target measured at creation time.
    /// 999 means the pair was unconnected.
    pub hop_distance_at_creation: u32,

    /// Credits awarded to the source when the link settles.
    pub credits_awarded: Decimal,
    pub credit_status: CreditStatus,

    /// Liveness/indexation as last observed by the external link checker.
    pub is_live: bool,
    pub is_indexed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkEdge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: UserId,
        target: UserId,
        source_page: PageId,
        target_url: impl Into<String>,
        anchor_text: impl Into<String>,
        anchor_type: AnchorType,
        hop_distance_at_creation: u32,
        credits_awarded: Decimal,
    ) -> Self {
        let now = Utc::now();
        LinkEdge {
            id: Uuid::now_v7(),
            source,
            target,
            source_page,
            target_url: target_url.into(),
            anchor_text: anchor_text.into(),
            anchor_type,
            hop_distance_at_creation,
            credits_awarded,
            credit_status: CreditStatus::Pending,
            is_live: true,
            is_indexed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.source == self.target {
            return Err("self-edges are not allowed".to_string());
        }
        if self.credits_awarded < Decimal::ZERO {
            return Err("credits_awarded must not be negative".to_string());
        }
        Ok(())
    }
}

/// Category of link anchor text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnchorType {
    /// The site/brand name.
    Branded,

    /// Bare domain of the destination URL.
    Naked,

    /// The literal target keyword. Rationed hardest.
    Keyword,

    /// Keyword wrapped in a natural-language template.
    Partial,

    /// Fixed pool of generic phrases ("click here", ...).
    Generic,

    /// Related-term variant derived from the keyword.
    Lsi,
}

impl AnchorType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnchorType::Branded => "branded",
            AnchorType::Naked => "naked",
            AnchorType::Keyword => "keyword",
            AnchorType::Partial => "partial",
            AnchorType::Generic => "generic",
            AnchorType::Lsi => "lsi",
        }
    }

    pub const ALL: [AnchorType; 6] = [
        AnchorType::Branded,
        AnchorType::Naked,
        AnchorType::Keyword,
        AnchorType::Partial,
        AnchorType::Generic,
        AnchorType::Lsi,
    ];
}

impl std::fmt::Display for AnchorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which surface requested an allocation or a score. The two surfaces
/// carry different eligibility bars and independent anchor rate limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Owned-network distribution. Lower stakes, trust bar 30.
    Distribution,

    /// The credit exchange. Credits have real value, trust bar 40.
    Exchange,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Distribution => "distribution",
            Channel::Exchange => "exchange",
        }
    }
}

/// Append-only record of one anchor allocation. The allocator reads this
/// log back to compute realized distributions and enforce repetition caps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnchorUsage {
    pub id: Uuid,
    pub user: UserId,
    pub target_url: String,
    pub anchor_text: String,
    pub anchor_type: AnchorType,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
}

impl AnchorUsage {
    pub fn new(
        user: UserId,
        target_url: impl Into<String>,
        anchor_text: impl Into<String>,
        anchor_type: AnchorType,
        channel: Channel,
    ) -> Self {
        AnchorUsage {
            id: Uuid::now_v7(),
            user,
            target_url: target_url.into(),
            anchor_text: anchor_text.into(),
            anchor_type,
            channel,
            created_at: Utc::now(),
        }
    }
}

/// Severity bucket of a domain's risk score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket thresholds: low < 30, medium < 50, high < 70, critical ≥ 70.
    pub fn from_risk_score(risk: u8) -> Self {
        match risk {
            0..=29 => RiskLevel::Low,
            30..=49 => RiskLevel::Medium,
            50..=69 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One factor applied during scoring, kept for auditability. The full
/// trail answers "why was this domain accepted/rejected" and must be
/// reproducible from the same inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreFactor {
    /// Stable machine name, e.g. "spam_keyword".
    pub name: String,

    /// Signed impact on the trust score.
    pub impact: i32,

    /// Human-readable description.
    pub detail: String,
}

impl ScoreFactor {
    pub fn new(name: &str, impact: i32, detail: impl Into<String>) -> Self {
        ScoreFactor {
            name: name.to_string(),
            impact,
            detail: detail.into(),
        }
    }
}

/// Memoized scoring result, upsertable per domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainScore {
    pub domain: String,
    pub trust_score: u8,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub domain_rating: u32,
    pub factors: Vec<ScoreFactor>,
    pub scored_at: DateTime<Utc>,
}

/// Canonical unordered user pair. Orders the two ids so `(a, b)` and
/// `(b, a)` map to the same key in pair-indexed storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub lo: UserId,
    pub hi: UserId,
}

impl PairKey {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            PairKey { lo: a, hi: b }
        } else {
            PairKey { lo: b, hi: a }
        }
    }

    /// 32-byte storage key: lo bytes then hi bytes.
    pub fn as_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..16].copy_from_slice(self.lo.as_bytes());
        out[16..].copy_from_slice(self.hi.as_bytes());
        out
    }
}

/// Cool-down entry for a user pair after a safety violation. Routes
/// between blacklisted pairs are always rejected until expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlacklistEntry {
    pub pair: PairKey,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn new(pair: PairKey, reason: impl Into<String>, ttl_days: i64) -> Self {
        let now = Utc::now();
        BlacklistEntry {
            pair,
            reason: reason.into(),
            created_at: now,
            expires_at: now + chrono::Duration::days(ttl_days),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Externally supplied metadata for a domain, input to scoring. The core
/// never fetches these; an upstream data provider does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DomainMeta {
    pub domain_rating: u32,
    pub trust_flow: u32,
    pub traffic_estimate: u64,

    /// Age in months, when the provider knows it.
    pub age_months: Option<u32>,
}
