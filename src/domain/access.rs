use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of redeeming a scanned credential at a physical access point.
///
/// Denials are ordinary results, never errors: the scanner must be able
/// to degrade gracefully at the door.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessDecision {
    Granted(AccessSummary),
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    /// The token failed signature verification, was malformed, or its
    /// embedded expiry has passed.
    InvalidOrExpiredToken,
    SubscriptionNotActive,
    SubscriptionExpired,
}

impl DenialReason {
    /// Stable machine-readable reason handed to the scanning endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::InvalidOrExpiredToken => "invalid_or_expired_token",
            DenialReason::SubscriptionNotActive => "subscription_not_active",
            DenialReason::SubscriptionExpired => "subscription_expired",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the door display gets to know about a granted entry.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessSummary {
    pub subscription_id: Uuid,
    pub member_code: Option<String>,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub visits_used: u32,
    pub points: u32,
}
