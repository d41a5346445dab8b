use uuid::Uuid;

/// Immutable catalog entry describing a membership product.
///
/// Plans are created and edited by administrators; subscriptions reference
/// them but never own them.
#[derive(Clone, Debug, PartialEq)]
pub struct MembershipPlan {
    pub id: Uuid,
    pub tier: PlanTier,
    /// Billing cadence; only meaningful for VIP plans.
    pub billing_period: Option<BillingPeriod>,
    /// How many days a subscription stays valid after activation.
    pub duration_days: u32,
    pub price: f64,
    pub permissions: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanTier {
    General,
    Vip,
}

impl PlanTier {
    /// VIP purchases go through identity verification and admin review
    /// before they can be activated.
    pub fn requires_review(&self) -> bool {
        matches!(self, PlanTier::Vip)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}
