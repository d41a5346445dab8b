use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

/// Minutes a user has to confirm after an administrator approves their
/// VIP request.
pub const CONFIRMATION_WINDOW_MINUTES: i64 = 15;

/// Loyalty points awarded for each granted access scan.
pub const VISIT_AWARD_POINTS: u32 = 10;

/// A time-boxed membership entitlement held by a single user.
///
/// Records are retained forever as an audit trail; terminal statuses are
/// final and a user can hold at most one subscription in a non-terminal
/// status at a time.
#[derive(Clone, Debug, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    /// Human-facing member code (`AH-NNN`).
    ///
    /// Assigned exactly once, at the transition into [`SubscriptionStatus::Active`],
    /// and globally unique.
    pub member_code: Option<String>,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    /// National identity number, collected for VIP plans only.
    pub national_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// End of the confirmation window opened by admin approval.
    pub confirmation_deadline: Option<DateTime<Utc>>,
    /// The most recently issued access token, with its expiry.
    ///
    /// Advisory only: redeeming validates the presented token's own
    /// signature and expiry, not these fields.
    pub access_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub visits_used: u32,
    pub points: u32,
    pub rejection_reason: Option<String>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// A freshly purchased subscription, before any workflow progress.
    pub fn new(user_id: Uuid, plan_id: Uuid, status: SubscriptionStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_code: None,
            user_id,
            plan_id,
            status,
            national_id: None,
            start_date: None,
            expires_at: None,
            confirmation_deadline: None,
            access_token: None,
            access_token_expires_at: None,
            visits_used: 0,
            points: 0,
            rejection_reason: None,
            last_access_at: None,
            created_at: now,
        }
    }

    /// Move into `Active`, assigning the member code and validity window.
    pub fn activate(&mut self, member_code: String, now: DateTime<Utc>, duration_days: u32) {
        self.status = SubscriptionStatus::Active;
        self.member_code = Some(member_code);
        self.start_date = Some(now);
        self.expires_at = Some(now + Duration::days(i64::from(duration_days)));
    }

    /// Whether this record currently entitles its holder to anything.
    ///
    /// Timers are evaluated lazily: a record still marked `Active` whose
    /// expiry has passed does not entitle access, even before the
    /// background sweep has caught up with it.
    pub fn entitles_access(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.expires_at.map_or(false, |expires| expires > now)
    }

    /// Record one granted access scan.
    pub fn record_visit(&mut self, now: DateTime<Utc>) {
        self.visits_used += 1;
        self.points += VISIT_AWARD_POINTS;
        self.last_access_at = Some(now);
    }

    /// How much of the validity window has elapsed, as a percentage.
    ///
    /// `None` until the subscription has been activated.
    pub fn usage_percent(&self, now: DateTime<Utc>) -> Option<f64> {
        let (start, end) = (self.start_date?, self.expires_at?);
        let total = (end - start).num_milliseconds();
        if total <= 0 {
            return Some(100.0);
        }
        let used = (now - start).num_milliseconds();
        Some(((used as f64 / total as f64) * 100.0).clamp(0.0, 100.0))
    }
}

/// Generate a candidate member code.
///
/// Uniqueness is enforced by the store at commit time; callers retry on a
/// collision.
pub fn generate_member_code(rng: &mut impl Rng) -> String {
    format!("AH-{}", rng.gen_range(100..1000))
}

/// Deadline of the confirmation window opened by an admin approval.
pub fn confirmation_deadline(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(CONFIRMATION_WINDOW_MINUTES)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    /// VIP purchase made, waiting for the user to submit their national id.
    PendingIdVerification,
    /// National id submitted, waiting for an administrator to review it.
    WaitingAdminReview,
    /// Approved; the user must confirm before the deadline.
    AwaitingConfirmation,
    Active,
    Expired,
    Rejected,
    CancelledByUser,
}

impl SubscriptionStatus {
    /// Terminal statuses are final; the record is kept only as audit trail.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Expired
                | SubscriptionStatus::Rejected
                | SubscriptionStatus::CancelledByUser
        )
    }

    /// The closed transition table of the subscription lifecycle.
    ///
    /// `CancelledByUser` is reachable from every non-terminal status.
    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        match (self, next) {
            (_, CancelledByUser) => !self.is_terminal(),
            (PendingIdVerification, WaitingAdminReview) => true,
            (WaitingAdminReview, AwaitingConfirmation) => true,
            (WaitingAdminReview, Rejected) => true,
            (AwaitingConfirmation, Active) => true,
            (AwaitingConfirmation, Expired) => true,
            (Active, Expired) => true,
            _ => false,
        }
    }

    /// Stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::PendingIdVerification => "pending_id_verification",
            SubscriptionStatus::WaitingAdminReview => "waiting_admin_review",
            SubscriptionStatus::AwaitingConfirmation => "awaiting_confirmation",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Rejected => "rejected",
            SubscriptionStatus::CancelledByUser => "cancelled_by_user",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use speculoos::prelude::*;

    #[rstest]
    #[case(SubscriptionStatus::PendingIdVerification, SubscriptionStatus::WaitingAdminReview, true)]
    #[case(SubscriptionStatus::WaitingAdminReview, SubscriptionStatus::AwaitingConfirmation, true)]
    #[case(SubscriptionStatus::WaitingAdminReview, SubscriptionStatus::Rejected, true)]
    #[case(SubscriptionStatus::AwaitingConfirmation, SubscriptionStatus::Active, true)]
    #[case(SubscriptionStatus::AwaitingConfirmation, SubscriptionStatus::Expired, true)]
    #[case(SubscriptionStatus::Active, SubscriptionStatus::Expired, true)]
    #[case(SubscriptionStatus::PendingIdVerification, SubscriptionStatus::Active, false)]
    #[case(SubscriptionStatus::Active, SubscriptionStatus::WaitingAdminReview, false)]
    #[case(SubscriptionStatus::Expired, SubscriptionStatus::Active, false)]
    #[case(SubscriptionStatus::Rejected, SubscriptionStatus::CancelledByUser, false)]
    fn test_transition_table(
        #[case] from: SubscriptionStatus,
        #[case] to: SubscriptionStatus,
        #[case] legal: bool,
    ) {
        assert_that!(from.can_transition_to(to)).is_equal_to(legal);
    }

    #[rstest]
    fn test_cancel_reachable_from_all_live_statuses(
        #[values(
            SubscriptionStatus::PendingIdVerification,
            SubscriptionStatus::WaitingAdminReview,
            SubscriptionStatus::AwaitingConfirmation,
            SubscriptionStatus::Active
        )]
        from: SubscriptionStatus,
    ) {
        assert_that!(from.can_transition_to(SubscriptionStatus::CancelledByUser)).is_true();
    }

    #[test]
    fn test_activate_sets_window_and_code() {
        let now = Utc::now();
        let mut sub = Subscription::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            SubscriptionStatus::AwaitingConfirmation,
            now,
        );

        sub.activate("AH-482".to_string(), now, 30);

        assert_that!(sub.status).is_equal_to(SubscriptionStatus::Active);
        assert_that!(sub.member_code).is_some().is_equal_to("AH-482".to_string());
        assert_that!(sub.expires_at)
            .is_some()
            .is_equal_to(now + Duration::days(30));
    }

    #[test]
    fn test_entitles_access_is_lazy_about_expiry() {
        let now = Utc::now();
        let mut sub = Subscription::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            SubscriptionStatus::AwaitingConfirmation,
            now - Duration::days(40),
        );
        sub.activate("AH-100".to_string(), now - Duration::days(40), 30);

        // Still marked active, but the window has lapsed.
        assert_that!(sub.status).is_equal_to(SubscriptionStatus::Active);
        assert_that!(sub.entitles_access(now)).is_false();
    }

    #[test]
    fn test_usage_percent_midway() {
        let now = Utc::now();
        let mut sub = Subscription::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            SubscriptionStatus::AwaitingConfirmation,
            now,
        );
        sub.activate("AH-200".to_string(), now - Duration::days(15), 30);

        let usage = sub.usage_percent(now).unwrap();
        assert_that!(usage).is_close_to(50.0, 0.1);
    }

    #[test]
    fn test_member_code_format() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_member_code(&mut rng);
            let digits = code.strip_prefix("AH-").unwrap();
            let n: u32 = digits.parse().unwrap();
            assert_that!(n).is_greater_than_or_equal_to(100);
            assert_that!(n).is_less_than(1000);
        }
    }
}
