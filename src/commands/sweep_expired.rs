use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;

use crate::{
    domain::SubscriptionStatus,
    ports::{
        notifier::{Notification, NotifierPort},
        subscriptions::SubscriptionPort,
    },
};

use super::{notify_best_effort, DomainLogic, Error};

/// Trigger for the periodic expiry pass.
pub struct SweepExpiredRequest;

#[derive(Debug, PartialEq, Eq)]
pub struct SweepExpiredResponse {
    /// How many subscriptions this pass moved to `Expired`.
    pub expired: usize,
}

/// Background sweep: every `Active` subscription whose validity window
/// has lapsed moves to `Expired`, with one notification per transition.
///
/// Safe to run concurrently with user actions and with itself: each
/// transition is a compare-and-swap on the prior status, so a racing
/// writer (a cancel, or another sweep) makes this pass skip the record
/// instead of expiring or notifying twice.
impl<D, N, G> Service<SweepExpiredRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = SweepExpiredResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: SweepExpiredRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            let now = Utc::now();
            let lapsed = database.list_lapsed_active(now).await?;
            let mut expired = 0;

            for subscription in lapsed {
                let mut updated = subscription.clone();
                updated.status = SubscriptionStatus::Expired;
                match database
                    .update_subscription_if_status(updated, SubscriptionStatus::Active)
                    .await
                {
                    Ok(stored) => {
                        expired += 1;
                        notify_best_effort(
                            notifier.as_ref(),
                            stored.user_id,
                            Notification::membership(
                                "Subscription expired",
                                "Your membership has expired. Renew to keep your access.",
                            ),
                        )
                        .await;
                    }
                    // A racing writer committed first; nothing left to do here.
                    Err(crate::ports::subscriptions::Error::StalePrecondition { .. }) => {}
                    Err(err) => return Err(err.into()),
                }
            }

            tracing::debug!(expired, "subscription expiry sweep finished");
            Ok(SweepExpiredResponse { expired })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::inline::InlineCredentialRenderer;
    use crate::adapters::database::memory::MemoryDatabase;
    use crate::commands::subscribe::SubscribeRequest;
    use crate::domain::{MembershipPlan, PlanTier};
    use crate::ports::notifier::MockNotifierPort;
    use crate::token::TokenSigner;
    use chrono::Duration;
    use speculoos::prelude::*;
    use std::sync::Arc;
    use uuid::Uuid;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn domain(
        database: MemoryDatabase,
        notifier: MockNotifierPort,
    ) -> DomainLogic<MemoryDatabase, MockNotifierPort, InlineCredentialRenderer> {
        DomainLogic {
            database: Arc::new(database),
            notifier: Arc::new(notifier),
            credentials: Arc::new(InlineCredentialRenderer),
            signer: Arc::new(TokenSigner::with_default_ttl(SECRET).unwrap()),
        }
    }

    fn general_plan() -> MembershipPlan {
        MembershipPlan {
            id: Uuid::new_v4(),
            tier: PlanTier::General,
            billing_period: None,
            duration_days: 30,
            price: 49.0,
            permissions: vec![],
        }
    }

    /// Activate a subscription, then backdate its validity window.
    async fn lapsed_active(database: &MemoryDatabase, plan_id: Uuid) -> Uuid {
        let mut notifier = MockNotifierPort::new();
        notifier.expect_notify().returning(|_, _| Ok(()));
        let mut domain = domain(database.clone(), notifier);
        let sub = domain
            .call(SubscribeRequest {
                user_id: Uuid::new_v4(),
                plan_id,
            })
            .await
            .unwrap()
            .subscription;
        let mut lapsed = sub.clone();
        lapsed.expires_at = Some(Utc::now() - Duration::days(1));
        database
            .update_subscription_if_status(lapsed, SubscriptionStatus::Active)
            .await
            .unwrap();
        sub.id
    }

    #[tokio::test]
    async fn test_sweep_expires_lapsed_actives_once() {
        // GIVEN one lapsed and one current active subscription
        let database = MemoryDatabase::default();
        let plan = general_plan();
        database.insert_plan(plan.clone()).unwrap();
        let lapsed_id = lapsed_active(&database, plan.id).await;
        let mut setup_notifier = MockNotifierPort::new();
        setup_notifier.expect_notify().returning(|_, _| Ok(()));
        let mut setup = domain(database.clone(), setup_notifier);
        let current = setup
            .call(SubscribeRequest {
                user_id: Uuid::new_v4(),
                plan_id: plan.id,
            })
            .await
            .unwrap()
            .subscription;

        // Exactly one expiry notification across both sweep runs below
        let mut notifier = MockNotifierPort::new();
        notifier.expect_notify().times(1).returning(|_, _| Ok(()));
        let mut domain = domain(database.clone(), notifier);

        // WHEN the sweep runs twice
        let first = domain.call(SweepExpiredRequest).await.unwrap();
        let second = domain.call(SweepExpiredRequest).await.unwrap();

        // THEN only the lapsed record expired, exactly once
        assert_that!(first.expired).is_equal_to(1);
        assert_that!(second.expired).is_equal_to(0);
        let stored = database.get_subscription(lapsed_id).await.unwrap();
        assert_that!(stored.status).is_equal_to(SubscriptionStatus::Expired);
        let untouched = database.get_subscription(current.id).await.unwrap();
        assert_that!(untouched.status).is_equal_to(SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_to_do() {
        let database = MemoryDatabase::default();
        let notifier = MockNotifierPort::new();
        let mut domain = domain(database, notifier);

        let res = domain.call(SweepExpiredRequest).await.unwrap();

        assert_that!(res.expired).is_equal_to(0);
    }
}
