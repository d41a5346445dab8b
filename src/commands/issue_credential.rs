use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Subscription, SubscriptionStatus},
    ports::{
        credentials::{CredentialPort, ScannableArtifact},
        subscriptions::SubscriptionPort,
    },
    token::TokenSigner,
};

use super::{DomainLogic, Error};

/// Fetch a fresh credential for the caller's active subscription.
pub struct GetMyCredentialRequest {
    pub user_id: Uuid,
}

/// Re-issue the credential of a specific subscription.
pub struct RefreshCredentialRequest {
    pub subscription_id: Uuid,
    /// Caller identity; only the owner may refresh.
    pub user_id: Uuid,
}

#[derive(Debug)]
pub struct CredentialResponse {
    pub token: String,
    pub token_expires_at: DateTime<Utc>,
    pub artifact: ScannableArtifact,
    pub subscription: Subscription,
}

/// Issue a fresh short-lived token and record it on the subscription.
///
/// Issuing is a refresh: nothing previously handed out is invalidated
/// server-side, since a token carries its own expiry and redeeming
/// re-checks the subscription status anyway.
async fn issue_for<D, G>(
    database: &D,
    credentials: &G,
    signer: &TokenSigner,
    subscription: Subscription,
) -> Result<CredentialResponse, Error>
where
    D: SubscriptionPort,
    G: CredentialPort,
{
    let issued = signer.issue(subscription.id);
    let mut updated = subscription;
    updated.access_token = Some(issued.token.clone());
    updated.access_token_expires_at = Some(issued.expires_at);
    let stored = database
        .update_subscription_if_status(updated, SubscriptionStatus::Active)
        .await?;

    let artifact = credentials.render_scannable(&issued.token).await?;
    Ok(CredentialResponse {
        token: issued.token,
        token_expires_at: issued.expires_at,
        artifact,
        subscription: stored,
    })
}

impl<D, N, G> Service<GetMyCredentialRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: 'static,
    G: CredentialPort + 'static,
{
    type Response = CredentialResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetMyCredentialRequest) -> Self::Future {
        let database = self.database.clone();
        let credentials = self.credentials.clone();
        let signer = Arc::clone(&self.signer);
        Box::pin(async move {
            let subscription = database
                .find_active_for_user(req.user_id)
                .await?
                .ok_or_else(|| Error::NotFound("no active subscription found".into()))?;
            issue_for(database.as_ref(), credentials.as_ref(), &signer, subscription).await
        })
    }
}

impl<D, N, G> Service<RefreshCredentialRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: 'static,
    G: CredentialPort + 'static,
{
    type Response = CredentialResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RefreshCredentialRequest) -> Self::Future {
        let database = self.database.clone();
        let credentials = self.credentials.clone();
        let signer = Arc::clone(&self.signer);
        Box::pin(async move {
            let subscription = database.get_subscription(req.subscription_id).await?;
            if subscription.user_id != req.user_id {
                return Err(Error::Forbidden("not the owner of this subscription".into()));
            }
            if subscription.status != SubscriptionStatus::Active {
                return Err(Error::Conflict(
                    format!("subscription is {}, must be active", subscription.status).into(),
                ));
            }
            issue_for(database.as_ref(), credentials.as_ref(), &signer, subscription).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::inline::InlineCredentialRenderer;
    use crate::adapters::database::memory::MemoryDatabase;
    use crate::commands::cancel_subscription::CancelSubscriptionRequest;
    use crate::commands::subscribe::SubscribeRequest;
    use crate::commands::ErrorKind;
    use crate::domain::{MembershipPlan, PlanTier};
    use crate::ports::notifier::MockNotifierPort;
    use speculoos::prelude::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn domain(
        database: MemoryDatabase,
    ) -> DomainLogic<MemoryDatabase, MockNotifierPort, InlineCredentialRenderer> {
        let mut notifier = MockNotifierPort::new();
        notifier.expect_notify().returning(|_, _| Ok(()));
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

    #[tokio::test]
    async fn test_get_my_credential_issues_and_records() {
        // GIVEN a user with an active subscription
        let database = MemoryDatabase::default();
        let plan = general_plan();
        database.insert_plan(plan.clone()).unwrap();
        let user_id = Uuid::new_v4();
        let mut domain = domain(database.clone());
        domain
            .call(SubscribeRequest {
                user_id,
                plan_id: plan.id,
            })
            .await
            .unwrap();

        // WHEN they fetch their credential
        let res = domain.call(GetMyCredentialRequest { user_id }).await.unwrap();

        // THEN a token is issued, rendered, and recorded on the record
        assert_that!(res.artifact.content_type.as_str()).contains("text/plain");
        let stored = database.get_subscription(res.subscription.id).await.unwrap();
        assert_that!(stored.access_token).is_some().is_equal_to(res.token.clone());
        assert_that!(stored.access_token_expires_at)
            .is_some()
            .is_equal_to(res.token_expires_at);
    }

    #[tokio::test]
    async fn test_refresh_replaces_the_recorded_token() {
        let database = MemoryDatabase::default();
        let plan = general_plan();
        database.insert_plan(plan.clone()).unwrap();
        let user_id = Uuid::new_v4();
        let mut domain = domain(database);
        let sub = domain
            .call(SubscribeRequest {
                user_id,
                plan_id: plan.id,
            })
            .await
            .unwrap()
            .subscription;

        let first = domain
            .call(RefreshCredentialRequest {
                subscription_id: sub.id,
                user_id,
            })
            .await
            .unwrap();
        let second = domain
            .call(RefreshCredentialRequest {
                subscription_id: sub.id,
                user_id,
            })
            .await
            .unwrap();

        assert_that!(second.subscription.access_token)
            .is_some()
            .is_equal_to(second.token.clone());
        assert_that!(second.token).is_not_equal_to(first.token);
    }

    #[tokio::test]
    async fn test_no_active_subscription_is_not_found() {
        let database = MemoryDatabase::default();
        let mut domain = domain(database);

        let res = domain
            .call(GetMyCredentialRequest {
                user_id: Uuid::new_v4(),
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_refresh_of_cancelled_subscription_conflicts() {
        let database = MemoryDatabase::default();
        let plan = general_plan();
        database.insert_plan(plan.clone()).unwrap();
        let user_id = Uuid::new_v4();
        let mut domain = domain(database);
        let sub = domain
            .call(SubscribeRequest {
                user_id,
                plan_id: plan.id,
            })
            .await
            .unwrap()
            .subscription;
        domain
            .call(CancelSubscriptionRequest {
                subscription_id: sub.id,
                user_id,
            })
            .await
            .unwrap();

        let res = domain
            .call(RefreshCredentialRequest {
                subscription_id: sub.id,
                user_id,
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Conflict);
    }
}
