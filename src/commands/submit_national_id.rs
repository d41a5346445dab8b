use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Subscription, SubscriptionStatus},
    ports::{catalog::CatalogPort, subscriptions::SubscriptionPort},
};

use super::{DomainLogic, Error};

pub struct SubmitNationalIdRequest {
    pub subscription_id: Uuid,
    /// Caller identity; only the owner may attach an id.
    pub user_id: Uuid,
    pub national_id: String,
}

#[derive(Debug)]
pub struct SubmitNationalIdResponse {
    pub subscription: Subscription,
}

/// Attach the national identity document to a VIP request, moving it
/// into the admin review queue.
///
/// One physical identity maps to at most one live VIP entitlement; the
/// store re-checks that at commit, so two racing submissions of the same
/// id resolve with one winner.
impl<D, N, G> Service<SubmitNationalIdRequest> for DomainLogic<D, N, G>
where
    D: CatalogPort + SubscriptionPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = SubmitNationalIdResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SubmitNationalIdRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            if req.national_id.trim().is_empty() {
                return Err(Error::Validation("national id is required".into()));
            }

            let subscription = database.get_subscription(req.subscription_id).await?;
            if subscription.user_id != req.user_id {
                return Err(Error::Forbidden("not the owner of this subscription".into()));
            }

            let plan = database.get_plan(subscription.plan_id).await?;
            if !plan.tier.requires_review() {
                return Err(Error::Validation(
                    "national id is only collected for VIP subscriptions".into(),
                ));
            }

            if subscription.status != SubscriptionStatus::PendingIdVerification {
                return Err(Error::Conflict(
                    format!("subscription is {}, not awaiting id verification", subscription.status)
                        .into(),
                ));
            }

            let mut updated = subscription;
            updated.national_id = Some(req.national_id.trim().to_string());
            updated.status = SubscriptionStatus::WaitingAdminReview;
            let stored = database
                .update_subscription_if_status(updated, SubscriptionStatus::PendingIdVerification)
                .await?;

            Ok(SubmitNationalIdResponse { subscription: stored })
        })
    }
}
