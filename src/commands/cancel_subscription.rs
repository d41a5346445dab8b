use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Subscription, SubscriptionStatus},
    ports::{
        notifier::{Notification, NotifierPort},
        subscriptions::SubscriptionPort,
    },
};

use super::{notify_best_effort, DomainLogic, Error};

pub struct CancelSubscriptionRequest {
    pub subscription_id: Uuid,
    /// Caller identity; only the owner may cancel.
    pub user_id: Uuid,
}

#[derive(Debug)]
pub struct CancelSubscriptionResponse {
    pub subscription: Subscription,
}

/// User cancellation, legal from any non-terminal status.
///
/// The entitlement ends immediately: `expires_at` is pulled to now and
/// the stored credential is cleared, so the next redeem of any
/// outstanding token denies on subscription status.
impl<D, N, G> Service<CancelSubscriptionRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = CancelSubscriptionResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CancelSubscriptionRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            let subscription = database.get_subscription(req.subscription_id).await?;
            if subscription.user_id != req.user_id {
                return Err(Error::Forbidden("not the owner of this subscription".into()));
            }
            if !subscription
                .status
                .can_transition_to(SubscriptionStatus::CancelledByUser)
            {
                return Err(Error::Conflict(
                    format!("subscription already ended ({})", subscription.status).into(),
                ));
            }

            let prior = subscription.status;
            let mut updated = subscription;
            updated.status = SubscriptionStatus::CancelledByUser;
            updated.expires_at = Some(Utc::now());
            updated.access_token = None;
            updated.access_token_expires_at = None;
            let stored = database.update_subscription_if_status(updated, prior).await?;

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::membership(
                    "Subscription cancelled",
                    "Your membership has been cancelled at your request.",
                ),
            )
            .await;

            Ok(CancelSubscriptionResponse { subscription: stored })
        })
    }
}
