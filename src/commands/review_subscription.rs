use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{subscription::confirmation_deadline, Subscription, SubscriptionStatus},
    ports::{notifier::Notification, notifier::NotifierPort, subscriptions::SubscriptionPort},
};

use super::{notify_best_effort, DomainLogic, Error};

const DEFAULT_REJECTION_REASON: &str = "The national id document was not accepted.";

pub struct ApproveSubscriptionRequest {
    pub subscription_id: Uuid,
}

pub struct RejectSubscriptionRequest {
    pub subscription_id: Uuid,
    pub reason: Option<String>,
}

pub struct ListSubscriptionRequestsRequest {
    pub status: Option<SubscriptionStatus>,
}

#[derive(Debug)]
pub struct ReviewSubscriptionResponse {
    pub subscription: Subscription,
}

#[derive(Debug)]
pub struct ListSubscriptionRequestsResponse {
    pub subscriptions: Vec<Subscription>,
}

/// Administrator approval of a reviewed VIP request.
///
/// Opens the confirmation window: the user has a fixed number of minutes
/// to confirm before the request lapses.
impl<D, N, G> Service<ApproveSubscriptionRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = ReviewSubscriptionResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApproveSubscriptionRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            let subscription = database.get_subscription(req.subscription_id).await?;
            if subscription.status != SubscriptionStatus::WaitingAdminReview {
                return Err(Error::Conflict(
                    format!("subscription is {}, not awaiting admin review", subscription.status)
                        .into(),
                ));
            }

            let mut updated = subscription;
            updated.status = SubscriptionStatus::AwaitingConfirmation;
            updated.confirmation_deadline = Some(confirmation_deadline(Utc::now()));
            let stored = database
                .update_subscription_if_status(updated, SubscriptionStatus::WaitingAdminReview)
                .await?;

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::membership(
                    "Subscription approved",
                    "Your membership request was approved. Confirm within 15 minutes to activate it.",
                ),
            )
            .await;

            Ok(ReviewSubscriptionResponse { subscription: stored })
        })
    }
}

/// Administrator rejection of a reviewed VIP request. Terminal.
impl<D, N, G> Service<RejectSubscriptionRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = ReviewSubscriptionResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RejectSubscriptionRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            let subscription = database.get_subscription(req.subscription_id).await?;
            if subscription.status != SubscriptionStatus::WaitingAdminReview {
                return Err(Error::Conflict(
                    format!("subscription is {}, not awaiting admin review", subscription.status)
                        .into(),
                ));
            }

            let reason = req
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());

            let mut updated = subscription;
            updated.status = SubscriptionStatus::Rejected;
            updated.rejection_reason = Some(reason.clone());
            let stored = database
                .update_subscription_if_status(updated, SubscriptionStatus::WaitingAdminReview)
                .await?;

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::membership(
                    "Subscription request rejected",
                    format!("Your membership request was rejected. Reason: {reason}"),
                ),
            )
            .await;

            Ok(ReviewSubscriptionResponse { subscription: stored })
        })
    }
}

/// Administrator listing of subscription requests, optionally filtered
/// by status.
impl<D, N, G> Service<ListSubscriptionRequestsRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = ListSubscriptionRequestsResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListSubscriptionRequestsRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let subscriptions = database.list_by_status(req.status).await?;
            Ok(ListSubscriptionRequestsResponse { subscriptions })
        })
    }
}
