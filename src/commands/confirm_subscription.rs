use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{subscription::generate_member_code, Subscription, SubscriptionStatus},
    ports::{
        catalog::CatalogPort,
        notifier::{Notification, NotifierPort},
        subscriptions::SubscriptionPort,
    },
};

use super::{notify_best_effort, DomainLogic, Error};

const MAX_CODE_ATTEMPTS: u32 = 16;

pub struct ConfirmSubscriptionRequest {
    pub subscription_id: Uuid,
    /// Caller identity; only the owner may confirm.
    pub user_id: Uuid,
}

#[derive(Debug)]
pub struct ConfirmSubscriptionResponse {
    pub subscription: Subscription,
}

/// User confirmation of an approved VIP request, inside the window the
/// approval opened.
///
/// The deadline is evaluated lazily right here: a late confirm commits
/// the `Expired` transition itself and reports the lapse, rather than
/// relying on a scheduler to have done it first. Success is the
/// once-only transition into `Active`: member code assigned, validity
/// window set from the plan, access token issued.
impl<D, N, G> Service<ConfirmSubscriptionRequest> for DomainLogic<D, N, G>
where
    D: CatalogPort + SubscriptionPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = ConfirmSubscriptionResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConfirmSubscriptionRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        let signer = self.signer.clone();
        Box::pin(async move {
            let subscription = database.get_subscription(req.subscription_id).await?;
            if subscription.user_id != req.user_id {
                return Err(Error::Forbidden("not the owner of this subscription".into()));
            }
            if subscription.status != SubscriptionStatus::AwaitingConfirmation {
                return Err(Error::Conflict(
                    format!("subscription is {}, not awaiting confirmation", subscription.status)
                        .into(),
                ));
            }

            let now = Utc::now();
            let deadline = subscription.confirmation_deadline.ok_or_else(|| {
                Error::Conflict("subscription has no confirmation deadline".into())
            })?;
            if now > deadline {
                let mut lapsed = subscription.clone();
                lapsed.status = SubscriptionStatus::Expired;
                match database
                    .update_subscription_if_status(lapsed, SubscriptionStatus::AwaitingConfirmation)
                    .await
                {
                    Ok(_) => {}
                    // Another writer got there first; the lapse stands either way.
                    Err(crate::ports::subscriptions::Error::StalePrecondition { .. }) => {}
                    Err(err) => return Err(err.into()),
                }
                return Err(Error::Expired("confirmation window has passed".into()));
            }

            let plan = database.get_plan(subscription.plan_id).await?;
            let issued = signer.issue(subscription.id);
            let mut updated = subscription;
            updated.access_token = Some(issued.token);
            updated.access_token_expires_at = Some(issued.expires_at);

            let mut rng = rand::thread_rng();
            let mut attempt = 0;
            let stored = loop {
                attempt += 1;
                updated.activate(generate_member_code(&mut rng), now, plan.duration_days);
                match database
                    .update_subscription_if_status(
                        updated.clone(),
                        SubscriptionStatus::AwaitingConfirmation,
                    )
                    .await
                {
                    Ok(stored) => break stored,
                    Err(crate::ports::subscriptions::Error::DuplicateMemberCode(_))
                        if attempt < MAX_CODE_ATTEMPTS => {}
                    Err(err) => return Err(err.into()),
                }
            };

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::membership(
                    "Subscription activated",
                    format!(
                        "Your membership is now active and valid until {}.",
                        stored
                            .expires_at
                            .map(|d| d.format("%Y-%m-%d").to_string())
                            .unwrap_or_default()
                    ),
                ),
            )
            .await;

            Ok(ConfirmSubscriptionResponse { subscription: stored })
        })
    }
}
