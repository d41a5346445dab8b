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
    ports::{catalog::CatalogPort, subscriptions::SubscriptionPort},
};

use super::{DomainLogic, Error};

/// Attempts at allocating a unique member code before giving up.
const MAX_CODE_ATTEMPTS: u32 = 16;

pub struct SubscribeRequest {
    pub user_id: Uuid,
    pub plan_id: Uuid,
}

#[derive(Debug)]
pub struct SubscribeResponse {
    pub subscription: Subscription,
}

/// Purchase a membership plan.
///
/// General plans activate immediately: the subscription is created
/// `Active` with its validity window, member code and a fresh access
/// token. VIP plans create a request in `PendingIdVerification`; dates,
/// code and token only appear after review and confirmation.
impl<D, N, G> Service<SubscribeRequest> for DomainLogic<D, N, G>
where
    D: CatalogPort + SubscriptionPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = SubscribeResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SubscribeRequest) -> Self::Future {
        let database = self.database.clone();
        let signer = self.signer.clone();
        Box::pin(async move {
            let plan = database.get_plan(req.plan_id).await?;
            let now = Utc::now();

            if plan.tier.requires_review() {
                let subscription = Subscription::new(
                    req.user_id,
                    plan.id,
                    SubscriptionStatus::PendingIdVerification,
                    now,
                );
                database.insert_subscription(subscription.clone()).await?;
                return Ok(SubscribeResponse { subscription });
            }

            let mut subscription =
                Subscription::new(req.user_id, plan.id, SubscriptionStatus::Active, now);
            let issued = signer.issue(subscription.id);
            subscription.access_token = Some(issued.token);
            subscription.access_token_expires_at = Some(issued.expires_at);

            let mut rng = rand::thread_rng();
            for attempt in 1..=MAX_CODE_ATTEMPTS {
                let code = generate_member_code(&mut rng);
                subscription.activate(code, now, plan.duration_days);
                match database.insert_subscription(subscription.clone()).await {
                    Ok(()) => return Ok(SubscribeResponse { subscription }),
                    Err(crate::ports::subscriptions::Error::DuplicateMemberCode(_))
                        if attempt < MAX_CODE_ATTEMPTS => {}
                    Err(err) => return Err(err.into()),
                }
            }
            Err(Error::Conflict("could not allocate a unique member code".into()))
        })
    }
}
