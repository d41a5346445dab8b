use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;

use crate::{
    domain::{AccessDecision, AccessSummary, DenialReason, Subscription, SubscriptionStatus},
    ports::{
        notifier::{Notification, NotifierPort},
        subscriptions::SubscriptionPort,
    },
};

use super::{notify_best_effort, DomainLogic, Error};

/// A scanned token, authenticated by possession alone.
pub struct RedeemCredentialRequest {
    pub token: String,
}

#[derive(Debug)]
pub struct RedeemCredentialResponse {
    pub decision: AccessDecision,
}

/// Decide physical entry for a scanned credential.
///
/// Verification failures are structured denials, never errors — the
/// access point must degrade gracefully at the door. Checks run in
/// order: token signature and embedded expiry, then subscription status,
/// then the subscription's own validity window. A granted scan counts a
/// visit, awards points, and stamps `last_access_at`. Every attempt that
/// reaches a known subscription leaves an audit notification with its
/// owner.
impl<D, N, G> Service<RedeemCredentialRequest> for DomainLogic<D, N, G>
where
    D: SubscriptionPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = RedeemCredentialResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RedeemCredentialRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        let signer = self.signer.clone();
        Box::pin(async move {
            let claims = match signer.verify(&req.token) {
                Ok(claims) => claims,
                Err(err) => {
                    tracing::debug!(error = %err, "credential rejected at the token layer");
                    return Ok(RedeemCredentialResponse {
                        decision: AccessDecision::Denied(DenialReason::InvalidOrExpiredToken),
                    });
                }
            };

            let subscription = database.get_subscription(claims.subscription).await?;
            let now = Utc::now();

            if subscription.status != SubscriptionStatus::Active {
                return Ok(deny(notifier.as_ref(), &subscription, DenialReason::SubscriptionNotActive).await);
            }
            if !subscription.expires_at.map_or(false, |expires| expires > now) {
                return Ok(deny(notifier.as_ref(), &subscription, DenialReason::SubscriptionExpired).await);
            }

            let mut updated = subscription.clone();
            updated.record_visit(now);
            let stored = match database
                .update_subscription_if_status(updated, SubscriptionStatus::Active)
                .await
            {
                Ok(stored) => stored,
                // The subscription changed under the scan; deny rather than
                // grant against a state that no longer holds.
                Err(crate::ports::subscriptions::Error::StalePrecondition { .. }) => {
                    return Ok(
                        deny(notifier.as_ref(), &subscription, DenialReason::SubscriptionNotActive)
                            .await,
                    );
                }
                Err(err) => return Err(err.into()),
            };

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::access(
                    "Access granted",
                    format!("Welcome back. Visits used: {}.", stored.visits_used),
                ),
            )
            .await;

            Ok(RedeemCredentialResponse {
                decision: AccessDecision::Granted(AccessSummary {
                    subscription_id: stored.id,
                    member_code: stored.member_code.clone(),
                    user_id: stored.user_id,
                    plan_id: stored.plan_id,
                    expires_at: stored.expires_at,
                    visits_used: stored.visits_used,
                    points: stored.points,
                }),
            })
        })
    }
}

async fn deny<N: NotifierPort>(
    notifier: &N,
    subscription: &Subscription,
    reason: DenialReason,
) -> RedeemCredentialResponse {
    notify_best_effort(
        notifier,
        subscription.user_id,
        Notification::access(
            "Access denied",
            "A scan of your membership credential was denied.",
        )
        .with_metadata(serde_json::json!({ "reason": reason.as_str() })),
    )
    .await;
    RedeemCredentialResponse {
        decision: AccessDecision::Denied(reason),
    }
}
