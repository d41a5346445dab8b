use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{booking::COMPLETION_AWARD_POINTS, Booking, BookingStatus, SubscriptionStatus},
    ports::{
        bookings::BookingPort,
        notifier::{Notification, NotifierPort},
        subscriptions::SubscriptionPort,
    },
};

use super::{notify_best_effort, DomainLogic, Error};

pub struct CompleteBookingRequest {
    pub booking_id: Uuid,
}

#[derive(Debug)]
pub struct CompleteBookingResponse {
    pub booking: Booking,
}

/// Administrator completion: confirmed → completed.
///
/// Credits a visit and loyalty points to the user's active subscription
/// if they hold one. The credit is best-effort: a subscription that
/// transitions under the race simply misses it, the completion stands.
impl<D, N, G> Service<CompleteBookingRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + SubscriptionPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = CompleteBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CompleteBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            let booking = database.get_booking(req.booking_id).await?;
            if booking.status != BookingStatus::Confirmed {
                return Err(Error::Conflict(
                    format!(
                        "booking is {}, only confirmed bookings can be completed",
                        booking.status
                    )
                    .into(),
                ));
            }

            let mut updated = booking;
            updated.status = BookingStatus::Completed;
            let stored = database
                .update_booking_if_status(updated, BookingStatus::Confirmed)
                .await?;

            if let Some(subscription) = database.find_active_for_user(stored.user_id).await? {
                let mut credited = subscription;
                credited.points += COMPLETION_AWARD_POINTS;
                credited.visits_used += 1;
                match database
                    .update_subscription_if_status(credited, SubscriptionStatus::Active)
                    .await
                {
                    Ok(_) => {}
                    Err(crate::ports::subscriptions::Error::StalePrecondition { .. }) => {
                        tracing::warn!(
                            booking_id = %stored.id,
                            "loyalty credit skipped, subscription changed during completion"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::system(
                    "Booking completed",
                    format!("Your booking for {} is completed.", stored.date),
                ),
            )
            .await;

            Ok(CompleteBookingResponse { booking: stored })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::inline::InlineCredentialRenderer;
    use crate::adapters::database::memory::MemoryDatabase;
    use crate::commands::create_booking::CreateBookingRequest;
    use crate::commands::review_booking::ApproveBookingRequest;
    use crate::commands::subscribe::SubscribeRequest;
    use crate::commands::ErrorKind;
    use crate::domain::{MembershipPlan, PlanTier, Resource, ResourceRef, Slot};
    use crate::ports::notifier::MockNotifierPort;
    use crate::token::TokenSigner;
    use chrono::NaiveDate;
    use speculoos::prelude::*;
    use std::sync::Arc;

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

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
    }

    async fn confirmed_booking(
        database: &MemoryDatabase,
        domain: &mut DomainLogic<MemoryDatabase, MockNotifierPort, InlineCredentialRenderer>,
        user_id: Uuid,
    ) -> Booking {
        let resource = ResourceRef::Activity(Uuid::new_v4());
        database
            .insert_resource(Resource {
                resource,
                name: "Yoga class".to_string(),
                allowed_plan_ids: vec![],
            })
            .unwrap();
        database
            .seed_schedule(resource, date(), vec![Slot::new("s1", "08:00", 10)])
            .unwrap();
        let booking = domain
            .call(CreateBookingRequest {
                user_id,
                resource,
                date: date(),
                slot_id: "s1".to_string(),
                guest_count: 1,
                special_request: None,
                price: 12.0,
            })
            .await
            .unwrap()
            .booking;
        domain
            .call(ApproveBookingRequest {
                booking_id: booking.id,
            })
            .await
            .unwrap()
            .booking
    }

    #[tokio::test]
    async fn test_completion_credits_the_active_subscription() {
        // GIVEN a member with an active subscription and a confirmed booking
        let database = MemoryDatabase::default();
        let plan = MembershipPlan {
            id: Uuid::new_v4(),
            tier: PlanTier::General,
            billing_period: None,
            duration_days: 30,
            price: 49.0,
            permissions: vec![],
        };
        database.insert_plan(plan.clone()).unwrap();
        let user_id = Uuid::new_v4();
        let mut domain = domain(database.clone());
        let sub = domain
            .call(SubscribeRequest {
                user_id,
                plan_id: plan.id,
            })
            .await
            .unwrap()
            .subscription;
        let booking = confirmed_booking(&database, &mut domain, user_id).await;

        // WHEN the administrator completes the booking
        let res = domain
            .call(CompleteBookingRequest {
                booking_id: booking.id,
            })
            .await
            .unwrap();

        // THEN the booking is done and the membership earned its credit
        assert_that!(res.booking.status).is_equal_to(BookingStatus::Completed);
        let stored = database.get_subscription(sub.id).await.unwrap();
        assert_that!(stored.points).is_equal_to(COMPLETION_AWARD_POINTS);
        assert_that!(stored.visits_used).is_equal_to(1);
    }

    #[tokio::test]
    async fn test_completion_without_a_membership_still_completes() {
        let database = MemoryDatabase::default();
        let mut domain = domain(database.clone());
        let booking = confirmed_booking(&database, &mut domain, Uuid::new_v4()).await;

        let res = domain
            .call(CompleteBookingRequest {
                booking_id: booking.id,
            })
            .await
            .unwrap();

        assert_that!(res.booking.status).is_equal_to(BookingStatus::Completed);
    }

    #[tokio::test]
    async fn test_only_confirmed_bookings_complete() {
        // GIVEN a booking still pending
        let database = MemoryDatabase::default();
        let mut domain = domain(database.clone());
        let resource = ResourceRef::Activity(Uuid::new_v4());
        database
            .insert_resource(Resource {
                resource,
                name: "Yoga class".to_string(),
                allowed_plan_ids: vec![],
            })
            .unwrap();
        database
            .seed_schedule(resource, date(), vec![Slot::new("s1", "08:00", 10)])
            .unwrap();
        let booking = domain
            .call(CreateBookingRequest {
                user_id: Uuid::new_v4(),
                resource,
                date: date(),
                slot_id: "s1".to_string(),
                guest_count: 1,
                special_request: None,
                price: 12.0,
            })
            .await
            .unwrap()
            .booking;

        // WHEN the administrator completes it directly
        let res = domain
            .call(CompleteBookingRequest {
                booking_id: booking.id,
            })
            .await;

        // THEN the move is refused
        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Conflict);
    }
}
