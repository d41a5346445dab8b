use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{NaiveDate, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus, PaymentStatus, ResourceRef},
    ports::{
        bookings::BookingPort,
        catalog::CatalogPort,
        ledger,
        ledger::LedgerPort,
        notifier::{Notification, NotifierPort},
        subscriptions::SubscriptionPort,
    },
};

use super::{notify_best_effort, DomainLogic, Error};

pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub resource: ResourceRef,
    pub date: NaiveDate,
    pub slot_id: String,
    pub guest_count: u32,
    pub special_request: Option<String>,
    pub price: f64,
}

#[derive(Debug)]
pub struct CreateBookingResponse {
    pub booking: Booking,
}

/// Book guest seats against a slot.
///
/// Eligibility first: a resource restricted to certain plans requires
/// the caller to hold an active, unexpired subscription on one of them.
/// Then the duplicate check, then the ledger's atomic admission — the
/// only step that contends for capacity. The booking record lands in
/// `Pending`; if persisting it fails after the seats were admitted, the
/// admission is compensated before the error surfaces.
impl<D, N, G> Service<CreateBookingRequest> for DomainLogic<D, N, G>
where
    D: CatalogPort + SubscriptionPort + BookingPort + LedgerPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = CreateBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            if req.guest_count == 0 {
                return Err(Error::Validation("guest count must be at least 1".into()));
            }

            let resource = database.get_resource(req.resource).await?;
            let now = Utc::now();

            if !resource.is_open_to_all() {
                let subscription = database.find_active_for_user(req.user_id).await?;
                match subscription {
                    None => {
                        return Err(Error::Forbidden(
                            "an active membership is required to book this".into(),
                        ))
                    }
                    Some(sub)
                        if !sub.entitles_access(now)
                            || !resource.allowed_plan_ids.contains(&sub.plan_id) =>
                    {
                        return Err(Error::Forbidden(
                            "your membership plan does not allow booking this".into(),
                        ))
                    }
                    Some(_) => {}
                }
            }

            if database
                .find_live_booking(req.user_id, req.resource, req.date, &req.slot_id)
                .await?
                .is_some()
            {
                return Err(Error::Conflict(
                    "you already have a booking for this slot".into(),
                ));
            }

            let slot = match database
                .admit(req.resource, req.date, &req.slot_id, req.guest_count)
                .await
            {
                Ok(slot) => slot,
                Err(ledger::Error::CapacityExceeded {
                    capacity,
                    reserved,
                    requested,
                }) => {
                    return Err(Error::FullyBooked {
                        capacity,
                        remaining: capacity.saturating_sub(reserved),
                        requested,
                    })
                }
                Err(err) => return Err(err.into()),
            };

            let booking = Booking {
                id: Uuid::new_v4(),
                user_id: req.user_id,
                resource: req.resource,
                date: req.date,
                slot_id: slot.id.clone(),
                slot_label: slot.label.clone(),
                guest_count: req.guest_count,
                special_request: req.special_request,
                price: req.price,
                status: BookingStatus::Pending,
                payment_status: PaymentStatus::Unpaid,
                created_at: now,
            };

            if let Err(err) = database.insert_booking(booking.clone()).await {
                // Compensate the admission; the seats must not stay held
                // by a booking that was never persisted.
                if let Err(release_err) = database
                    .release(req.resource, req.date, &req.slot_id, req.guest_count)
                    .await
                {
                    tracing::warn!(
                        resource = %req.resource,
                        error = ?release_err,
                        "failed to release seats after booking insert failure"
                    );
                }
                return Err(err.into());
            }

            notify_best_effort(
                notifier.as_ref(),
                req.user_id,
                Notification::system(
                    "Booking request received",
                    format!(
                        "Your {} booking for {} at {} is awaiting approval.",
                        req.resource.kind(),
                        req.date,
                        booking.slot_label
                    ),
                )
                .with_metadata(serde_json::json!({ "bookingId": booking.id })),
            )
            .await;

            Ok(CreateBookingResponse { booking })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::inline::InlineCredentialRenderer;
    use crate::adapters::database::memory::MemoryDatabase;
    use crate::commands::subscribe::SubscribeRequest;
    use crate::commands::ErrorKind;
    use crate::domain::{MembershipPlan, PlanTier, Resource, Slot};
    use crate::ports::notifier::MockNotifierPort;
    use crate::token::TokenSigner;
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

    fn seeded_facility(database: &MemoryDatabase, allowed_plan_ids: Vec<Uuid>, capacity: u32) -> ResourceRef {
        let resource = ResourceRef::Facility(Uuid::new_v4());
        database
            .insert_resource(Resource {
                resource,
                name: "Indoor pool".to_string(),
                allowed_plan_ids,
            })
            .unwrap();
        database
            .seed_schedule(
                resource,
                date(),
                vec![Slot::new("s1", "10:00 AM - 11:00 AM", capacity)],
            )
            .unwrap();
        resource
    }

    fn booking_request(user_id: Uuid, resource: ResourceRef, guest_count: u32) -> CreateBookingRequest {
        CreateBookingRequest {
            user_id,
            resource,
            date: date(),
            slot_id: "s1".to_string(),
            guest_count,
            special_request: None,
            price: 25.0,
        }
    }

    #[tokio::test]
    async fn test_booking_an_open_resource() {
        // GIVEN an unrestricted facility with capacity
        let database = MemoryDatabase::default();
        let resource = seeded_facility(&database, vec![], 4);
        let mut domain = domain(database.clone());

        // WHEN a user without any membership books two seats
        let res = domain
            .call(booking_request(Uuid::new_v4(), resource, 2))
            .await
            .unwrap();

        // THEN the booking is pending and the seats are held
        assert_that!(res.booking.status).is_equal_to(BookingStatus::Pending);
        assert_that!(res.booking.payment_status).is_equal_to(PaymentStatus::Unpaid);
        let schedules = database.schedules(resource).await.unwrap();
        assert_that!(schedules[0].slots[0].reserved).is_equal_to(2);
    }

    #[tokio::test]
    async fn test_plan_gated_resource_requires_membership() {
        // GIVEN a facility restricted to a VIP plan
        let database = MemoryDatabase::default();
        let vip_plan_id = Uuid::new_v4();
        let resource = seeded_facility(&database, vec![vip_plan_id], 4);
        let mut domain = domain(database);

        // WHEN a user without an active subscription books
        let res = domain.call(booking_request(Uuid::new_v4(), resource, 1)).await;

        // THEN the request is forbidden
        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_wrong_plan_is_forbidden_and_right_plan_books() {
        // GIVEN a gated facility and a member on the allowed plan
        let database = MemoryDatabase::default();
        let allowed = MembershipPlan {
            id: Uuid::new_v4(),
            tier: PlanTier::General,
            billing_period: None,
            duration_days: 30,
            price: 49.0,
            permissions: vec![],
        };
        let other = MembershipPlan {
            id: Uuid::new_v4(),
            ..allowed.clone()
        };
        database.insert_plan(allowed.clone()).unwrap();
        database.insert_plan(other.clone()).unwrap();
        let resource = seeded_facility(&database, vec![allowed.id], 4);
        let (member, outsider) = (Uuid::new_v4(), Uuid::new_v4());
        let mut domain = domain(database);
        domain
            .call(SubscribeRequest {
                user_id: member,
                plan_id: allowed.id,
            })
            .await
            .unwrap();
        domain
            .call(SubscribeRequest {
                user_id: outsider,
                plan_id: other.id,
            })
            .await
            .unwrap();

        // WHEN both try to book
        let allowed_res = domain.call(booking_request(member, resource, 1)).await;
        let forbidden_res = domain.call(booking_request(outsider, resource, 1)).await;

        // THEN only the allowed plan gets through
        assert_that!(allowed_res).is_ok();
        assert_that!(forbidden_res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_duplicate_live_booking_conflicts() {
        let database = MemoryDatabase::default();
        let resource = seeded_facility(&database, vec![], 4);
        let user_id = Uuid::new_v4();
        let mut domain = domain(database);
        domain.call(booking_request(user_id, resource, 1)).await.unwrap();

        let res = domain.call(booking_request(user_id, resource, 1)).await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_full_slot_reports_fully_booked() {
        // GIVEN a slot with two seats already taken by another user
        let database = MemoryDatabase::default();
        let resource = seeded_facility(&database, vec![], 2);
        let mut domain = domain(database);
        domain
            .call(booking_request(Uuid::new_v4(), resource, 2))
            .await
            .unwrap();

        // WHEN a second user requests two more
        let res = domain.call(booking_request(Uuid::new_v4(), resource, 2)).await;

        // THEN the distinct fully-booked error comes back
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::FullyBooked { remaining: 0, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_bookings_for_the_last_seats() {
        // GIVEN a slot with two remaining seats
        let database = MemoryDatabase::default();
        let resource = seeded_facility(&database, vec![], 2);
        let domain = domain(database.clone());

        // WHEN two bookings of two guests race
        let mut first = domain.clone();
        let mut second = domain.clone();
        let (a, b) = tokio::join!(
            first.call(booking_request(Uuid::new_v4(), resource, 2)),
            second.call(booking_request(Uuid::new_v4(), resource, 2))
        );
        let outcomes = vec![a, b];

        // THEN exactly one wins and the slot never overbooks
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let full = outcomes
            .iter()
            .filter(|r| matches!(r, Err(Error::FullyBooked { .. })))
            .count();
        assert_that!(wins).is_equal_to(1);
        assert_that!(full).is_equal_to(1);
        let schedules = database.schedules(resource).await.unwrap();
        assert_that!(schedules[0].slots[0].reserved).is_equal_to(2);
    }

    #[tokio::test]
    async fn test_zero_guests_is_invalid() {
        let database = MemoryDatabase::default();
        let resource = seeded_facility(&database, vec![], 2);
        let mut domain = domain(database);

        let res = domain.call(booking_request(Uuid::new_v4(), resource, 0)).await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_unknown_slot_is_not_found() {
        let database = MemoryDatabase::default();
        let resource = seeded_facility(&database, vec![], 2);
        let mut domain = domain(database);

        let mut req = booking_request(Uuid::new_v4(), resource, 1);
        req.slot_id = "missing".to_string();
        let res = domain.call(req).await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::NotFound);
    }
}
