use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Booking, PaymentStatus},
    ports::bookings::BookingPort,
};

use super::{DomainLogic, Error};

pub struct MarkPaidRequest {
    pub booking_id: Uuid,
}

pub struct MarkRefundedRequest {
    pub booking_id: Uuid,
}

#[derive(Debug)]
pub struct PaymentResponse {
    pub booking: Booking,
}

async fn move_payment<D: BookingPort>(
    database: &D,
    booking_id: Uuid,
    next: PaymentStatus,
) -> Result<PaymentResponse, Error> {
    let booking = database.get_booking(booking_id).await?;
    if !booking.payment_status.can_transition_to(next) {
        return Err(Error::Conflict(
            format!("payment is {}, cannot move to {next}", booking.payment_status).into(),
        ));
    }

    let prior = booking.payment_status;
    let mut updated = booking;
    updated.payment_status = next;
    let stored = database.update_booking_if_payment(updated, prior).await?;
    Ok(PaymentResponse { booking: stored })
}

/// Administrator payment capture: unpaid → paid.
impl<D, N, G> Service<MarkPaidRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = PaymentResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MarkPaidRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move { move_payment(database.as_ref(), req.booking_id, PaymentStatus::Paid).await })
    }
}

/// Administrator refund: paid → refunded.
impl<D, N, G> Service<MarkRefundedRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = PaymentResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MarkRefundedRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(
            async move { move_payment(database.as_ref(), req.booking_id, PaymentStatus::Refunded).await },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::inline::InlineCredentialRenderer;
    use crate::adapters::database::memory::MemoryDatabase;
    use crate::commands::create_booking::CreateBookingRequest;
    use crate::commands::ErrorKind;
    use crate::domain::{Resource, ResourceRef, Slot};
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

    async fn some_booking(
        database: &MemoryDatabase,
        domain: &mut DomainLogic<MemoryDatabase, MockNotifierPort, InlineCredentialRenderer>,
    ) -> Booking {
        let resource = ResourceRef::Facility(Uuid::new_v4());
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        database
            .insert_resource(Resource {
                resource,
                name: "Tennis court".to_string(),
                allowed_plan_ids: vec![],
            })
            .unwrap();
        database
            .seed_schedule(resource, date, vec![Slot::new("s1", "09:00", 4)])
            .unwrap();
        domain
            .call(CreateBookingRequest {
                user_id: Uuid::new_v4(),
                resource,
                date,
                slot_id: "s1".to_string(),
                guest_count: 1,
                special_request: None,
                price: 20.0,
            })
            .await
            .unwrap()
            .booking
    }

    #[tokio::test]
    async fn test_pay_then_refund() {
        let database = MemoryDatabase::default();
        let mut domain = domain(database.clone());
        let booking = some_booking(&database, &mut domain).await;

        let paid = domain
            .call(MarkPaidRequest {
                booking_id: booking.id,
            })
            .await
            .unwrap();
        assert_that!(paid.booking.payment_status).is_equal_to(PaymentStatus::Paid);

        let refunded = domain
            .call(MarkRefundedRequest {
                booking_id: booking.id,
            })
            .await
            .unwrap();
        assert_that!(refunded.booking.payment_status).is_equal_to(PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_before_payment_conflicts() {
        let database = MemoryDatabase::default();
        let mut domain = domain(database.clone());
        let booking = some_booking(&database, &mut domain).await;

        let res = domain
            .call(MarkRefundedRequest {
                booking_id: booking.id,
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_double_payment_conflicts() {
        let database = MemoryDatabase::default();
        let mut domain = domain(database.clone());
        let booking = some_booking(&database, &mut domain).await;
        domain
            .call(MarkPaidRequest {
                booking_id: booking.id,
            })
            .await
            .unwrap();

        let res = domain
            .call(MarkPaidRequest {
                booking_id: booking.id,
            })
            .await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::Conflict);
    }
}
