use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus},
    ports::{bookings::BookingPort, ledger::LedgerPort},
};

use super::{DomainLogic, Error};

pub struct CancelBookingRequest {
    pub booking_id: Uuid,
    /// Caller identity; only the owner may cancel.
    pub user_id: Uuid,
}

#[derive(Debug)]
pub struct CancelBookingResponse {
    pub booking: Booking,
}

/// User cancellation of a pending or confirmed booking.
///
/// The status move is a compare-and-swap, so the seats are released
/// exactly once no matter how many cancel calls race. A release that
/// fails because an administrator replaced the day's schedule in the
/// meantime is logged and the cancellation stands.
impl<D, N, G> Service<CancelBookingRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + LedgerPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = CancelBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CancelBookingRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let booking = database.get_booking(req.booking_id).await?;
            if booking.user_id != req.user_id {
                return Err(Error::Forbidden("not the owner of this booking".into()));
            }
            if !booking.status.is_live() {
                return Err(Error::Conflict(
                    format!("booking is {}, only pending or confirmed bookings can be cancelled", booking.status)
                        .into(),
                ));
            }

            let prior = booking.status;
            let mut updated = booking;
            updated.status = BookingStatus::Cancelled;
            let stored = database.update_booking_if_status(updated, prior).await?;

            if let Err(err) = database
                .release(stored.resource, stored.date, &stored.slot_id, stored.guest_count)
                .await
            {
                tracing::warn!(
                    booking_id = %stored.id,
                    resource = %stored.resource,
                    error = ?err,
                    "seats could not be released; schedule may have been replaced"
                );
            }

            Ok(CancelBookingResponse { booking: stored })
        })
    }
}
