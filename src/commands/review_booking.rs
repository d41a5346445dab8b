use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus},
    ports::{
        bookings::BookingPort,
        ledger::LedgerPort,
        notifier::{Notification, NotifierPort},
    },
};

use super::{notify_best_effort, DomainLogic, Error};

pub struct ApproveBookingRequest {
    pub booking_id: Uuid,
}

pub struct RejectBookingRequest {
    pub booking_id: Uuid,
}

#[derive(Debug)]
pub struct ReviewBookingResponse {
    pub booking: Booking,
}

/// Administrator approval: pending → confirmed.
impl<D, N, G> Service<ApproveBookingRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = ReviewBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApproveBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            let booking = database.get_booking(req.booking_id).await?;
            if booking.status != BookingStatus::Pending {
                return Err(Error::Conflict(
                    format!("booking is {}, not pending", booking.status).into(),
                ));
            }

            let mut updated = booking;
            updated.status = BookingStatus::Confirmed;
            let stored = database
                .update_booking_if_status(updated, BookingStatus::Pending)
                .await?;

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::system(
                    "Booking approved",
                    format!(
                        "Your booking for {} at {} is confirmed.",
                        stored.date, stored.slot_label
                    ),
                ),
            )
            .await;

            Ok(ReviewBookingResponse { booking: stored })
        })
    }
}

/// Administrator rejection: pending → cancelled.
///
/// The admitted seats go back to the slot — a rejected booking must not
/// keep holding capacity.
impl<D, N, G> Service<RejectBookingRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + LedgerPort + 'static,
    N: NotifierPort + 'static,
    G: 'static,
{
    type Response = ReviewBookingResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RejectBookingRequest) -> Self::Future {
        let database = self.database.clone();
        let notifier = self.notifier.clone();
        Box::pin(async move {
            let booking = database.get_booking(req.booking_id).await?;
            if booking.status != BookingStatus::Pending {
                return Err(Error::Conflict(
                    format!("booking is {}, not pending", booking.status).into(),
                ));
            }

            let mut updated = booking;
            updated.status = BookingStatus::Cancelled;
            let stored = database
                .update_booking_if_status(updated, BookingStatus::Pending)
                .await?;

            if let Err(err) = database
                .release(stored.resource, stored.date, &stored.slot_id, stored.guest_count)
                .await
            {
                tracing::warn!(
                    booking_id = %stored.id,
                    error = ?err,
                    "seats could not be released after rejection"
                );
            }

            notify_best_effort(
                notifier.as_ref(),
                stored.user_id,
                Notification::system(
                    "Booking rejected",
                    format!("Your booking for {} was rejected.", stored.date),
                ),
            )
            .await;

            Ok(ReviewBookingResponse { booking: stored })
        })
    }
}
