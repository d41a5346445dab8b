use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, PaymentStatus, ResourceRef};

/// Persistence for booking records.
///
/// Status and payment moves use the same optimistic compare-and-swap
/// discipline as the subscription store: a write commits only while the
/// stored record is still in the expected prior state. This is what makes
/// seat release once-only — the cancelled transition can succeed a single
/// time, and the release rides on it.
#[mockall::automock]
#[async_trait::async_trait]
pub trait BookingPort {
    async fn get_booking(&self, id: Uuid) -> Result<Booking, Error>;

    async fn insert_booking(&self, booking: Booking) -> Result<(), Error>;

    async fn update_booking_if_status(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> Result<Booking, Error>;

    async fn update_booking_if_payment(
        &self,
        booking: Booking,
        expected: PaymentStatus,
    ) -> Result<Booking, Error>;

    /// A pending or confirmed booking by this user for the same
    /// resource, date and slot, if one exists.
    async fn find_live_booking(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
        date: NaiveDate,
        slot_id: &str,
    ) -> Result<Option<Booking>, Error>;

    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, Error>;

    async fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("booking {0} does not exist")]
    BookingNotFound(Uuid),

    /// The optimistic precondition failed: another transition committed
    /// first.
    #[error("booking {id} is {actual}, expected {expected}")]
    StaleStatus {
        id: Uuid,
        expected: BookingStatus,
        actual: BookingStatus,
    },

    #[error("booking {id} payment is {actual}, expected {expected}")]
    StalePayment {
        id: Uuid,
        expected: PaymentStatus,
        actual: PaymentStatus,
    },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
