use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::resource::ResourceRef;

/// Loyalty points credited to the user's active subscription when an
/// administrator marks their booking completed.
pub const COMPLETION_AWARD_POINTS: u32 = 10;

/// A reservation of guest seats against one slot of one resource.
///
/// The `guest_count` is admitted against the matching slot at creation
/// and released back exactly once, tracked through the status lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource: ResourceRef,
    pub date: NaiveDate,
    pub slot_id: String,
    /// Display label of the slot at booking time, e.g. "10:00 AM - 11:00 AM".
    pub slot_label: String,
    pub guest_count: u32,
    pub special_request: Option<String>,
    pub price: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Live bookings hold seats and block duplicates by the same user.
    pub fn is_live(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    /// Legal predecessor for each payment move: unpaid → paid → refunded.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Unpaid, PaymentStatus::Paid)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
