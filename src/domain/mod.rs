pub mod access;
pub mod booking;
pub mod plan;
pub mod resource;
pub mod subscription;

pub use access::{AccessDecision, AccessSummary, DenialReason};
pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use plan::{BillingPeriod, MembershipPlan, PlanTier};
pub use resource::{Resource, ResourceRef, Schedule, Slot};
pub use subscription::{Subscription, SubscriptionStatus};
