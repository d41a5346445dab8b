use chrono::NaiveDate;

use crate::domain::{ResourceRef, Schedule, Slot};

/// The slot capacity ledger: per-resource, per-date, per-slot seat
/// accounting.
///
/// `admit` is the one operation in the system requiring true mutual
/// exclusion. An implementation must make the read-check-increment a
/// single atomic step — a conditional update at the storage layer, or a
/// lock held across the check and the write scoped to the slot. A plain
/// read-compare-write is not an acceptable implementation: two admits
/// racing for the last seats must resolve with exactly one winner.
#[mockall::automock]
#[async_trait::async_trait]
pub trait LedgerPort {
    /// Reserve `guest_count` seats against `(resource, date, slot_id)`.
    ///
    /// Commits only when `reserved + guest_count <= capacity` — the
    /// boundary is inclusive, so a request that exactly fills the slot
    /// succeeds. A slot with zero capacity never admits. Fails without
    /// side effects otherwise. `guest_count` must be at least 1.
    async fn admit(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
        slot_id: &str,
        guest_count: u32,
    ) -> Result<Slot, Error>;

    /// Return `guest_count` seats, flooring `reserved` at zero.
    ///
    /// Idempotency is the caller's responsibility: each booking releases
    /// at most once, tracked through the booking's own status transition.
    async fn release(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
        slot_id: &str,
        guest_count: u32,
    ) -> Result<Slot, Error>;

    /// Replace-or-insert a day's slot list.
    ///
    /// Advisory configuration, not transactional against live bookings:
    /// replacing a date that already has admitted seats does not
    /// reconcile the `reserved` counters. Accepted operational risk.
    async fn upsert_schedule(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
        slots: Vec<Slot>,
    ) -> Result<Schedule, Error>;

    async fn remove_schedule(&self, resource: ResourceRef, date: NaiveDate) -> Result<(), Error>;

    async fn schedules(&self, resource: ResourceRef) -> Result<Vec<Schedule>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{resource} has no schedule for {date}")]
    ScheduleNotFound {
        resource: ResourceRef,
        date: NaiveDate,
    },

    #[error("slot {slot_id} does not exist on that date")]
    SlotNotFound { slot_id: String },

    /// Admission would push `reserved` past `capacity`.
    #[error("slot full: {reserved} of {capacity} reserved, {requested} requested")]
    CapacityExceeded {
        capacity: u32,
        reserved: u32,
        requested: u32,
    },

    #[error("guest count must be at least 1, got {0}")]
    InvalidGuestCount(u32),

    #[error("{0} does not exist")]
    ResourceNotFound(ResourceRef),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
