use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingStatus, MembershipPlan, PaymentStatus, Resource, ResourceRef, Schedule,
        Slot, Subscription, SubscriptionStatus,
    },
    ports::{
        bookings, bookings::BookingPort, catalog, catalog::CatalogPort, ledger,
        ledger::LedgerPort, subscriptions, subscriptions::SubscriptionPort,
    },
};

/// In-memory store implementing every persistence port behind one mutex.
///
/// The single lock is what makes `admit` a serialized atomic
/// check-then-increment: no interleaving can observe or produce
/// `reserved > capacity`. A persistent adapter must provide the same
/// guarantee with a conditional update at the storage layer.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    plans: HashMap<Uuid, MembershipPlan>,
    resources: HashMap<ResourceRef, Resource>,
    schedules: HashMap<(ResourceRef, NaiveDate), Vec<Slot>>,
    subscriptions: HashMap<Uuid, Subscription>,
    bookings: HashMap<Uuid, Booking>,
}

impl MemoryDatabase {
    /// Seed a catalog plan. Catalog CRUD is out of engine scope; this is
    /// for wiring and tests.
    pub fn insert_plan(&self, plan: MembershipPlan) -> Result<(), catalog::Error> {
        self.inner.lock()?.plans.insert(plan.id, plan);
        Ok(())
    }

    /// Seed a bookable resource. Catalog CRUD is out of engine scope.
    pub fn insert_resource(&self, resource: Resource) -> Result<(), catalog::Error> {
        self.inner
            .lock()?
            .resources
            .insert(resource.resource, resource);
        Ok(())
    }

    /// Seed a day's slots directly, bypassing command-level validation.
    pub fn seed_schedule(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
        slots: Vec<Slot>,
    ) -> Result<(), ledger::Error> {
        let mut inner = self.inner.lock()?;
        if !inner.resources.contains_key(&resource) {
            return Err(ledger::Error::ResourceNotFound(resource));
        }
        inner.schedules.insert((resource, date), slots);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogPort for MemoryDatabase {
    async fn get_plan(&self, plan_id: Uuid) -> Result<MembershipPlan, catalog::Error> {
        self.inner
            .lock()?
            .plans
            .get(&plan_id)
            .cloned()
            .ok_or(catalog::Error::PlanNotFound(plan_id))
    }

    async fn get_resource(&self, resource: ResourceRef) -> Result<Resource, catalog::Error> {
        self.inner
            .lock()?
            .resources
            .get(&resource)
            .cloned()
            .ok_or(catalog::Error::ResourceNotFound(resource))
    }
}

#[async_trait::async_trait]
impl SubscriptionPort for MemoryDatabase {
    async fn get_subscription(&self, id: Uuid) -> Result<Subscription, subscriptions::Error> {
        self.inner
            .lock()?
            .subscriptions
            .get(&id)
            .cloned()
            .ok_or(subscriptions::Error::SubscriptionNotFound(id))
    }

    async fn insert_subscription(
        &self,
        subscription: Subscription,
    ) -> Result<(), subscriptions::Error> {
        let mut inner = self.inner.lock()?;
        check_uniqueness(&inner.subscriptions, &subscription)?;
        inner.subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    async fn update_subscription_if_status(
        &self,
        subscription: Subscription,
        expected: SubscriptionStatus,
    ) -> Result<Subscription, subscriptions::Error> {
        let mut inner = self.inner.lock()?;
        let stored_status = inner
            .subscriptions
            .get(&subscription.id)
            .map(|s| s.status)
            .ok_or(subscriptions::Error::SubscriptionNotFound(subscription.id))?;
        if stored_status != expected {
            return Err(subscriptions::Error::StalePrecondition {
                id: subscription.id,
                expected,
                actual: stored_status,
            });
        }
        check_uniqueness(&inner.subscriptions, &subscription)?;
        inner
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn find_active_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, subscriptions::Error> {
        Ok(self
            .inner
            .lock()?
            .subscriptions
            .values()
            .find(|s| s.user_id == user_id && s.status == SubscriptionStatus::Active)
            .cloned())
    }

    async fn list_by_status(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, subscriptions::Error> {
        let mut subscriptions: Vec<_> = self
            .inner
            .lock()?
            .subscriptions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subscriptions)
    }

    async fn list_lapsed_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, subscriptions::Error> {
        Ok(self
            .inner
            .lock()?
            .subscriptions
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Active
                    && s.expires_at.map_or(false, |expires| expires <= now)
            })
            .cloned()
            .collect())
    }
}

/// The write-side uniqueness invariants, re-checked at every commit:
/// one live subscription per user, one live subscription per national
/// id, globally unique member codes.
fn check_uniqueness(
    subscriptions: &HashMap<Uuid, Subscription>,
    candidate: &Subscription,
) -> Result<(), subscriptions::Error> {
    let others = subscriptions.values().filter(|s| s.id != candidate.id);
    for other in others {
        if !candidate.status.is_terminal()
            && !other.status.is_terminal()
            && other.user_id == candidate.user_id
        {
            return Err(subscriptions::Error::DuplicateLiveSubscription(
                candidate.user_id,
            ));
        }
        if let (Some(code), Some(other_code)) =
            (candidate.member_code.as_deref(), other.member_code.as_deref())
        {
            if code == other_code {
                return Err(subscriptions::Error::DuplicateMemberCode(code.to_string()));
            }
        }
        if !candidate.status.is_terminal()
            && !other.status.is_terminal()
            && candidate.national_id.is_some()
            && candidate.national_id == other.national_id
        {
            return Err(subscriptions::Error::DuplicateNationalId);
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl BookingPort for MemoryDatabase {
    async fn get_booking(&self, id: Uuid) -> Result<Booking, bookings::Error> {
        self.inner
            .lock()?
            .bookings
            .get(&id)
            .cloned()
            .ok_or(bookings::Error::BookingNotFound(id))
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), bookings::Error> {
        self.inner.lock()?.bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn update_booking_if_status(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> Result<Booking, bookings::Error> {
        let mut inner = self.inner.lock()?;
        let stored_status = inner
            .bookings
            .get(&booking.id)
            .map(|b| b.status)
            .ok_or(bookings::Error::BookingNotFound(booking.id))?;
        if stored_status != expected {
            return Err(bookings::Error::StaleStatus {
                id: booking.id,
                expected,
                actual: stored_status,
            });
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn update_booking_if_payment(
        &self,
        booking: Booking,
        expected: PaymentStatus,
    ) -> Result<Booking, bookings::Error> {
        let mut inner = self.inner.lock()?;
        let stored_payment = inner
            .bookings
            .get(&booking.id)
            .map(|b| b.payment_status)
            .ok_or(bookings::Error::BookingNotFound(booking.id))?;
        if stored_payment != expected {
            return Err(bookings::Error::StalePayment {
                id: booking.id,
                expected,
                actual: stored_payment,
            });
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_live_booking(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
        date: NaiveDate,
        slot_id: &str,
    ) -> Result<Option<Booking>, bookings::Error> {
        Ok(self
            .inner
            .lock()?
            .bookings
            .values()
            .find(|b| {
                b.user_id == user_id
                    && b.resource == resource
                    && b.date == date
                    && b.slot_id == slot_id
                    && b.status.is_live()
            })
            .cloned())
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, bookings::Error> {
        let mut bookings: Vec<_> = self
            .inner
            .lock()?
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_bookings(
        &self,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, bookings::Error> {
        let mut bookings: Vec<_> = self
            .inner
            .lock()?
            .bookings
            .values()
            .filter(|b| status.map_or(true, |wanted| b.status == wanted))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}

#[async_trait::async_trait]
impl LedgerPort for MemoryDatabase {
    async fn admit(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
        slot_id: &str,
        guest_count: u32,
    ) -> Result<Slot, ledger::Error> {
        if guest_count == 0 {
            return Err(ledger::Error::InvalidGuestCount(guest_count));
        }
        // One guard covers the read, the bound check and the increment.
        let mut inner = self.inner.lock()?;
        if !inner.resources.contains_key(&resource) {
            return Err(ledger::Error::ResourceNotFound(resource));
        }
        let slot = find_slot(&mut inner, resource, date, slot_id)?;
        match slot
            .reserved
            .checked_add(guest_count)
            .filter(|&total| total <= slot.capacity)
        {
            Some(total) => {
                slot.reserved = total;
                Ok(slot.clone())
            }
            None => Err(ledger::Error::CapacityExceeded {
                capacity: slot.capacity,
                reserved: slot.reserved,
                requested: guest_count,
            }),
        }
    }

    async fn release(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
        slot_id: &str,
        guest_count: u32,
    ) -> Result<Slot, ledger::Error> {
        let mut inner = self.inner.lock()?;
        let slot = find_slot(&mut inner, resource, date, slot_id)?;
        slot.reserved = slot.reserved.saturating_sub(guest_count);
        Ok(slot.clone())
    }

    async fn upsert_schedule(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
        slots: Vec<Slot>,
    ) -> Result<Schedule, ledger::Error> {
        let mut inner = self.inner.lock()?;
        if !inner.resources.contains_key(&resource) {
            return Err(ledger::Error::ResourceNotFound(resource));
        }
        inner.schedules.insert((resource, date), slots.clone());
        Ok(Schedule { date, slots })
    }

    async fn remove_schedule(
        &self,
        resource: ResourceRef,
        date: NaiveDate,
    ) -> Result<(), ledger::Error> {
        self.inner
            .lock()?
            .schedules
            .remove(&(resource, date))
            .map(|_| ())
            .ok_or(ledger::Error::ScheduleNotFound { resource, date })
    }

    async fn schedules(&self, resource: ResourceRef) -> Result<Vec<Schedule>, ledger::Error> {
        let inner = self.inner.lock()?;
        let mut schedules: Vec<_> = inner
            .schedules
            .iter()
            .filter(|((re, _), _)| *re == resource)
            .map(|((_, date), slots)| Schedule {
                date: *date,
                slots: slots.clone(),
            })
            .collect();
        schedules.sort_by_key(|s| s.date);
        Ok(schedules)
    }
}

fn find_slot<'a>(
    inner: &'a mut Inner,
    resource: ResourceRef,
    date: NaiveDate,
    slot_id: &str,
) -> Result<&'a mut Slot, ledger::Error> {
    let slots = inner
        .schedules
        .get_mut(&(resource, date))
        .ok_or(ledger::Error::ScheduleNotFound { resource, date })?;
    slots
        .iter_mut()
        .find(|s| s.id == slot_id)
        .ok_or_else(|| ledger::Error::SlotNotFound {
            slot_id: slot_id.to_string(),
        })
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for catalog::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

impl<T> From<PoisonError<T>> for subscriptions::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

impl<T> From<PoisonError<T>> for bookings::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

impl<T> From<PoisonError<T>> for ledger::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
