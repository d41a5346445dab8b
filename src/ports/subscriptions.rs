use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Subscription, SubscriptionStatus};

/// Persistence for membership subscriptions.
///
/// All mutations are optimistic: `update_subscription_if_status` commits
/// only when the stored record is still in the expected prior status, so
/// racing transitions (a user action against the expiry sweep, say) see
/// whichever write won and fail cleanly otherwise. The store also owns
/// the write-side uniqueness invariants: one live subscription per user,
/// one live subscription per national id, globally unique member codes.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SubscriptionPort {
    async fn get_subscription(&self, id: Uuid) -> Result<Subscription, Error>;

    /// Insert a new record, rejecting it when the user already holds a
    /// subscription in a non-terminal status.
    async fn insert_subscription(&self, subscription: Subscription) -> Result<(), Error>;

    /// Replace the stored record, but only if its status still equals
    /// `expected`. Uniqueness invariants are re-checked at commit.
    async fn update_subscription_if_status(
        &self,
        subscription: Subscription,
        expected: SubscriptionStatus,
    ) -> Result<Subscription, Error>;

    /// The user's subscription currently marked active, if any.
    async fn find_active_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, Error>;

    async fn list_by_status(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, Error>;

    /// Active subscriptions whose validity window has lapsed, for the
    /// background sweep.
    async fn list_lapsed_active(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("subscription {0} does not exist")]
    SubscriptionNotFound(Uuid),

    /// The user already holds a subscription in a non-terminal status.
    #[error("user {0} already holds a live subscription")]
    DuplicateLiveSubscription(Uuid),

    /// One physical identity maps to at most one live VIP entitlement.
    #[error("national id is already linked to a live subscription")]
    DuplicateNationalId,

    #[error("member code {0} is already taken")]
    DuplicateMemberCode(String),

    /// The optimistic precondition failed: another transition committed
    /// first.
    #[error("subscription {id} is {actual}, expected {expected}")]
    StalePrecondition {
        id: Uuid,
        expected: SubscriptionStatus,
        actual: SubscriptionStatus,
    },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
