use std::{borrow::Cow, sync::Arc};

use uuid::Uuid;

use crate::ports::notifier::{Notification, NotifierPort};
use crate::token::TokenSigner;

pub mod cancel_booking;
pub mod cancel_subscription;
pub mod complete_booking;
pub mod confirm_subscription;
pub mod create_booking;
pub mod issue_credential;
pub mod list_bookings;
pub mod payment;
pub mod redeem_credential;
pub mod review_booking;
pub mod review_subscription;
pub mod schedule;
pub mod submit_national_id;
pub mod subscribe;
pub mod sweep_expired;

/// The engine's use cases, each exposed as a `tower::Service`
/// implementation on this struct.
pub struct DomainLogic<D, N, G> {
    database: Arc<D>,
    notifier: Arc<N>,
    credentials: Arc<G>,
    signer: Arc<TokenSigner>,
}

impl<D, N, G> DomainLogic<D, N, G> {
    pub fn new(database: Arc<D>, notifier: Arc<N>, credentials: Arc<G>, signer: TokenSigner) -> Self {
        Self {
            database,
            notifier,
            credentials,
            signer: Arc::new(signer),
        }
    }
}

impl<D, N, G> Clone for DomainLogic<D, N, G> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            notifier: self.notifier.clone(),
            credentials: self.credentials.clone(),
            signer: self.signer.clone(),
        }
    }
}

/// Dispatch a notification without letting a delivery failure surface.
///
/// A committed state transition stands whether or not the user could be
/// reached.
pub(crate) async fn notify_best_effort<N: NotifierPort>(
    notifier: &N,
    user_id: Uuid,
    notification: Notification,
) {
    if let Err(err) = notifier.notify(user_id, notification).await {
        tracing::warn!(%user_id, error = ?err, "notification dispatch failed");
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("catalog port error: {0:?}")]
    Catalog(#[from] crate::ports::catalog::Error),
    #[error("subscription port error: {0:?}")]
    Subscriptions(#[from] crate::ports::subscriptions::Error),
    #[error("booking port error: {0:?}")]
    Bookings(#[from] crate::ports::bookings::Error),
    #[error("ledger port error: {0:?}")]
    Ledger(#[from] crate::ports::ledger::Error),
    #[error("credential port error: {0:?}")]
    Credentials(#[from] crate::ports::credentials::Error),

    #[error("invalid request: {0}")]
    Validation(Cow<'static, str>),

    #[error("{0}")]
    NotFound(Cow<'static, str>),

    #[error("not authorized: {0}")]
    Forbidden(Cow<'static, str>),

    #[error("conflict: {0}")]
    Conflict(Cow<'static, str>),

    #[error("expired: {0}")]
    Expired(Cow<'static, str>),

    /// Capacity exhausted — distinct from a generic conflict so callers
    /// can offer alternative slots.
    #[error("slot is fully booked: {remaining} of {capacity} seats remaining, {requested} requested")]
    FullyBooked {
        capacity: u32,
        remaining: u32,
        requested: u32,
    },
}

/// Stable machine-readable classification of an [`Error`], independent of
/// the human message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    FullyBooked,
    Expired,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::FullyBooked => "fully_booked",
            ErrorKind::Expired => "expired",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use crate::ports::{bookings, catalog, ledger, subscriptions};

        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Expired(_) => ErrorKind::Expired,
            Error::FullyBooked { .. } => ErrorKind::FullyBooked,
            Error::Catalog(err) => match err {
                catalog::Error::PlanNotFound(_) | catalog::Error::ResourceNotFound(_) => {
                    ErrorKind::NotFound
                }
                catalog::Error::Adapter(_) => ErrorKind::Internal,
            },
            Error::Subscriptions(err) => match err {
                subscriptions::Error::SubscriptionNotFound(_) => ErrorKind::NotFound,
                subscriptions::Error::DuplicateLiveSubscription(_)
                | subscriptions::Error::DuplicateNationalId
                | subscriptions::Error::DuplicateMemberCode(_)
                | subscriptions::Error::StalePrecondition { .. } => ErrorKind::Conflict,
                subscriptions::Error::Adapter(_) => ErrorKind::Internal,
            },
            Error::Bookings(err) => match err {
                bookings::Error::BookingNotFound(_) => ErrorKind::NotFound,
                bookings::Error::StaleStatus { .. } | bookings::Error::StalePayment { .. } => {
                    ErrorKind::Conflict
                }
                bookings::Error::Adapter(_) => ErrorKind::Internal,
            },
            Error::Ledger(err) => match err {
                ledger::Error::ScheduleNotFound { .. }
                | ledger::Error::SlotNotFound { .. }
                | ledger::Error::ResourceNotFound(_) => ErrorKind::NotFound,
                ledger::Error::CapacityExceeded { .. } => ErrorKind::FullyBooked,
                ledger::Error::InvalidGuestCount(_) => ErrorKind::Validation,
                ledger::Error::Adapter(_) => ErrorKind::Internal,
            },
            Error::Credentials(_) => ErrorKind::Internal,
        }
    }
}
