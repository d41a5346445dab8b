use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus, Subscription},
    ports::{bookings::BookingPort, subscriptions::SubscriptionPort},
};

use super::{DomainLogic, Error};

pub struct ListMyBookingsRequest {
    pub user_id: Uuid,
}

pub struct ListBookingsRequest {
    pub status: Option<BookingStatus>,
}

/// A user's bookings together with a snapshot of their membership.
#[derive(Debug)]
pub struct ListMyBookingsResponse {
    pub bookings: Vec<Booking>,
    pub membership: Option<MembershipSummary>,
}

#[derive(Debug)]
pub struct ListBookingsResponse {
    pub bookings: Vec<Booking>,
}

/// How far into their membership the user is, shown alongside their
/// bookings.
#[derive(Clone, Debug, PartialEq)]
pub struct MembershipSummary {
    pub subscription_id: Uuid,
    pub member_code: Option<String>,
    pub plan_id: Uuid,
    pub start_date: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub points: u32,
    pub usage_percent: Option<f64>,
}

impl MembershipSummary {
    fn of(subscription: &Subscription, now: DateTime<Utc>) -> Self {
        Self {
            subscription_id: subscription.id,
            member_code: subscription.member_code.clone(),
            plan_id: subscription.plan_id,
            start_date: subscription.start_date,
            expires_at: subscription.expires_at,
            points: subscription.points,
            usage_percent: subscription.usage_percent(now),
        }
    }
}

impl<D, N, G> Service<ListMyBookingsRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + SubscriptionPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = ListMyBookingsResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListMyBookingsRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let bookings = database.list_bookings_for_user(req.user_id).await?;
            let membership = database
                .find_active_for_user(req.user_id)
                .await?
                .map(|sub| MembershipSummary::of(&sub, Utc::now()));
            Ok(ListMyBookingsResponse {
                bookings,
                membership,
            })
        })
    }
}

/// Administrator listing, optionally filtered by status.
impl<D, N, G> Service<ListBookingsRequest> for DomainLogic<D, N, G>
where
    D: BookingPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = ListBookingsResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListBookingsRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let bookings = database.list_bookings(req.status).await?;
            Ok(ListBookingsResponse { bookings })
        })
    }
}
