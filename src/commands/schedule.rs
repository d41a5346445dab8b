use std::{
    collections::HashSet,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::NaiveDate;
use tower::Service;

use crate::{
    domain::{ResourceRef, Schedule, Slot},
    ports::ledger::LedgerPort,
};

use super::{DomainLogic, Error};

/// Administrative replace-or-insert of a day's slots.
///
/// New slots start with zero seats reserved. Replacing a date that
/// already has live bookings does not reconcile their admitted seats —
/// advisory configuration, flagged as an accepted operational risk in
/// the ledger contract.
pub struct UpsertScheduleRequest {
    pub resource: ResourceRef,
    pub date: NaiveDate,
    pub slots: Vec<SlotSpec>,
}

/// Administrator's description of one slot.
pub struct SlotSpec {
    pub id: String,
    pub label: String,
    pub capacity: u32,
}

pub struct RemoveScheduleRequest {
    pub resource: ResourceRef,
    pub date: NaiveDate,
}

pub struct GetSchedulesRequest {
    pub resource: ResourceRef,
}

#[derive(Debug)]
pub struct ScheduleResponse {
    pub schedule: Schedule,
}

#[derive(Debug)]
pub struct GetSchedulesResponse {
    pub schedules: Vec<Schedule>,
}

impl<D, N, G> Service<UpsertScheduleRequest> for DomainLogic<D, N, G>
where
    D: LedgerPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = ScheduleResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: UpsertScheduleRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            if req.slots.is_empty() {
                return Err(Error::Validation("a schedule needs at least one slot".into()));
            }
            let mut seen = HashSet::new();
            for spec in &req.slots {
                if spec.id.trim().is_empty() {
                    return Err(Error::Validation("slot ids must not be empty".into()));
                }
                if !seen.insert(spec.id.as_str()) {
                    return Err(Error::Validation(
                        format!("duplicate slot id {}", spec.id).into(),
                    ));
                }
            }

            let slots = req
                .slots
                .into_iter()
                .map(|spec| Slot::new(spec.id, spec.label, spec.capacity))
                .collect();
            let schedule = database.upsert_schedule(req.resource, req.date, slots).await?;
            Ok(ScheduleResponse { schedule })
        })
    }
}

impl<D, N, G> Service<RemoveScheduleRequest> for DomainLogic<D, N, G>
where
    D: LedgerPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = ();
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RemoveScheduleRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            database.remove_schedule(req.resource, req.date).await?;
            Ok(())
        })
    }
}

impl<D, N, G> Service<GetSchedulesRequest> for DomainLogic<D, N, G>
where
    D: LedgerPort + 'static,
    N: 'static,
    G: 'static,
{
    type Response = GetSchedulesResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetSchedulesRequest) -> Self::Future {
        let database = self.database.clone();
        Box::pin(async move {
            let schedules = database.schedules(req.resource).await?;
            Ok(GetSchedulesResponse { schedules })
        })
    }
}
