//! Reservation and access-control engine for a membership venue
//! platform.
//!
//! Two coupled subsystems carry all the invariants: the slot capacity
//! ledger, whose atomic admission keeps any slot from ever overbooking
//! under concurrent requests, and the membership subscription state
//! machine, which turns a purchase into an active, renewable, revocable
//! entitlement and issues the short-lived scanned credential enforced at
//! the door.
//!
//! Layout follows hexagonal lines: [`domain`] holds the pure types and
//! lifecycle rules, [`ports`] the traits for every external collaborator
//! (stores, notifier, credential renderer), [`commands`] the use cases
//! as `tower::Service` implementations, [`token`] the stateless signed
//! credential, and [`adapters`] the in-memory implementations.

pub mod adapters;
pub mod commands;
pub mod domain;
pub mod ports;
pub mod token;
