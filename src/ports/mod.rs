pub mod bookings;
pub mod catalog;
pub mod credentials;
pub mod ledger;
pub mod notifier;
pub mod subscriptions;
