//! Test doubles for the Chronicle storage contracts.
//!
//! [`InMemoryEventStore`] and [`InMemorySnapshotStore`] satisfy the full
//! contracts, including conflict semantics, so callers can be tested without
//! a database. The `Failing*` stores always return an infrastructure error
//! for error-path tests.

pub mod event_store;
pub mod snapshot_store;

pub use event_store::{FailingEventStore, InMemoryEventStore};
pub use snapshot_store::{FailingSnapshotStore, InMemorySnapshotStore};
