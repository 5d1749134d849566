//! Chronicle Core — storage contracts for the event store.
//!
//! This crate defines the envelope and snapshot types, the error taxonomy,
//! and the [`EventStore`](store::EventStore) and
//! [`SnapshotStore`](store::SnapshotStore) traits that every backend
//! implements. It contains no infrastructure code.

pub mod envelope;
pub mod error;
pub mod snapshot;
pub mod store;
