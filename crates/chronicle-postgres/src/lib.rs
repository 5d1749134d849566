//! Chronicle `PostgreSQL` backend.
//!
//! [`PgEventStore`] and [`PgSnapshotStore`] implement the `chronicle-core`
//! contracts over a shared `sqlx` connection pool. Each append is one
//! transaction and each read is one query; the pool is the only cross-call
//! state.

pub mod event_store;
pub mod schema;
pub mod snapshot_store;

pub use event_store::PgEventStore;
pub use snapshot_store::PgSnapshotStore;
