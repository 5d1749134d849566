//! Event envelope — the unit of storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of one domain event belonging to one aggregate at one
/// version.
///
/// The store never interprets `data` or `metadata`; both round-trip
/// byte-exact. The two blobs are carried separately so they can use
/// different encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event identifier, assigned at creation, never reused.
    pub event_id: Uuid,
    /// Type name of the domain event; opaque to the store.
    pub event_type: String,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate category; distinct types may share an id space.
    pub aggregate_type: String,
    /// Monotonically increasing version within the aggregate stream,
    /// starting at 0.
    pub version: i64,
    /// Append time; used only for cross-aggregate time ordering, never for
    /// the per-aggregate ordering invariant.
    pub timestamp: DateTime<Utc>,
    /// Serialized event payload.
    pub data: Vec<u8>,
    /// Serialized event metadata, if any.
    pub metadata: Option<Vec<u8>>,
}
