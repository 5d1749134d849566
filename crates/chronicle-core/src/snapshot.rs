//! Point-in-time materialized aggregate state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cached materialization of an aggregate's state at a known version.
///
/// Snapshots are a replay shortcut, not a source of truth: the event log
/// alone is sufficient to rebuild any aggregate, and a snapshot can be
/// deleted and recreated at any time. The store does not verify that
/// `version` corresponds to an appended event; that is the caller's
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Aggregate this snapshot belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate category.
    pub aggregate_type: String,
    /// Event version the snapshot state represents.
    pub version: i64,
    /// Serialized aggregate state.
    pub state: Vec<u8>,
    /// Time the snapshot was created.
    pub created_at: DateTime<Utc>,
}
