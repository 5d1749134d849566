//! Event store error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for event and snapshot store operations.
///
/// The store never retries internally: conflicts and infrastructure
/// failures are both surfaced as typed variants so the caller can choose
/// retry versus fail-fast.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict: the expected version did not match
    /// reality, detected either by the pre-check or by the uniqueness
    /// constraint on insert. Retryable — reload the current version,
    /// recompute events, resubmit.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The version the caller expected.
        expected: i64,
        /// The version actually recorded.
        actual: i64,
    },

    /// No row exists for an operation that requires one (snapshot lookups).
    /// An aggregate with zero events is a valid non-error state for appends
    /// and event reads.
    #[error("aggregate not found: {aggregate_type}/{aggregate_id}")]
    AggregateNotFound {
        /// Aggregate category.
        aggregate_type: String,
        /// The aggregate that was looked up.
        aggregate_id: Uuid,
    },

    /// The caller supplied a negative version other than the `-1`
    /// new-aggregate sentinel, or a batch whose versions are not contiguous
    /// from `expected_version + 1`.
    #[error("invalid version for aggregate {aggregate_id}: {reason}")]
    InvalidVersion {
        /// The aggregate the append was addressed to.
        aggregate_id: Uuid,
        /// Why the version assignment was rejected.
        reason: String,
    },

    /// Malformed arguments, rejected before any I/O is attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// Connection, serialization, or storage-engine failure, wrapped with
    /// the failing operation and aggregate key. Never retried by the store.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
