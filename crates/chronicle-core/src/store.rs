//! Event store and snapshot store contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::envelope::EventEnvelope;
use crate::error::EventStoreError;
use crate::snapshot::Snapshot;

/// Version sentinel for an aggregate that has no events yet.
pub const NEW_AGGREGATE_VERSION: i64 = -1;

/// Append-only, versioned event log with optimistic concurrency control.
///
/// Within one aggregate, version order and insertion order coincide; no read
/// ever presents version N before N-1. Cross-aggregate ordering is
/// timestamp-approximate only and must not be relied upon for correctness.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Atomically appends `events` to the aggregate stream.
    ///
    /// `expected_version` must equal the highest version currently recorded
    /// for the aggregate ([`NEW_AGGREGATE_VERSION`] for a brand-new one),
    /// and the caller must have numbered the batch
    /// `expected_version + 1, expected_version + 2, …`. Once the arguments
    /// validate, an empty batch is a no-op. Either the whole batch becomes
    /// durable and visible to readers, or none of it does.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::ConcurrencyConflict`] if another writer advanced
    ///   the aggregate past `expected_version` — retryable after re-reading
    ///   the current version.
    /// - [`EventStoreError::InvalidVersion`] or
    ///   [`EventStoreError::Validation`] for malformed input, rejected
    ///   before any I/O.
    /// - [`EventStoreError::Infrastructure`] for storage failures.
    async fn save_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[EventEnvelope],
    ) -> Result<(), EventStoreError>;

    /// Loads the full history of an aggregate, ordered by ascending version.
    /// Returns an empty vec for an unknown aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] on storage failure.
    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Loads events with versions strictly greater than `version`, ordered
    /// ascending. Used to resume replay after loading a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] on storage failure.
    async fn get_events_since(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Loads an aggregate's events restricted to one `event_type`, ordered
    /// by ascending version.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] on storage failure.
    async fn get_events_by_type(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Loads events across every aggregate of `aggregate_type`, ordered by
    /// timestamp then version, windowed by `offset`/`limit`. Used to rebuild
    /// read-models for an entire aggregate category.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] on storage failure.
    async fn get_all_events(
        &self,
        aggregate_type: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Loads events across all aggregate types with timestamps strictly
    /// after `since`, ordered by timestamp, capped at `limit`. Feeds generic
    /// projections that observe all system activity.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] on storage failure.
    async fn get_event_stream(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError>;

    /// Returns the highest version recorded for the aggregate, or
    /// [`NEW_AGGREGATE_VERSION`] if it has no events. Fetches no event
    /// bodies.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] on storage failure.
    async fn get_aggregate_version(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<i64, EventStoreError>;

    /// Releases the underlying storage resources. Operations invoked after
    /// close fail with [`EventStoreError::Infrastructure`].
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] if shutdown fails.
    async fn close(&self) -> Result<(), EventStoreError>;
}

/// Side-store of point-in-time aggregate state, independent of the event
/// log's transaction boundary. Losing every snapshot can never corrupt the
/// log; it only increases replay cost.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upserts the single latest snapshot for the aggregate (overwrite
    /// semantics — no snapshot history is retained).
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Validation`] for an empty aggregate type
    /// and [`EventStoreError::Infrastructure`] on storage failure.
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError>;

    /// Fetches the latest snapshot for the aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::AggregateNotFound`] if no snapshot exists
    /// and [`EventStoreError::Infrastructure`] on storage failure.
    async fn get_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Snapshot, EventStoreError>;

    /// Removes any snapshot for the aggregate. Deleting a missing snapshot
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] on storage failure.
    async fn delete_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<(), EventStoreError>;
}

/// Rejects an empty aggregate type before any I/O is attempted.
///
/// # Errors
///
/// Returns [`EventStoreError::Validation`] if `aggregate_type` is empty.
pub fn check_aggregate_type(aggregate_type: &str) -> Result<(), EventStoreError> {
    if aggregate_type.is_empty() {
        return Err(EventStoreError::Validation(
            "aggregate_type must not be empty".to_owned(),
        ));
    }
    Ok(())
}

/// Validates a `save_events` batch before any I/O is attempted.
///
/// Every backend calls this so the append contract is uniform: the expected
/// version may not be below the [`NEW_AGGREGATE_VERSION`] sentinel, the
/// batch must be numbered contiguously from `expected_version + 1`, and each
/// envelope must address the aggregate named in the call.
///
/// # Errors
///
/// Returns [`EventStoreError::Validation`] for an empty aggregate type or a
/// mis-addressed envelope, and [`EventStoreError::InvalidVersion`] for a bad
/// expected version or a non-monotonic batch.
pub fn check_append(
    aggregate_type: &str,
    aggregate_id: Uuid,
    expected_version: i64,
    events: &[EventEnvelope],
) -> Result<(), EventStoreError> {
    check_aggregate_type(aggregate_type)?;

    if expected_version < NEW_AGGREGATE_VERSION {
        return Err(EventStoreError::InvalidVersion {
            aggregate_id,
            reason: format!(
                "expected_version {expected_version} is below the new-aggregate sentinel \
                 {NEW_AGGREGATE_VERSION}"
            ),
        });
    }

    let mut next = expected_version + 1;
    for event in events {
        if event.aggregate_id != aggregate_id || event.aggregate_type != aggregate_type {
            return Err(EventStoreError::Validation(format!(
                "envelope {} addresses {}/{}, call addresses {aggregate_type}/{aggregate_id}",
                event.event_id, event.aggregate_type, event.aggregate_id
            )));
        }
        if event.version != next {
            return Err(EventStoreError::InvalidVersion {
                aggregate_id,
                reason: format!(
                    "batch version {} out of order, expected {next}",
                    event.version
                ),
            });
        }
        next += 1;
    }

    Ok(())
}
