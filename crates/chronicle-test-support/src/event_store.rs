//! In-memory `EventStore` doubles.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use chronicle_core::envelope::EventEnvelope;
use chronicle_core::error::EventStoreError;
use chronicle_core::store::{
    EventStore, NEW_AGGREGATE_VERSION, check_aggregate_type, check_append,
};

/// A behavioral in-memory event store.
///
/// Satisfies the full `EventStore` contract — atomic batch appends,
/// optimistic-concurrency conflicts, all read shapes, the version sentinel —
/// while holding everything in a process-local map. The mutex is held across
/// the version check and the insert, so appends are linearizable without a
/// uniqueness constraint.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: Mutex<HashMap<(String, Uuid), Vec<EventEnvelope>>>,
    closed: AtomicBool,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), EventStoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EventStoreError::Infrastructure(
                "event store is closed".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[EventEnvelope],
    ) -> Result<(), EventStoreError> {
        self.ensure_open()?;
        check_append(aggregate_type, aggregate_id, expected_version, events)?;
        if events.is_empty() {
            return Ok(());
        }

        let mut streams = self.streams.lock().unwrap();
        let stream = streams
            .entry((aggregate_type.to_owned(), aggregate_id))
            .or_default();
        let actual = stream
            .last()
            .map_or(NEW_AGGREGATE_VERSION, |event| event.version);
        if actual != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        stream.extend_from_slice(events);
        Ok(())
    }

    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.ensure_open()?;
        check_aggregate_type(aggregate_type)?;
        let streams = self.streams.lock().unwrap();
        Ok(streams
            .get(&(aggregate_type.to_owned(), aggregate_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_events_since(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let events = self.get_events(aggregate_type, aggregate_id).await?;
        Ok(events
            .into_iter()
            .filter(|event| event.version > version)
            .collect())
    }

    async fn get_events_by_type(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let events = self.get_events(aggregate_type, aggregate_id).await?;
        Ok(events
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect())
    }

    async fn get_all_events(
        &self,
        aggregate_type: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.ensure_open()?;
        check_aggregate_type(aggregate_type)?;
        let streams = self.streams.lock().unwrap();
        let mut events: Vec<EventEnvelope> = streams
            .iter()
            .filter(|((stream_type, _), _)| stream_type == aggregate_type)
            .flat_map(|(_, stream)| stream.iter().cloned())
            .collect();
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.version.cmp(&b.version))
        });
        Ok(events
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_event_stream(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        self.ensure_open()?;
        let streams = self.streams.lock().unwrap();
        let mut events: Vec<EventEnvelope> = streams
            .values()
            .flat_map(|stream| stream.iter())
            .filter(|event| event.timestamp > since)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.timestamp);
        events.truncate(limit as usize);
        Ok(events)
    }

    async fn get_aggregate_version(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<i64, EventStoreError> {
        self.ensure_open()?;
        check_aggregate_type(aggregate_type)?;
        let streams = self.streams.lock().unwrap();
        Ok(streams
            .get(&(aggregate_type.to_owned(), aggregate_id))
            .and_then(|stream| stream.last())
            .map_or(NEW_AGGREGATE_VERSION, |event| event.version))
    }

    async fn close(&self) -> Result<(), EventStoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// An event store whose every operation fails with an infrastructure error.
/// Useful for testing error-handling paths in callers.
#[derive(Debug, Default)]
pub struct FailingEventStore;

impl FailingEventStore {
    fn refused<T>() -> Result<T, EventStoreError> {
        Err(EventStoreError::Infrastructure(
            "connection refused".to_owned(),
        ))
    }
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn save_events(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[EventEnvelope],
    ) -> Result<(), EventStoreError> {
        Self::refused()
    }

    async fn get_events(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        Self::refused()
    }

    async fn get_events_since(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
        _version: i64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        Self::refused()
    }

    async fn get_events_by_type(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
        _event_type: &str,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        Self::refused()
    }

    async fn get_all_events(
        &self,
        _aggregate_type: &str,
        _offset: u32,
        _limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        Self::refused()
    }

    async fn get_event_stream(
        &self,
        _since: DateTime<Utc>,
        _limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        Self::refused()
    }

    async fn get_aggregate_version(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
    ) -> Result<i64, EventStoreError> {
        Self::refused()
    }

    async fn close(&self) -> Result<(), EventStoreError> {
        Self::refused()
    }
}
