//! In-memory `SnapshotStore` doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use chronicle_core::error::EventStoreError;
use chronicle_core::snapshot::Snapshot;
use chronicle_core::store::{SnapshotStore, check_aggregate_type};

/// A behavioral in-memory snapshot store: one snapshot per aggregate,
/// latest wins.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<(String, Uuid), Snapshot>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        check_aggregate_type(&snapshot.aggregate_type)?;
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.insert(
            (snapshot.aggregate_type.clone(), snapshot.aggregate_id),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn get_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Snapshot, EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let snapshots = self.snapshots.lock().unwrap();
        snapshots
            .get(&(aggregate_type.to_owned(), aggregate_id))
            .cloned()
            .ok_or_else(|| EventStoreError::AggregateNotFound {
                aggregate_type: aggregate_type.to_owned(),
                aggregate_id,
            })
    }

    async fn delete_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<(), EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.remove(&(aggregate_type.to_owned(), aggregate_id));
        Ok(())
    }
}

/// A snapshot store whose every operation fails with an infrastructure
/// error.
#[derive(Debug, Default)]
pub struct FailingSnapshotStore;

impl FailingSnapshotStore {
    fn refused<T>() -> Result<T, EventStoreError> {
        Err(EventStoreError::Infrastructure(
            "connection refused".to_owned(),
        ))
    }
}

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn save_snapshot(&self, _snapshot: &Snapshot) -> Result<(), EventStoreError> {
        Self::refused()
    }

    async fn get_snapshot(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
    ) -> Result<Snapshot, EventStoreError> {
        Self::refused()
    }

    async fn delete_snapshot(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
    ) -> Result<(), EventStoreError> {
        Self::refused()
    }
}
