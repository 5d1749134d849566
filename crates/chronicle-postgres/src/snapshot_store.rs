//! `PostgreSQL` implementation of the `SnapshotStore` contract.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use chronicle_core::error::EventStoreError;
use chronicle_core::snapshot::Snapshot;
use chronicle_core::store::{SnapshotStore, check_aggregate_type};

/// PostgreSQL-backed snapshot store.
///
/// Keeps exactly one row per aggregate (`ON CONFLICT … DO UPDATE`, latest
/// wins) and shares no transaction boundary with the event log: snapshot
/// loss only increases replay cost.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    /// Creates a new `PgSnapshotStore` over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode_row(row: &PgRow) -> Result<Snapshot, sqlx::Error> {
        Ok(Snapshot {
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            version: row.try_get("version")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn infra(operation: &str, aggregate_type: &str, aggregate_id: Uuid, error: &sqlx::Error) -> EventStoreError {
    EventStoreError::Infrastructure(format!(
        "{operation} failed for aggregate {aggregate_type}/{aggregate_id}: {error}"
    ))
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    #[tracing::instrument(skip(self, snapshot), fields(aggregate_id = %snapshot.aggregate_id, version = snapshot.version))]
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        check_aggregate_type(&snapshot.aggregate_type)?;
        sqlx::query(
            r"
            INSERT INTO snapshots (aggregate_id, aggregate_type, version, state, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_type, aggregate_id)
            DO UPDATE SET version = EXCLUDED.version,
                          state = EXCLUDED.state,
                          created_at = EXCLUDED.created_at
            ",
        )
        .bind(snapshot.aggregate_id)
        .bind(snapshot.aggregate_type.as_str())
        .bind(snapshot.version)
        .bind(snapshot.state.as_slice())
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            infra(
                "save_snapshot",
                &snapshot.aggregate_type,
                snapshot.aggregate_id,
                &e,
            )
        })?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Snapshot, EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let row = sqlx::query(
            r"
            SELECT aggregate_id, aggregate_type, version, state, created_at
            FROM snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| infra("get_snapshot", aggregate_type, aggregate_id, &e))?;

        let Some(row) = row else {
            tracing::trace!("no snapshot recorded");
            return Err(EventStoreError::AggregateNotFound {
                aggregate_type: aggregate_type.to_owned(),
                aggregate_id,
            });
        };
        Self::decode_row(&row).map_err(|e| infra("get_snapshot", aggregate_type, aggregate_id, &e))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<(), EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let result = sqlx::query(
            r"
            DELETE FROM snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .execute(&self.pool)
        .await
        .map_err(|e| infra("delete_snapshot", aggregate_type, aggregate_id, &e))?;

        tracing::trace!(deleted = result.rows_affected(), "snapshot delete");
        Ok(())
    }
}
