//! `PostgreSQL` implementation of the `EventStore` contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use chronicle_core::envelope::EventEnvelope;
use chronicle_core::error::EventStoreError;
use chronicle_core::store::{EventStore, check_aggregate_type, check_append};

/// Column list shared by every event read query.
const EVENT_COLUMNS: &str =
    "event_id, event_type, aggregate_id, aggregate_type, version, timestamp, data, metadata";

/// PostgreSQL-backed event store.
///
/// Appends run in a single transaction: the current maximum version is read
/// inside the transaction and compared against the caller's expected
/// version, then the whole batch is inserted. A concurrent writer that slips
/// between the check and the insert is caught by the
/// `UNIQUE (aggregate_id, version)` constraint, which is mapped to the same
/// [`EventStoreError::ConcurrencyConflict`] as the pre-check.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore` over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reads the highest recorded version for an aggregate, `-1` if the
    /// aggregate has no events.
    async fn current_version<'e, E>(
        executor: E,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<i64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r"
            SELECT COALESCE(MAX(version), -1)
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_one(executor)
        .await
    }

    fn decode_row(row: &PgRow) -> Result<EventEnvelope, sqlx::Error> {
        Ok(EventEnvelope {
            event_id: row.try_get("event_id")?,
            event_type: row.try_get("event_type")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            version: row.try_get("version")?,
            timestamp: row.try_get("timestamp")?,
            data: row.try_get("data")?,
            metadata: row.try_get("metadata")?,
        })
    }

    fn decode_rows(rows: Vec<PgRow>) -> Result<Vec<EventEnvelope>, sqlx::Error> {
        rows.iter().map(Self::decode_row).collect()
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn infra(operation: &str, context: &str, error: &sqlx::Error) -> EventStoreError {
    EventStoreError::Infrastructure(format!("{operation} failed for {context}: {error}"))
}

#[async_trait]
impl EventStore for PgEventStore {
    #[tracing::instrument(skip(self, events), fields(batch = events.len()))]
    async fn save_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[EventEnvelope],
    ) -> Result<(), EventStoreError> {
        check_append(aggregate_type, aggregate_id, expected_version, events)?;
        if events.is_empty() {
            return Ok(());
        }

        let context = format!("aggregate {aggregate_type}/{aggregate_id}");
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| infra("save_events: begin", &context, &e))?;

        let actual = Self::current_version(&mut *tx, aggregate_type, aggregate_id)
            .await
            .map_err(|e| infra("save_events: version check", &context, &e))?;
        if actual != expected_version {
            tracing::debug!(expected = expected_version, actual, "version pre-check rejected append");
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO events ({EVENT_COLUMNS}) "
        ));
        qb.push_values(events, |mut b, event| {
            b.push_bind(event.event_id);
            b.push_bind(event.event_type.as_str());
            b.push_bind(event.aggregate_id);
            b.push_bind(event.aggregate_type.as_str());
            b.push_bind(event.version);
            b.push_bind(event.timestamp);
            b.push_bind(event.data.as_slice());
            b.push_bind(event.metadata.as_deref());
        });

        if let Err(e) = qb.build().execute(&mut *tx).await {
            // Roll back before re-reading so the fresh version is observable.
            drop(tx);
            if is_unique_violation(&e) {
                let actual =
                    match Self::current_version(&self.pool, aggregate_type, aggregate_id).await {
                        Ok(version) => version,
                        Err(re_read) => {
                            tracing::warn!(
                                error = %re_read,
                                "version re-read after unique violation failed"
                            );
                            // A racer committed at least one event past the
                            // caller's view.
                            expected_version + 1
                        }
                    };
                tracing::debug!(
                    expected = expected_version,
                    actual,
                    "uniqueness constraint rejected racing append"
                );
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: expected_version,
                    actual,
                });
            }
            return Err(infra("save_events: insert", &context, &e));
        }

        tx.commit()
            .await
            .map_err(|e| infra("save_events: commit", &context, &e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let rows = sqlx::query(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY version ASC
            "
        ))
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .and_then(Self::decode_rows)
        .map_err(|e| {
            infra(
                "get_events",
                &format!("aggregate {aggregate_type}/{aggregate_id}"),
                &e,
            )
        })?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_since(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        version: i64,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let rows = sqlx::query(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2 AND version > $3
            ORDER BY version ASC
            "
        ))
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(version)
        .fetch_all(&self.pool)
        .await
        .and_then(Self::decode_rows)
        .map_err(|e| {
            infra(
                "get_events_since",
                &format!("aggregate {aggregate_type}/{aggregate_id}"),
                &e,
            )
        })?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn get_events_by_type(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let rows = sqlx::query(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2 AND event_type = $3
            ORDER BY version ASC
            "
        ))
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .and_then(Self::decode_rows)
        .map_err(|e| {
            infra(
                "get_events_by_type",
                &format!("aggregate {aggregate_type}/{aggregate_id}"),
                &e,
            )
        })?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn get_all_events(
        &self,
        aggregate_type: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        let rows = sqlx::query(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE aggregate_type = $1
            ORDER BY timestamp ASC, version ASC
            OFFSET $2 LIMIT $3
            "
        ))
        .bind(aggregate_type)
        .bind(i64::from(offset))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .and_then(Self::decode_rows)
        .map_err(|e| infra("get_all_events", &format!("aggregate type {aggregate_type}"), &e))?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn get_event_stream(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<EventEnvelope>, EventStoreError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE timestamp > $1
            ORDER BY timestamp ASC
            LIMIT $2
            "
        ))
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .and_then(Self::decode_rows)
        .map_err(|e| infra("get_event_stream", &format!("since {since}"), &e))?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn get_aggregate_version(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<i64, EventStoreError> {
        check_aggregate_type(aggregate_type)?;
        Self::current_version(&self.pool, aggregate_type, aggregate_id)
            .await
            .map_err(|e| {
                infra(
                    "get_aggregate_version",
                    &format!("aggregate {aggregate_type}/{aggregate_id}"),
                    &e,
                )
            })
    }

    #[tracing::instrument(skip(self))]
    async fn close(&self) -> Result<(), EventStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
