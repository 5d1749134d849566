//! Event store database schema.
//!
//! The DDL here mirrors the files under `migrations/`; it is exposed for
//! deployments that create the schema programmatically instead of running
//! migrations.

/// SQL to create the events table.
///
/// `UNIQUE (aggregate_id, version)` is the authoritative safety net for
/// optimistic concurrency: a writer that races past the in-transaction
/// version pre-check is rejected here.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    event_id       UUID PRIMARY KEY,
    event_type     VARCHAR(255) NOT NULL,
    aggregate_id   UUID NOT NULL,
    aggregate_type VARCHAR(255) NOT NULL,
    version        BIGINT NOT NULL,
    timestamp      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    data           BYTEA NOT NULL,
    metadata       BYTEA,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (aggregate_id, version)
);

CREATE INDEX IF NOT EXISTS idx_events_aggregate
    ON events (aggregate_type, aggregate_id);

CREATE INDEX IF NOT EXISTS idx_events_event_type
    ON events (event_type);

CREATE INDEX IF NOT EXISTS idx_events_timestamp
    ON events (timestamp);
";

/// SQL to create the snapshots table. One row per aggregate, latest wins.
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    aggregate_id   UUID NOT NULL,
    aggregate_type VARCHAR(255) NOT NULL,
    version        BIGINT NOT NULL,
    state          BYTEA NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (aggregate_type, aggregate_id)
);
";
