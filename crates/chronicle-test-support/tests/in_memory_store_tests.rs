//! Contract tests for the in-memory doubles.
//!
//! These exercise the same observable behavior the `PostgreSQL` backend is
//! tested for, so callers can substitute the doubles without changing their
//! assumptions.

use std::sync::Arc;

use chrono::{Duration, Utc};
use chronicle_core::envelope::EventEnvelope;
use chronicle_core::error::EventStoreError;
use chronicle_core::snapshot::Snapshot;
use chronicle_core::store::{EventStore, NEW_AGGREGATE_VERSION, SnapshotStore};
use chronicle_test_support::{
    FailingEventStore, FailingSnapshotStore, InMemoryEventStore, InMemorySnapshotStore,
};
use uuid::Uuid;

const AGGREGATE_TYPE: &str = "order";

fn make_envelope(aggregate_id: Uuid, version: i64) -> EventEnvelope {
    EventEnvelope {
        event_id: Uuid::new_v4(),
        event_type: "TestEvent".to_string(),
        aggregate_id,
        aggregate_type: AGGREGATE_TYPE.to_string(),
        version,
        timestamp: Utc::now(),
        data: serde_json::to_vec(&serde_json::json!({"n": version})).unwrap(),
        metadata: Some(b"meta".to_vec()),
    }
}

#[tokio::test]
async fn append_and_replay_preserves_contiguous_versions() {
    let store = InMemoryEventStore::new();
    let aggregate_id = Uuid::new_v4();

    store
        .save_events(
            AGGREGATE_TYPE,
            aggregate_id,
            NEW_AGGREGATE_VERSION,
            &[
                make_envelope(aggregate_id, 0),
                make_envelope(aggregate_id, 1),
            ],
        )
        .await
        .unwrap();
    store
        .save_events(AGGREGATE_TYPE, aggregate_id, 1, &[make_envelope(aggregate_id, 2)])
        .await
        .unwrap();

    let loaded = store.get_events(AGGREGATE_TYPE, aggregate_id).await.unwrap();
    assert_eq!(
        loaded.iter().map(|e| e.version).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(
        store
            .get_aggregate_version(AGGREGATE_TYPE, aggregate_id)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn stale_append_conflicts_and_leaves_no_partial_state() {
    let store = InMemoryEventStore::new();
    let aggregate_id = Uuid::new_v4();

    store
        .save_events(
            AGGREGATE_TYPE,
            aggregate_id,
            NEW_AGGREGATE_VERSION,
            &[
                make_envelope(aggregate_id, 0),
                make_envelope(aggregate_id, 1),
            ],
        )
        .await
        .unwrap();

    let result = store
        .save_events(
            AGGREGATE_TYPE,
            aggregate_id,
            NEW_AGGREGATE_VERSION,
            &[make_envelope(aggregate_id, 0)],
        )
        .await;

    match result {
        Err(EventStoreError::ConcurrencyConflict {
            aggregate_id: conflict_id,
            expected,
            actual,
        }) => {
            assert_eq!(conflict_id, aggregate_id);
            assert_eq!(expected, NEW_AGGREGATE_VERSION);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }

    let loaded = store.get_events(AGGREGATE_TYPE, aggregate_id).await.unwrap();
    assert_eq!(loaded.len(), 2);
}

#[tokio::test]
async fn racing_appends_have_exactly_one_winner() {
    let store = Arc::new(InMemoryEventStore::new());
    let aggregate_id = Uuid::new_v4();

    let first = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .save_events(
                    AGGREGATE_TYPE,
                    aggregate_id,
                    NEW_AGGREGATE_VERSION,
                    &[make_envelope(aggregate_id, 0)],
                )
                .await
        })
    };
    let second = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .save_events(
                    AGGREGATE_TYPE,
                    aggregate_id,
                    NEW_AGGREGATE_VERSION,
                    &[make_envelope(aggregate_id, 0)],
                )
                .await
        })
    };

    let a = first.await.unwrap();
    let b = second.await.unwrap();

    assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
    assert_eq!(
        store
            .get_aggregate_version(AGGREGATE_TYPE, aggregate_id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn since_floor_is_exclusive() {
    let store = InMemoryEventStore::new();
    let aggregate_id = Uuid::new_v4();

    store
        .save_events(
            AGGREGATE_TYPE,
            aggregate_id,
            NEW_AGGREGATE_VERSION,
            &[
                make_envelope(aggregate_id, 0),
                make_envelope(aggregate_id, 1),
                make_envelope(aggregate_id, 2),
            ],
        )
        .await
        .unwrap();

    let since = store
        .get_events_since(AGGREGATE_TYPE, aggregate_id, 0)
        .await
        .unwrap();

    assert_eq!(
        since.iter().map(|e| e.version).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test]
async fn event_type_filter_preserves_version_order() {
    let store = InMemoryEventStore::new();
    let aggregate_id = Uuid::new_v4();

    let mut created = make_envelope(aggregate_id, 0);
    created.event_type = "OrderCreated".to_string();
    let mut added = make_envelope(aggregate_id, 1);
    added.event_type = "LineAdded".to_string();
    let mut added_again = make_envelope(aggregate_id, 2);
    added_again.event_type = "LineAdded".to_string();

    store
        .save_events(
            AGGREGATE_TYPE,
            aggregate_id,
            NEW_AGGREGATE_VERSION,
            &[created, added, added_again],
        )
        .await
        .unwrap();

    let filtered = store
        .get_events_by_type(AGGREGATE_TYPE, aggregate_id, "LineAdded")
        .await
        .unwrap();
    assert_eq!(
        filtered.iter().map(|e| e.version).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test]
async fn all_events_pagination_orders_by_timestamp_then_version() {
    let store = InMemoryEventStore::new();
    let base = Utc::now();
    let agg_a = Uuid::new_v4();
    let agg_b = Uuid::new_v4();

    let mut a0 = make_envelope(agg_a, 0);
    a0.timestamp = base;
    let mut a1 = make_envelope(agg_a, 1);
    a1.timestamp = base + Duration::seconds(2);
    let mut b0 = make_envelope(agg_b, 0);
    b0.timestamp = base + Duration::seconds(1);

    store
        .save_events(AGGREGATE_TYPE, agg_a, NEW_AGGREGATE_VERSION, &[a0, a1])
        .await
        .unwrap();
    store
        .save_events(AGGREGATE_TYPE, agg_b, NEW_AGGREGATE_VERSION, &[b0])
        .await
        .unwrap();

    let page = store.get_all_events(AGGREGATE_TYPE, 0, 10).await.unwrap();
    assert_eq!(
        page.iter().map(|e| e.aggregate_id).collect::<Vec<_>>(),
        vec![agg_a, agg_b, agg_a]
    );

    let window = store.get_all_events(AGGREGATE_TYPE, 1, 1).await.unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].aggregate_id, agg_b);
}

#[tokio::test]
async fn event_stream_crosses_aggregate_types() {
    let store = InMemoryEventStore::new();
    let base = Utc::now();
    let agg_a = Uuid::new_v4();
    let agg_b = Uuid::new_v4();

    let mut order = make_envelope(agg_a, 0);
    order.timestamp = base + Duration::seconds(2);
    let mut payment = make_envelope(agg_b, 0);
    payment.aggregate_type = "payment".to_string();
    payment.timestamp = base + Duration::seconds(1);

    store
        .save_events(AGGREGATE_TYPE, agg_a, NEW_AGGREGATE_VERSION, &[order])
        .await
        .unwrap();
    store
        .save_events("payment", agg_b, NEW_AGGREGATE_VERSION, &[payment])
        .await
        .unwrap();

    let stream = store.get_event_stream(base, 10).await.unwrap();
    assert_eq!(
        stream.iter().map(|e| e.aggregate_id).collect::<Vec<_>>(),
        vec![agg_b, agg_a]
    );

    let capped = store.get_event_stream(base, 1).await.unwrap();
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].aggregate_id, agg_b);
}

#[tokio::test]
async fn empty_batch_with_malformed_arguments_is_rejected() {
    let store = InMemoryEventStore::new();
    let aggregate_id = Uuid::new_v4();

    let empty_type = store
        .save_events("", aggregate_id, NEW_AGGREGATE_VERSION, &[])
        .await;
    assert!(matches!(empty_type, Err(EventStoreError::Validation(_))));

    let below_sentinel = store.save_events(AGGREGATE_TYPE, aggregate_id, -5, &[]).await;
    assert!(matches!(
        below_sentinel,
        Err(EventStoreError::InvalidVersion { .. })
    ));

    // A well-formed empty batch is still a no-op.
    store
        .save_events(AGGREGATE_TYPE, aggregate_id, NEW_AGGREGATE_VERSION, &[])
        .await
        .unwrap();
    assert_eq!(
        store
            .get_aggregate_version(AGGREGATE_TYPE, aggregate_id)
            .await
            .unwrap(),
        NEW_AGGREGATE_VERSION
    );
}

#[tokio::test]
async fn closed_store_refuses_operations() {
    let store = InMemoryEventStore::new();
    let aggregate_id = Uuid::new_v4();

    store.close().await.unwrap();

    let result = store
        .save_events(
            AGGREGATE_TYPE,
            aggregate_id,
            NEW_AGGREGATE_VERSION,
            &[make_envelope(aggregate_id, 0)],
        )
        .await;
    assert!(matches!(result, Err(EventStoreError::Infrastructure(_))));
    assert!(matches!(
        store.get_events(AGGREGATE_TYPE, aggregate_id).await,
        Err(EventStoreError::Infrastructure(_))
    ));
}

#[tokio::test]
async fn snapshot_lifecycle_save_get_overwrite_delete() {
    let store = InMemorySnapshotStore::new();
    let aggregate_id = Uuid::new_v4();

    let missing = store.get_snapshot(AGGREGATE_TYPE, aggregate_id).await;
    assert!(matches!(
        missing,
        Err(EventStoreError::AggregateNotFound { .. })
    ));

    let snapshot = Snapshot {
        aggregate_id,
        aggregate_type: AGGREGATE_TYPE.to_string(),
        version: 4,
        state: b"state v4".to_vec(),
        created_at: Utc::now(),
    };
    store.save_snapshot(&snapshot).await.unwrap();

    let newer = Snapshot {
        version: 9,
        state: b"state v9".to_vec(),
        ..snapshot.clone()
    };
    store.save_snapshot(&newer).await.unwrap();

    let loaded = store
        .get_snapshot(AGGREGATE_TYPE, aggregate_id)
        .await
        .unwrap();
    assert_eq!(loaded.version, 9);
    assert_eq!(loaded.state, b"state v9");

    store
        .delete_snapshot(AGGREGATE_TYPE, aggregate_id)
        .await
        .unwrap();
    assert!(matches!(
        store.get_snapshot(AGGREGATE_TYPE, aggregate_id).await,
        Err(EventStoreError::AggregateNotFound { .. })
    ));

    // Deleting again stays idempotent.
    store
        .delete_snapshot(AGGREGATE_TYPE, aggregate_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn failing_stores_surface_infrastructure_errors() {
    let events = FailingEventStore;
    let snapshots = FailingSnapshotStore;
    let aggregate_id = Uuid::new_v4();

    assert!(matches!(
        events.get_events(AGGREGATE_TYPE, aggregate_id).await,
        Err(EventStoreError::Infrastructure(_))
    ));
    assert!(matches!(
        events
            .save_events(AGGREGATE_TYPE, aggregate_id, NEW_AGGREGATE_VERSION, &[])
            .await,
        Err(EventStoreError::Infrastructure(_))
    ));
    assert!(matches!(
        snapshots.get_snapshot(AGGREGATE_TYPE, aggregate_id).await,
        Err(EventStoreError::Infrastructure(_))
    ));
}
