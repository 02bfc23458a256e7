use std::sync::Arc;
use std::time::Duration;

use cdr::concurrency::shutdown::create_shutdown_channel;
use cdr::destination::log_file::LogFileSink;
use cdr::error::ErrorKind;
use cdr::test_utils::fixtures::records_json;
use cdr::test_utils::memory_queue::MemoryQueue;
use cdr::test_utils::memory_store::MemoryStore;
use cdr::workers::coordinator::{CoordinatorSettings, TickOutcome, WorkCoordinator, WorkPlan};
use cdr::workers::route::SinkRoute;
use cdr::writer::{DurableWriter, RetryPolicy};
use cdr_telemetry::tracing::init_test_tracing;

const KEY: &str = "cdr";

fn settings(workers: u16, records_take: u64, batch_size: u64) -> CoordinatorSettings {
    CoordinatorSettings {
        key: KEY.to_string(),
        worker_count: workers,
        records_take,
        batch_size,
        interval: Duration::from_secs(1),
    }
}

fn database_route(store: MemoryStore, max_attempts: u32) -> SinkRoute<MemoryStore> {
    SinkRoute::Database(DurableWriter::new(
        store,
        RetryPolicy::new(max_attempts, Duration::ZERO),
    ))
}

async fn queue_with(count: usize) -> MemoryQueue {
    let queue = MemoryQueue::new();
    queue.push_all(KEY, records_json(count)).await;
    queue
}

#[tokio::test(flavor = "multi_thread")]
async fn tick_splits_backlog_and_leaves_remainder_queued() {
    init_test_tracing();
    let queue = queue_with(10).await;
    let store = MemoryStore::new();
    let coordinator =
        WorkCoordinator::new(settings(3, 100, 2), queue.clone(), database_route(store.clone(), 5))
            .unwrap();

    let outcome = coordinator.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            plan: WorkPlan {
                backlog_size: 10,
                worker_count: 3,
                per_worker_share: 3,
            },
            failed_workers: 0,
        }
    );
    assert_eq!(store.rows().await.len(), 9);
    assert_eq!(queue.len(KEY).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn records_are_never_written_twice() {
    init_test_tracing();
    let queue = queue_with(40).await;
    let store = MemoryStore::new();
    let coordinator =
        WorkCoordinator::new(settings(4, 40, 3), queue.clone(), database_route(store.clone(), 5))
            .unwrap();

    coordinator.tick().await.unwrap();

    let mut ids: Vec<String> = store
        .rows()
        .await
        .into_iter()
        .filter_map(|row| row[4].clone())
        .collect();
    let written = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(written, 40);
    assert_eq!(ids.len(), 40);
}

#[tokio::test]
async fn small_backlog_skips_tick_without_popping() {
    init_test_tracing();
    let queue = queue_with(2).await;
    let store = MemoryStore::new();
    let coordinator =
        WorkCoordinator::new(settings(3, 100, 2), queue.clone(), database_route(store.clone(), 5))
            .unwrap();

    let outcome = coordinator.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::Skipped { backlog_size: 2 });
    assert_eq!(queue.pop_calls(), 0);
    assert_eq!(queue.len(KEY).await, 2);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn zero_ceiling_skips_every_tick() {
    init_test_tracing();
    let queue = queue_with(5).await;
    let coordinator = WorkCoordinator::new(
        settings(1, 0, 5),
        queue.clone(),
        database_route(MemoryStore::new(), 3),
    )
    .unwrap();

    let outcome = coordinator.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::Skipped { backlog_size: 0 });
    assert_eq!(queue.pop_calls(), 0);
    assert_eq!(queue.len(KEY).await, 5);
}

#[tokio::test]
async fn failing_store_drops_batches_without_requeue() {
    init_test_tracing();
    let queue = queue_with(4).await;
    let store = MemoryStore::always_failing();
    let coordinator =
        WorkCoordinator::new(settings(2, 100, 2), queue.clone(), database_route(store.clone(), 3))
            .unwrap();

    let outcome = coordinator.tick().await.unwrap();

    assert!(matches!(
        outcome,
        TickOutcome::Dispatched {
            failed_workers: 0,
            ..
        }
    ));
    // One batch of two records per worker, three attempts each.
    assert_eq!(store.calls(), 6);
    assert_eq!(queue.len(KEY).await, 0);
}

#[tokio::test]
async fn queue_failure_is_isolated_to_workers() {
    init_test_tracing();
    let queue = queue_with(4).await;
    queue.fail_pops(true);
    let coordinator = WorkCoordinator::new(
        settings(2, 100, 2),
        queue.clone(),
        database_route(MemoryStore::new(), 3),
    )
    .unwrap();

    let outcome = coordinator.tick().await.unwrap();

    assert!(matches!(
        outcome,
        TickOutcome::Dispatched {
            failed_workers: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn inactive_modes_leave_queue_untouched() {
    init_test_tracing();
    for route in [
        SinkRoute::<MemoryStore>::Kafka,
        SinkRoute::Unknown("ftp".to_string()),
    ] {
        let queue = queue_with(5).await;
        let coordinator = WorkCoordinator::new(settings(1, 100, 5), queue.clone(), route).unwrap();

        assert_eq!(coordinator.tick().await.unwrap(), TickOutcome::SinkInactive);
        assert_eq!(queue.len(KEY).await, 5);
        assert_eq!(queue.pop_calls(), 0);
    }
}

#[tokio::test]
async fn zero_workers_is_rejected() {
    let err = WorkCoordinator::new(
        settings(0, 100, 5),
        MemoryQueue::new(),
        database_route(MemoryStore::new(), 3),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[tokio::test]
async fn file_errors_end_the_worker_but_not_the_tick() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let queue = queue_with(4).await;
    let coordinator = WorkCoordinator::new(
        settings(2, 100, 1),
        queue.clone(),
        SinkRoute::<MemoryStore>::Logs(LogFileSink::new(&blocker, ";")),
    )
    .unwrap();

    let outcome = coordinator.tick().await.unwrap();

    assert!(matches!(
        outcome,
        TickOutcome::Dispatched {
            failed_workers: 2,
            ..
        }
    ));
    // Each worker stopped after its first popped chunk.
    assert_eq!(queue.len(KEY).await, 2);
}

#[tokio::test(start_paused = true)]
async fn run_ticks_on_interval_until_shutdown() {
    init_test_tracing();
    let queue = queue_with(6).await;
    let store = MemoryStore::new();
    let coordinator = Arc::new(
        WorkCoordinator::new(settings(2, 2, 1), queue.clone(), database_route(store.clone(), 3))
            .unwrap(),
    );
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let handle = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run(shutdown_rx).await }
    });

    // Ticks fire at 1s and 2s.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    shutdown_tx.shutdown();
    handle.await.unwrap();

    assert_eq!(store.rows().await.len(), 4);
    assert_eq!(queue.len(KEY).await, 2);
}
