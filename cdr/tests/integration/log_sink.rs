use std::time::Duration;

use cdr::destination::log_file::LogFileSink;
use cdr::test_utils::fixtures::records_json;
use cdr::test_utils::memory_queue::MemoryQueue;
use cdr::test_utils::memory_store::MemoryStore;
use cdr::types::CdrRecord;
use cdr::workers::coordinator::{CoordinatorSettings, TickOutcome, WorkCoordinator};
use cdr::workers::route::SinkRoute;
use cdr_telemetry::tracing::init_test_tracing;

const KEY: &str = "cdr";

#[tokio::test(flavor = "multi_thread")]
async fn logs_mode_appends_one_line_per_record() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let queue = MemoryQueue::new();
    queue.push_all(KEY, records_json(7)).await;
    let sink = LogFileSink::new(dir.path().join("cdrs"), "|");
    let coordinator = WorkCoordinator::new(
        CoordinatorSettings {
            key: KEY.to_string(),
            worker_count: 1,
            records_take: 7,
            batch_size: 5,
            interval: Duration::from_secs(60),
        },
        queue.clone(),
        SinkRoute::<MemoryStore>::Logs(sink.clone()),
    )
    .unwrap();

    let outcome = coordinator.tick().await.unwrap();

    assert!(matches!(
        outcome,
        TickOutcome::Dispatched {
            failed_workers: 0,
            ..
        }
    ));
    let content = std::fs::read_to_string(sink.active_file()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 7);
    for (index, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split('|').collect();
        assert_eq!(fields.len(), CdrRecord::FIELD_COUNT);
        // A single worker keeps queue order since the fixture dates increase.
        assert_eq!(fields[4], format!("m-{index}"));
    }
    assert_eq!(queue.len(KEY).await, 0);
}
