//! Metric names emitted by the ingestion pipeline.

use std::sync::Once;

use metrics::{Unit, describe_counter};

static REGISTER_METRICS: Once = Once::new();

/// Label carrying the sink a batch was routed to.
pub const SINK_LABEL: &str = "sink";

pub const CDR_TICKS_TOTAL: &str = "cdr_ticks_total";
pub const CDR_TICKS_SKIPPED_TOTAL: &str = "cdr_ticks_skipped_total";
pub const CDR_RECORDS_FETCHED_TOTAL: &str = "cdr_records_fetched_total";
pub const CDR_RECORDS_MALFORMED_TOTAL: &str = "cdr_records_malformed_total";
pub const CDR_BATCHES_WRITTEN_TOTAL: &str = "cdr_batches_written_total";
pub const CDR_WRITE_ATTEMPTS_TOTAL: &str = "cdr_write_attempts_total";
pub const CDR_BATCHES_DROPPED_TOTAL: &str = "cdr_batches_dropped_total";
pub const CDR_RECORDS_DROPPED_TOTAL: &str = "cdr_records_dropped_total";
pub const CDR_LOG_LINES_APPENDED_TOTAL: &str = "cdr_log_lines_appended_total";

/// Describes the pipeline metrics. Safe to call more than once, the
/// descriptions are registered a single time.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(CDR_TICKS_TOTAL, Unit::Count, "Ticks that dispatched workers");

        describe_counter!(
            CDR_TICKS_SKIPPED_TOTAL,
            Unit::Count,
            "Ticks skipped because the backlog was smaller than the worker count"
        );

        describe_counter!(
            CDR_RECORDS_FETCHED_TOTAL,
            Unit::Count,
            "Records popped from the queue and decoded"
        );

        describe_counter!(
            CDR_RECORDS_MALFORMED_TOTAL,
            Unit::Count,
            "Queue entries dropped because they could not be decoded"
        );

        describe_counter!(
            CDR_BATCHES_WRITTEN_TOTAL,
            Unit::Count,
            "Batches persisted by a sink"
        );

        describe_counter!(
            CDR_WRITE_ATTEMPTS_TOTAL,
            Unit::Count,
            "Insert attempts against the database, retries included"
        );

        describe_counter!(
            CDR_BATCHES_DROPPED_TOTAL,
            Unit::Count,
            "Batches given up after exhausting insert attempts"
        );

        describe_counter!(
            CDR_RECORDS_DROPPED_TOTAL,
            Unit::Count,
            "Records contained in batches given up after exhausting insert attempts"
        );

        describe_counter!(
            CDR_LOG_LINES_APPENDED_TOTAL,
            Unit::Count,
            "Lines appended to the rotating log file"
        );
    });
}
