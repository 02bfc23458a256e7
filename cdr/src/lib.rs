//! Drains call detail records from a Redis list into Postgres or a rotating log file.
//!
//! A [`workers::coordinator::WorkCoordinator`] wakes up on a fixed interval, measures
//! the backlog, splits it across a fixed number of workers and lets each worker pull
//! its share through a [`fetcher::BatchFetcher`] into the configured
//! [`workers::route::SinkRoute`].

pub mod codec;
pub mod concurrency;
pub mod destination;
pub mod error;
pub mod fetcher;
mod macros;
pub mod metrics;
pub mod queue;
pub mod schema;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
pub mod writer;
