//! Sinks receiving fetched batches.

mod base;
pub mod log_file;
pub mod postgres;

pub use base::CdrStore;
