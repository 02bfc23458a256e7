//! Data types flowing through the ingestion pipeline.

mod batch;
mod record;

pub use batch::CdrBatch;
pub use record::{CdrRecord, ColumnType};
