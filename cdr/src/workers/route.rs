use crate::destination::CdrStore;
use crate::destination::log_file::LogFileSink;
use crate::error::CdrResult;
use crate::types::CdrBatch;
use crate::writer::{DurableWriter, WriteOutcome};

/// Destination selected by the configured sink mode.
#[derive(Debug)]
pub enum SinkRoute<S> {
    /// Insert into Postgres with bounded retry.
    Database(DurableWriter<S>),
    /// Append to the rotating log file.
    Logs(LogFileSink),
    /// Accepted mode without an implementation. The queue is left untouched.
    Kafka,
    /// Unrecognized mode, reported on every tick. The queue is left untouched.
    Unknown(String),
}

impl<S> SinkRoute<S>
where
    S: CdrStore + Sync,
{
    pub fn name(&self) -> &str {
        match self {
            SinkRoute::Database(_) => "database",
            SinkRoute::Logs(_) => "logs",
            SinkRoute::Kafka => "kafka",
            SinkRoute::Unknown(mode) => mode,
        }
    }

    /// Hands `batch` to the sink.
    ///
    /// Database failures are absorbed by the writer. File failures are returned so
    /// the calling worker stops its share.
    pub async fn deliver(&self, batch: &CdrBatch) -> CdrResult<Delivery> {
        match self {
            SinkRoute::Database(writer) => Ok(Delivery::Database(writer.write(batch).await)),
            SinkRoute::Logs(sink) => {
                sink.append(batch).await?;
                Ok(Delivery::Appended)
            }
            SinkRoute::Kafka | SinkRoute::Unknown(_) => Ok(Delivery::Ignored),
        }
    }
}

/// What happened to a delivered batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Database(WriteOutcome),
    Appended,
    Ignored,
}
