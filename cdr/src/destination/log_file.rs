use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use metrics::counter;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cdr_error;
use crate::codec;
use crate::error::{CdrError, CdrResult, ErrorKind};
use crate::metrics::CDR_LOG_LINES_APPENDED_TOTAL;
use crate::types::CdrBatch;

/// Name of the file receiving the current day's lines.
pub const ACTIVE_FILE_NAME: &str = "cdr.log";

const LINE_SEPARATOR: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// Returns the name a day's file gets once it is rotated out.
pub fn rotated_file_name(date: NaiveDate) -> String {
    format!("cdr-{}.log", date.format("%Y-%m-%d"))
}

#[derive(Debug, Default)]
struct RotationState {
    /// Day the lines currently in `cdr.log` belong to, resolved on first append.
    active_date: Option<NaiveDate>,
}

/// Appends batches to `<directory>/cdr.log`, one delimited line per record.
///
/// The file holds a single calendar day. The first append observed on a new day
/// renames it to `cdr-<YYYY-MM-DD>.log` for the day it belonged to before writing.
/// Rotation and append run under one lock so workers never interleave with a rename.
#[derive(Debug, Clone)]
pub struct LogFileSink {
    directory: PathBuf,
    separator: String,
    state: Arc<Mutex<RotationState>>,
}

impl LogFileSink {
    pub fn new(directory: impl Into<PathBuf>, separator: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            separator: separator.into(),
            state: Arc::new(Mutex::new(RotationState::default())),
        }
    }

    pub fn active_file(&self) -> PathBuf {
        self.directory.join(ACTIVE_FILE_NAME)
    }

    /// Appends `batch` to today's file.
    pub async fn append(&self, batch: &CdrBatch) -> CdrResult<()> {
        self.append_with(batch, || Local::now().date_naive()).await
    }

    /// Appends `batch` as if the local date were `today`.
    pub async fn append_at(&self, batch: &CdrBatch, today: NaiveDate) -> CdrResult<()> {
        self.append_with(batch, || today).await
    }

    /// Appends `batch`, resolving the current date only once the rotation lock is held.
    ///
    /// A worker that waited on the lock across midnight must not act on the date it
    /// saw before waiting.
    async fn append_with<F>(&self, batch: &CdrBatch, today: F) -> CdrResult<()>
    where
        F: FnOnce() -> NaiveDate + Send,
    {
        if batch.is_empty() {
            return Ok(());
        }

        let mut block = String::new();
        for record in batch.iter() {
            block.push_str(&codec::to_line(record, &self.separator));
            block.push_str(LINE_SEPARATOR);
        }

        let mut state = self.state.lock().await;
        let today = today();

        fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| file_error("Could not create log directory", &self.directory, err))?;

        let active_file = self.active_file();
        let active_date = match state.active_date {
            Some(date) => Some(date),
            None => modified_date(&active_file).await?,
        };

        // The file only ever moves forward in time.
        let active_date = match active_date {
            Some(active_date) if active_date < today => {
                self.rotate(&active_file, active_date).await?;
                today
            }
            Some(active_date) => active_date,
            None => today,
        };
        state.active_date = Some(active_date);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active_file)
            .await
            .map_err(|err| file_error("Could not open log file", &active_file, err))?;
        file.write_all(block.as_bytes())
            .await
            .map_err(|err| file_error("Could not append to log file", &active_file, err))?;
        file.flush()
            .await
            .map_err(|err| file_error("Could not flush log file", &active_file, err))?;

        counter!(CDR_LOG_LINES_APPENDED_TOTAL).increment(batch.len() as u64);
        debug!(lines = batch.len(), file = %active_file.display(), "appended batch to log file");

        Ok(())
    }

    /// Moves the content of `cdr.log` into the file of `date`.
    async fn rotate(&self, active_file: &Path, date: NaiveDate) -> CdrResult<()> {
        if !fs::try_exists(active_file)
            .await
            .map_err(|err| file_error("Could not inspect log file", active_file, err))?
        {
            return Ok(());
        }

        let rotated = self.directory.join(rotated_file_name(date));
        let rotated_exists = fs::try_exists(&rotated)
            .await
            .map_err(|err| file_error("Could not inspect rotated log file", &rotated, err))?;

        if rotated_exists {
            // The day was already rotated once, keep its earlier lines.
            let content = fs::read(active_file)
                .await
                .map_err(|err| file_error("Could not read log file", active_file, err))?;
            let mut file = OpenOptions::new()
                .append(true)
                .open(&rotated)
                .await
                .map_err(|err| file_error("Could not open rotated log file", &rotated, err))?;
            file.write_all(&content)
                .await
                .map_err(|err| file_error("Could not append to rotated log file", &rotated, err))?;
            fs::remove_file(active_file)
                .await
                .map_err(|err| file_error("Could not remove log file", active_file, err))?;
        } else {
            fs::rename(active_file, &rotated)
                .await
                .map_err(|err| file_error("Could not rotate log file", &rotated, err))?;
        }

        info!(file = %rotated.display(), "rotated log file");

        Ok(())
    }
}

/// Returns the local date `path` was last modified, or `None` when it does not exist.
async fn modified_date(path: &Path) -> CdrResult<Option<NaiveDate>> {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(file_error("Could not inspect log file", path, err)),
    };

    let modified = metadata
        .modified()
        .map_err(|err| file_error("Could not read log file modification time", path, err))?;

    Ok(Some(DateTime::<Local>::from(modified).date_naive()))
}

fn file_error(description: &'static str, path: &Path, err: io::Error) -> CdrError {
    cdr_error!(
        ErrorKind::FileOperationFailed,
        description,
        format!("{}: {err}", path.display()),
        source: err
    )
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::test_utils::fixtures::record;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn batch(ids: &[&str]) -> CdrBatch {
        CdrBatch::new(ids.iter().map(|id| record("", id)).collect())
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn message_id(line: &str) -> &str {
        line.split(';').nth(4).unwrap()
    }

    #[tokio::test]
    async fn creates_directory_and_appends_with_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogFileSink::new(dir.path().join("nested/cdrs"), ";");

        sink.append_at(&batch(&["a", "b"]), day(1)).await.unwrap();
        sink.append_at(&batch(&["c"]), day(1)).await.unwrap();

        let content = std::fs::read_to_string(sink.active_file()).unwrap();
        assert!(content.ends_with(LINE_SEPARATOR));
        let ids: Vec<_> = content.lines().map(message_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn consecutive_days_land_in_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogFileSink::new(dir.path(), ";");

        sink.append_at(&batch(&["monday"]), day(4)).await.unwrap();
        sink.append_at(&batch(&["tuesday"]), day(5)).await.unwrap();

        let rotated = read_lines(&dir.path().join("cdr-2024-03-04.log"));
        let active = read_lines(&sink.active_file());
        assert_eq!(rotated.len(), 1);
        assert_eq!(message_id(&rotated[0]), "monday");
        assert_eq!(active.len(), 1);
        assert_eq!(message_id(&active[0]), "tuesday");
    }

    #[tokio::test]
    async fn existing_file_is_dated_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let active_file = dir.path().join(ACTIVE_FILE_NAME);
        std::fs::write(&active_file, "old line\n").unwrap();
        let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 24 * 60 * 60);
        std::fs::File::options()
            .write(true)
            .open(&active_file)
            .unwrap()
            .set_modified(two_days_ago)
            .unwrap();
        let owner = DateTime::<Local>::from(two_days_ago).date_naive();

        let sink = LogFileSink::new(dir.path(), ";");
        sink.append(&batch(&["today"])).await.unwrap();

        assert_eq!(
            read_lines(&dir.path().join(rotated_file_name(owner))),
            vec!["old line".to_string()]
        );
        assert_eq!(read_lines(&active_file).len(), 1);
    }

    #[tokio::test]
    async fn rotating_into_an_existing_day_keeps_both_parts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cdr-2024-03-04.log"), "earlier\n").unwrap();
        let sink = LogFileSink::new(dir.path(), ";");

        sink.append_at(&batch(&["later"]), day(4)).await.unwrap();
        sink.append_at(&batch(&["next"]), day(5)).await.unwrap();

        let rotated = read_lines(&dir.path().join("cdr-2024-03-04.log"));
        assert_eq!(rotated[0], "earlier");
        assert_eq!(message_id(&rotated[1]), "later");
    }

    #[tokio::test]
    async fn stale_date_never_rotates_a_newer_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogFileSink::new(dir.path(), ";");

        sink.append_at(&batch(&["monday"]), day(4)).await.unwrap();
        sink.append_at(&batch(&["tuesday"]), day(5)).await.unwrap();
        // A worker that read the date before midnight.
        sink.append_at(&batch(&["late"]), day(4)).await.unwrap();

        assert!(!dir.path().join("cdr-2024-03-05.log").exists());
        let active: Vec<_> = read_lines(&sink.active_file())
            .iter()
            .map(|line| message_id(line).to_string())
            .collect();
        assert_eq!(active, vec!["tuesday", "late"]);
        assert_eq!(read_lines(&dir.path().join("cdr-2024-03-04.log")).len(), 1);
    }

    #[tokio::test]
    async fn date_is_read_under_the_rotation_lock() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogFileSink::new(dir.path(), ";");
        let mut locked = false;

        sink.append_with(&batch(&["a"]), || {
            locked = sink.state.try_lock().is_err();
            day(1)
        })
        .await
        .unwrap();

        assert!(locked);
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogFileSink::new(dir.path().join("never"), ";");

        sink.append_at(&CdrBatch::default(), day(1)).await.unwrap();

        assert!(!dir.path().join("never").exists());
    }

    #[tokio::test]
    async fn io_failure_is_a_file_operation_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let sink = LogFileSink::new(&blocker, ";");

        let err = sink.append_at(&batch(&["a"]), day(1)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FileOperationFailed);
    }
}
