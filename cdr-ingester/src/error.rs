use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for ingester startup and shutdown.
pub type IngesterResult<T> = Result<T, IngesterError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the ingester binary.
#[derive(Debug)]
pub enum IngesterError {
    /// Invalid or unloadable configuration, or telemetry that could not start.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// Failure while connecting collaborators or running the ingestion loop.
    Runtime(anyhow::Error),
    /// I/O error, e.g. while building the runtime.
    Io(std::io::Error, CapturedBacktrace),
}

impl IngesterError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            IngesterError::Config(_, _) => "configuration error",
            IngesterError::Runtime(_) => "ingester error",
            IngesterError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            IngesterError::Config(_, cb) => Some(&cb.0),
            IngesterError::Runtime(err) => Some(err.backtrace()),
            IngesterError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error type.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        IngesterError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("cdr ingester failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for IngesterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngesterError::Config(source, _) => write!(f, "configuration error: {source}"),
            IngesterError::Runtime(source) => write!(f, "{source}"),
            IngesterError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for IngesterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IngesterError::Config(source, _) => Some(source.as_ref()),
            IngesterError::Runtime(source) => source.source(),
            IngesterError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for IngesterError {
    fn from(err: std::io::Error) -> Self {
        IngesterError::Io(err, CapturedBacktrace::capture())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_category_and_causes() {
        let err = IngesterError::Runtime(
            anyhow::Error::new(std::io::Error::other("connection refused"))
                .context("failed to connect to redis"),
        );

        let report = err.render_report();

        assert!(report.starts_with("cdr ingester failed\n"));
        assert!(report.contains("category: ingester error\n"));
        assert!(report.contains("error: failed to connect to redis\n"));
        assert!(report.contains("cause 1: connection refused\n"));
    }

    #[test]
    fn config_errors_are_labelled() {
        let err = IngesterError::config(std::io::Error::other("missing base.yaml"));

        assert_eq!(err.category(), "configuration error");
        assert_eq!(
            err.to_string(),
            "configuration error: missing base.yaml"
        );
    }
}
