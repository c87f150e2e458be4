use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity of a log event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[serde(alias = "trace")]
    Trace,
    #[serde(alias = "debug")]
    Debug,
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "warn")]
    Warn,
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "fatal")]
    Fatal,
}

impl Level {
    /// Uppercase name as it appears in the `level` field of encoded records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized severity level: {0:?}")]
pub struct ParseLevelError(String);

/// Error captured alongside a log event: class name, optional message and the
/// string-rendered stack frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub stacktrace: Vec<String>,
}

/// Immutable snapshot of a single log call.
///
/// Thread name, rendered message and a copy of the diagnostic context are all captured
/// at creation time, so later mutation of thread-local state cannot corrupt the record
/// while it sits in the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Event time as milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
    /// Full dotted logger name, when the producing framework has one.
    pub logger: Option<String>,
    pub level: Level,
    /// Rendered message; the pipeline performs no further interpolation.
    pub message: String,
    /// Name of the producing thread.
    pub thread: String,
    /// Mapped diagnostic context copied at capture time.
    pub mdc: HashMap<String, String>,
    pub exception: Option<ExceptionInfo>,
}

impl LogEvent {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp_millis: current_timestamp_millis(),
            logger: None,
            level,
            message: message.into(),
            thread: std::thread::current()
                .name()
                .unwrap_or("unknown")
                .to_string(),
            mdc: HashMap::new(),
            exception: None,
        }
    }

    pub fn with_timestamp_millis(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = timestamp_millis;
        self
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = thread.into();
        self
    }

    pub fn with_mdc_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mdc.insert(key.into(), value.into());
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }
}

/// Milliseconds since the Unix epoch for the current instant.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
