use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_log_level(self) -> log::Level {
        match self {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }
}

pub trait LogSink: Send + Sync {
    fn log(&self, record: LogRecord);
}

#[derive(Default)]
pub struct VecLogSink {
    records: Mutex<Vec<LogRecord>>,
}

impl VecLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: LogRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record);
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .map(|record| record.message)
            .collect()
    }
}

impl LogSink for VecLogSink {
    fn log(&self, record: LogRecord) {
        self.push(record);
    }
}

/// Prints records at or above `min_level` to stderr, keeping stdout free for
/// the generated document.
#[derive(Clone)]
pub struct StderrLogSink {
    min_level: LogLevel,
}

impl StderrLogSink {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Default for StderrLogSink {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl LogSink for StderrLogSink {
    fn log(&self, record: LogRecord) {
        if record.level >= self.min_level {
            eprintln!("[{}] {}", record.level, record.message);
        }
    }
}

/// Forwards records to the `log` facade under the given target.
#[derive(Clone)]
pub struct FacadeLogSink {
    target: &'static str,
}

impl FacadeLogSink {
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for FacadeLogSink {
    fn default() -> Self {
        Self::new("story_core")
    }
}

impl LogSink for FacadeLogSink {
    fn log(&self, record: LogRecord) {
        log::log!(target: self.target, record.level.to_log_level(), "{}", record.message);
    }
}

/// Fans a record out to several sinks.
pub struct TeeLogSink<'a> {
    sinks: Vec<&'a dyn LogSink>,
}

impl<'a> TeeLogSink<'a> {
    pub fn new(sinks: Vec<&'a dyn LogSink>) -> Self {
        Self { sinks }
    }
}

impl LogSink for TeeLogSink<'_> {
    fn log(&self, record: LogRecord) {
        for sink in &self.sinks {
            sink.log(record.clone());
        }
    }
}
