//! Pluggable logging capability
//!
//! The client takes a [`Logger`] instead of reaching for process-wide
//! state: production wires [`TracingLogger`], tests inject
//! [`MemoryLogger`] to capture output, and [`NoopLogger`] discards
//! everything. Absence of a logger never changes behavior.

use std::fmt;
use std::sync::Mutex;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Structured fields attached to a log record.
pub type LogFields<'a> = &'a [(&'a str, String)];

/// The logging capability the client is configured with.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, fields: LogFields);

    fn debug(&self, message: &str, fields: LogFields) {
        self.log(LogLevel::Debug, message, fields);
    }

    fn info(&self, message: &str, fields: LogFields) {
        self.log(LogLevel::Info, message, fields);
    }

    fn warn(&self, message: &str, fields: LogFields) {
        self.log(LogLevel::Warn, message, fields);
    }

    fn error(&self, message: &str, fields: LogFields) {
        self.log(LogLevel::Error, message, fields);
    }
}

/// Forwards records to the `tracing` ecosystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: LogFields) {
        let rendered = render_fields(fields);
        match level {
            LogLevel::Debug => tracing::debug!(target: "rdfql", "{message}{rendered}"),
            LogLevel::Info => tracing::info!(target: "rdfql", "{message}{rendered}"),
            LogLevel::Warn => tracing::warn!(target: "rdfql", "{message}{rendered}"),
            LogLevel::Error => tracing::error!(target: "rdfql", "{message}{rendered}"),
        }
    }
}

fn render_fields(fields: LogFields) -> String {
    if fields.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for (key, value) in fields {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str, _fields: LogFields) {}
}

/// One captured record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

/// Captures records in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().expect("logger lock poisoned").clone()
    }

    /// The captured messages at or above the given level.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level >= level)
            .map(|r| r.message)
            .collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str, fields: LogFields) {
        self.records
            .lock()
            .expect("logger lock poisoned")
            .push(LogRecord {
                level,
                message: message.to_string(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            });
    }
}
