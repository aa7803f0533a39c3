use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a [`LogRecord`].
///
/// Serializes as its lowercase name (`"info"`, `"error"`, ...). `Fatal` and
/// `Panic` have no `tracing` counterpart but are kept so records produced by
/// other facilities can be reshaped as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// One log line's structured data prior to serialization.
///
/// Field values default to [`serde_json::Value`], which is what the
/// `tracing` adapter produces, but any `Serialize` type works.
#[derive(Debug, Clone)]
pub struct LogRecord<V = serde_json::Value> {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, V>,
}

impl<V> LogRecord<V> {
    /// Create a record without fields. The timestamp is normalized to UTC.
    pub fn new(
        level: Level,
        timestamp: impl Into<DateTime<Utc>>,
        message: impl Into<String>,
    ) -> Self {
        LogRecord {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style helper that adds a single field.
    pub fn with_field(mut self, key: impl Into<String>, value: V) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Builder-style helper that adds all fields from an iterator.
    pub fn with_fields<K, I>(mut self, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }
}
