//! Core types for the log retrieval system.
//!
//! This module provides:
//! - [`LogLevel`]: Severity levels for log records
//! - [`LogRecord`]: Persisted, immutable log record keyed by a [`Ulid`]
//! - [`TimeRange`]: Inclusive time bounds
//! - [`Fields`]: Extracted text fields registered with the search index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::LogError;
use crate::ulid::Ulid;

/// Text fields of an indexed document, keyed by field name.
pub type Fields = BTreeMap<String, String>;

/// Log severity levels, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debugging information
    Debug = 0,
    /// General information
    Info = 1,
    /// Warning conditions
    Warn = 2,
    /// Error conditions
    Error = 3,
    /// Unrecoverable failures
    Fatal = 4,
}

/// A persisted log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique, time-ordered identifier
    pub id: Ulid,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Severity level
    pub level: LogLevel,
    /// User the event is attributed to
    pub user_id: String,
    /// What was done
    pub action: String,
    /// Free-form description
    pub description: String,
    /// Component that emitted the event
    pub component: String,
    /// Service that emitted the event
    pub service: String,
    /// Duration in seconds
    #[serde(default)]
    pub duration: f64,
    /// Request context
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    /// Additional structured metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Inclusive time range for filtering records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the time range (inclusive)
    pub start: Option<DateTime<Utc>>,
    /// End of the time range (inclusive)
    pub end: Option<DateTime<Utc>>,
}

impl LogLevel {
    /// All levels, from least to most severe.
    pub const ALL: [Self; 5] = [Self::Debug, Self::Info, Self::Warn, Self::Error, Self::Fatal];

    /// Returns true if this level is at least as severe as the given level.
    #[must_use]
    pub fn is_at_least(&self, level: Self) -> bool {
        *self >= level
    }

    /// Returns the canonical string representation of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "FATAL" => Ok(Self::Fatal),
            other => Err(LogError::validation(format!("unknown log level: {other}"))),
        }
    }
}

impl LogRecord {
    /// Creates a new record builder.
    #[must_use]
    pub fn builder() -> LogRecordBuilder {
        LogRecordBuilder::default()
    }

    /// Extracts the text fields registered with the search index.
    #[must_use]
    pub fn search_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("level".to_string(), self.level.as_str().to_string());
        fields.insert("action".to_string(), self.action.clone());
        fields.insert("description".to_string(), self.description.clone());
        fields.insert("component".to_string(), self.component.clone());
        fields
    }
}

impl TimeRange {
    /// Creates a time range bounded on both ends.
    #[must_use]
    pub const fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Returns true if the start lies after the end.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }

    /// Checks if a timestamp falls within this range.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Builder for constructing log records.
#[derive(Debug, Default)]
pub struct LogRecordBuilder {
    id: Option<Ulid>,
    timestamp: Option<DateTime<Utc>>,
    level: Option<LogLevel>,
    user_id: Option<String>,
    action: Option<String>,
    description: Option<String>,
    component: Option<String>,
    service: Option<String>,
    duration: f64,
    context: HashMap<String, serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl LogRecordBuilder {
    /// Sets the record ID.
    #[must_use]
    pub const fn id(mut self, id: Ulid) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the log level.
    #[must_use]
    pub const fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the user ID.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the component.
    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Sets the service.
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Sets the duration in seconds.
    #[must_use]
    pub const fn duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the record, returning an error if required fields are missing.
    ///
    /// `service` defaults to an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is not set.
    pub fn build(self) -> Result<LogRecord, LogError> {
        let id = self.id.ok_or(LogError::MissingField("id"))?;
        let timestamp = self
            .timestamp
            .ok_or(LogError::MissingField("timestamp"))?;
        let level = self.level.ok_or(LogError::MissingField("level"))?;
        let user_id = self.user_id.ok_or(LogError::MissingField("user_id"))?;
        let action = self.action.ok_or(LogError::MissingField("action"))?;
        let description = self
            .description
            .ok_or(LogError::MissingField("description"))?;
        let component = self
            .component
            .ok_or(LogError::MissingField("component"))?;

        Ok(LogRecord {
            id,
            timestamp,
            level,
            user_id,
            action,
            description,
            component,
            service: self.service.unwrap_or_default(),
            duration: self.duration,
            context: self.context,
            metadata: self.metadata,
        })
    }
}
