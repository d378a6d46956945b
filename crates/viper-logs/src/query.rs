//! Structured filter-scan over persisted records.
//!
//! A [`LogQuery`] is a conjunction of [`Predicate`]s built fluently. The
//! [`ScanEngine`] evaluates it by streaming every record from a
//! [`RecordStore`], so results never lag behind storage the way index-based
//! search can.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LogError, Result};
use crate::traits::RecordStore;
use crate::types::{LogLevel, LogRecord, TimeRange};

/// A single condition a record must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// Level is one of the listed levels.
    LevelIn(Vec<LogLevel>),
    /// Component is one of the listed components.
    ComponentIn(Vec<String>),
    /// User is one of the listed users.
    UserIn(Vec<String>),
    /// Description contains the text.
    ContainsText {
        /// Text to look for
        text: String,
        /// Match case exactly
        case_sensitive: bool,
    },
    /// Timestamp lies within the inclusive range.
    TimeRange(TimeRange),
}

impl Predicate {
    /// Evaluates the predicate against a record.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        match self {
            Self::LevelIn(levels) => levels.contains(&record.level),
            Self::ComponentIn(components) => components.iter().any(|c| *c == record.component),
            Self::UserIn(users) => users.iter().any(|u| *u == record.user_id),
            Self::ContainsText {
                text,
                case_sensitive: true,
            } => record.description.contains(text.as_str()),
            Self::ContainsText {
                text,
                case_sensitive: false,
            } => record
                .description
                .to_lowercase()
                .contains(&text.to_lowercase()),
            Self::TimeRange(range) => range.contains(record.timestamp),
        }
    }

    /// Returns true for time predicates, which are checked first.
    #[must_use]
    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::TimeRange(_))
    }
}

/// Result ordering by timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

/// Fluent builder for filter-scan queries.
///
/// # Example
///
/// ```rust
/// use viper_logs::{LogLevel, LogQuery, SortOrder};
///
/// let query = LogQuery::new()
///     .with_level(LogLevel::Error)
///     .from_component("auth")
///     .containing("timeout", false)
///     .sort(SortOrder::Asc)
///     .limit(50);
///
/// assert_eq!(query.predicates().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogQuery {
    predicates: Vec<Predicate>,
    limit: Option<usize>,
    sort: SortOrder,
}

impl LogQuery {
    /// Creates a query that matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the given level.
    #[must_use]
    pub fn with_level(self, level: LogLevel) -> Self {
        self.with_levels([level])
    }

    /// Requires one of the given levels.
    #[must_use]
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.predicates
            .push(Predicate::LevelIn(levels.into_iter().collect()));
        self
    }

    /// Requires the given component.
    #[must_use]
    pub fn from_component(self, component: impl Into<String>) -> Self {
        self.from_components([component])
    }

    /// Requires one of the given components.
    #[must_use]
    pub fn from_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates.push(Predicate::ComponentIn(
            components.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Requires the given user.
    #[must_use]
    pub fn by_user(self, user_id: impl Into<String>) -> Self {
        self.by_users([user_id])
    }

    /// Requires one of the given users.
    #[must_use]
    pub fn by_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates
            .push(Predicate::UserIn(users.into_iter().map(Into::into).collect()));
        self
    }

    /// Requires the description to contain `text`.
    #[must_use]
    pub fn containing(mut self, text: impl Into<String>, case_sensitive: bool) -> Self {
        self.predicates.push(Predicate::ContainsText {
            text: text.into(),
            case_sensitive,
        });
        self
    }

    /// Restricts to records with `start <= timestamp <= end`.
    ///
    /// Replaces any earlier time bound.
    #[must_use]
    pub fn in_timeframe(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.predicates.retain(|p| !p.is_temporal());
        self.predicates
            .push(Predicate::TimeRange(TimeRange::between(start, end)));
        self
    }

    /// Restricts to records from `start` up to now.
    #[must_use]
    pub fn since(self, start: DateTime<Utc>) -> Self {
        self.in_timeframe(start, Utc::now())
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the result ordering.
    #[must_use]
    pub const fn sort(mut self, order: SortOrder) -> Self {
        self.sort = order;
        self
    }

    /// Returns the predicates in the order they were added.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the result cap, if any.
    #[must_use]
    pub const fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the result ordering.
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort
    }

    /// Checks that the query can be executed.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Query`] if a time range starts after it ends.
    pub fn validate(&self) -> Result<()> {
        for predicate in &self.predicates {
            if let Predicate::TimeRange(range) = predicate {
                if range.is_inverted() {
                    return Err(LogError::query("time range starts after it ends"));
                }
            }
        }
        Ok(())
    }

    /// Returns true if the record satisfies every predicate.
    ///
    /// Time predicates are evaluated before the others.
    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        let temporal = self.predicates.iter().filter(|p| p.is_temporal());
        let other = self.predicates.iter().filter(|p| !p.is_temporal());
        temporal.chain(other).all(|p| p.matches(record))
    }
}

/// Executes [`LogQuery`]s by scanning a record store.
pub struct ScanEngine<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> Clone for ScanEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> ScanEngine<S> {
    /// Creates an engine over the given store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs the query over every stored record.
    ///
    /// Matches are stably sorted by timestamp and truncated to the limit.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Query`] if the query is invalid.
    pub fn execute(&self, query: &LogQuery) -> Result<Vec<LogRecord>> {
        query.validate()?;

        let mut results: Vec<LogRecord> = self.store.iter().filter(|r| query.matches(r)).collect();

        match query.sort {
            SortOrder::Asc => results.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            SortOrder::Desc => results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        debug!(
            predicates = query.predicates.len(),
            matched = results.len(),
            "filter scan complete"
        );
        Ok(results)
    }
}

impl<S: RecordStore + 'static> ScanEngine<S> {
    /// Runs the query on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Query`] if the query is invalid, or
    /// [`LogError::Task`] if the scan task panicked or was cancelled.
    pub async fn execute_async(&self, query: LogQuery) -> Result<Vec<LogRecord>> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.execute(&query))
            .await
            .map_err(|e| LogError::Task(e.to_string()))?
    }
}
