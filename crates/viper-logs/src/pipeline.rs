//! Record intake and search dispatch.
//!
//! [`LogPipeline`] ties the pieces together: every logged event gets a
//! monotonic [`Ulid`], is persisted through a [`RecordStore`], and is
//! registered with the [`SearchIndex`](crate::index::SearchIndex). Index hits
//! are resolved back to full records through the store.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LogError, Result};
use crate::index::{DocId, IndexConfig, SharedIndex, shared_index};
use crate::query::{LogQuery, ScanEngine};
use crate::traits::RecordStore;
use crate::types::{LogLevel, LogRecord};
use crate::ulid::{self, Ulid};

/// Default similarity threshold for fuzzy search.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Service name stamped on every record
    pub service: String,
    /// Records below this level are dropped
    pub min_level: LogLevel,
    /// Threshold used by [`LogPipeline::fuzzy_search`]
    pub fuzzy_threshold: f64,
    /// Index configuration
    pub index: IndexConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            service: "default".to_string(),
            min_level: LogLevel::Info,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            index: IndexConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration for the given service.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Sets the minimum level.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the fuzzy search threshold.
    #[must_use]
    pub const fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    /// Sets the index configuration.
    #[must_use]
    pub const fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }
}

/// Index-based search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// TF-IDF ranked term search
    Ranked,
    /// Edit-distance approximate search
    Fuzzy,
    /// Boolean expression search
    Boolean,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ranked => write!(f, "ranked"),
            Self::Fuzzy => write!(f, "fuzzy"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ranked" | "tfidf" => Ok(Self::Ranked),
            "fuzzy" => Ok(Self::Fuzzy),
            "boolean" | "bool" => Ok(Self::Boolean),
            other => Err(LogError::query(format!("unsupported search mode: {other}"))),
        }
    }
}

/// Logs records into a store and an index, and searches them.
pub struct LogPipeline<S: RecordStore> {
    config: PipelineConfig,
    store: Arc<S>,
    index: SharedIndex,
}

impl<S: RecordStore> LogPipeline<S> {
    /// Creates a pipeline with an empty index over `store`.
    ///
    /// Records already in the store are not indexed until
    /// [`rebuild_index`](Self::rebuild_index) is called.
    #[must_use]
    pub fn new(config: PipelineConfig, store: Arc<S>) -> Self {
        let index = shared_index(&config.index);
        Self { config, store, index }
    }

    /// Creates a pipeline and indexes every record already in `store`.
    #[must_use]
    pub fn open(config: PipelineConfig, store: Arc<S>) -> Self {
        let pipeline = Self::new(config, store);
        pipeline.rebuild_index();
        pipeline
    }

    /// Records an event.
    ///
    /// Returns `Ok(None)` if `level` is below the configured minimum. The
    /// record's context is taken from `metadata["context"]` when that entry
    /// is a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to persist the record.
    pub fn log(
        &self,
        level: LogLevel,
        user_id: &str,
        action: &str,
        description: &str,
        component: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Option<Ulid>> {
        if !level.is_at_least(self.config.min_level) {
            return Ok(None);
        }

        let started = Instant::now();
        let id = ulid::generate_monotonic();

        let mut builder = LogRecord::builder()
            .id(id)
            .timestamp(id.datetime())
            .level(level)
            .user_id(user_id)
            .action(action)
            .description(description)
            .component(component)
            .service(self.config.service.as_str());

        if let Some(serde_json::Value::Object(context)) = metadata.get("context") {
            for (key, value) in context {
                builder = builder.context(key.as_str(), value.clone());
            }
        }
        for (key, value) in metadata {
            builder = builder.metadata(key, value);
        }

        let record = builder
            .duration(started.elapsed().as_secs_f64())
            .build()?;

        self.store.append(&record)?;
        self.index.write().add_document(id, &record.search_fields());

        debug!(id = %id, level = %level, component, "logged record");
        Ok(Some(id))
    }

    /// Clears the index and re-registers every stored record.
    ///
    /// Returns the number of records indexed.
    pub fn rebuild_index(&self) -> usize {
        let mut index = self.index.write();
        index.clear();

        let mut count = 0;
        for record in self.store.iter() {
            index.add_document(record.id, &record.search_fields());
            count += 1;
        }
        drop(index);

        info!(records = count, "rebuilt search index");
        count
    }

    /// Fetches a stored record by ID.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::NotFound`] if no record has this ID.
    pub fn get(&self, id: Ulid) -> Result<LogRecord> {
        self.store.get(id).ok_or(LogError::NotFound(id))
    }

    /// Ranked term search, best match first.
    #[must_use]
    pub fn search(&self, query: &str, field: Option<&str>) -> Vec<LogRecord> {
        let hits: Vec<DocId> = self
            .index
            .read()
            .search(query, field)
            .into_iter()
            .map(|hit| hit.doc_id)
            .collect();
        self.resolve(hits)
    }

    /// Approximate search using the configured threshold.
    ///
    /// With `field`, only candidates taken from that field count.
    #[must_use]
    pub fn fuzzy_search(&self, query: &str, field: Option<&str>) -> Vec<LogRecord> {
        self.fuzzy_search_with_threshold(query, self.config.fuzzy_threshold, field)
    }

    /// Approximate search with an explicit threshold.
    #[must_use]
    pub fn fuzzy_search_with_threshold(
        &self,
        query: &str,
        threshold: f64,
        field: Option<&str>,
    ) -> Vec<LogRecord> {
        let hits: Vec<DocId> = self
            .index
            .read()
            .fuzzy_search(query, threshold, field)
            .into_iter()
            .map(|hit| hit.doc_id)
            .collect();
        self.resolve(hits)
    }

    /// Boolean expression search, oldest first.
    ///
    /// With `field`, terms only match postings from that field.
    #[must_use]
    pub fn boolean_search(&self, query: &str, field: Option<&str>) -> Vec<LogRecord> {
        let hits = self.index.read().boolean_search(query, field);
        self.resolve(hits)
    }

    /// Runs `text` through the given search strategy.
    #[must_use]
    pub fn query(&self, mode: SearchMode, text: &str) -> Vec<LogRecord> {
        match mode {
            SearchMode::Ranked => self.search(text, None),
            SearchMode::Fuzzy => self.fuzzy_search(text, None),
            SearchMode::Boolean => self.boolean_search(text, None),
        }
    }

    /// Starts a new filter-scan query.
    #[must_use]
    pub fn filter(&self) -> LogQuery {
        LogQuery::new()
    }

    /// Runs a filter-scan query against the store.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Query`] if the query is invalid.
    pub fn execute(&self, query: &LogQuery) -> Result<Vec<LogRecord>> {
        self.scan_engine().execute(query)
    }

    /// Returns a scan engine over this pipeline's store.
    #[must_use]
    pub fn scan_engine(&self) -> ScanEngine<S> {
        ScanEngine::new(Arc::clone(&self.store))
    }

    /// Returns the shared index.
    #[must_use]
    pub const fn index(&self) -> &SharedIndex {
        &self.index
    }

    /// Returns the record store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn resolve(&self, ids: Vec<DocId>) -> Vec<LogRecord> {
        ids.into_iter()
            .filter_map(|id| {
                let record = self.store.get(id);
                if record.is_none() {
                    debug!(id = %id, "indexed record missing from store");
                }
                record
            })
            .collect()
    }
}
