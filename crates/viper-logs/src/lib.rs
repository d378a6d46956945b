//! # viper-logs
//!
//! Log retrieval over an append-only record corpus.
//!
//! This crate provides:
//!
//! - [`Ulid`]: Monotonic, lexicographically sortable record identifiers
//! - [`LogRecord`]: Persisted log records and their [`LogLevel`]
//! - [`RecordStore`]: Storage trait, with [`MemoryRecordStore`] and [`FileRecordStore`]
//! - [`SearchIndex`]: Ranked (TF-IDF), fuzzy and boolean search over indexed fields
//! - [`LogQuery`] / [`ScanEngine`]: Structured filter-scan directly over storage
//! - [`LogPipeline`]: Intake (id, persist, index) and search dispatch
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use viper_logs::{LogLevel, LogPipeline, MemoryRecordStore, PipelineConfig, SearchMode};
//!
//! let pipeline = LogPipeline::new(
//!     PipelineConfig::new("checkout"),
//!     Arc::new(MemoryRecordStore::new()),
//! );
//!
//! pipeline
//!     .log(LogLevel::Error, "alice", "login", "login failed", "auth", HashMap::new())
//!     .expect("log");
//!
//! assert_eq!(pipeline.query(SearchMode::Boolean, "ERROR AND login").len(), 1);
//! assert_eq!(pipeline.fuzzy_search("loggin", None).len(), 1);
//!
//! let errors = pipeline
//!     .execute(&pipeline.filter().with_level(LogLevel::Error).from_component("auth"))
//!     .expect("scan");
//! assert_eq!(errors.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file_store;
pub mod index;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod traits;
pub mod types;
pub mod ulid;

// Re-export main types
pub use error::{LogError, Result};
pub use file_store::{FileRecordStore, FileRecordStoreConfig};
pub use index::{
    BoolExpr, BoolOp, BooleanParser, DocId, FuzzyIndex, IndexConfig, InvertedIndex, Posting,
    ScoredDocument, SearchIndex, SharedIndex, Tokenizer, shared_index,
};
pub use pipeline::{LogPipeline, PipelineConfig, SearchMode};
pub use query::{LogQuery, Predicate, ScanEngine, SortOrder};
pub use store::{MemoryRecordStore, SharedRecordStore, shared_store};
pub use traits::{RecordIter, RecordStore};
pub use types::{Fields, LogLevel, LogRecord, LogRecordBuilder, TimeRange};
pub use ulid::{MonotonicGenerator, Ulid, generate_monotonic};
