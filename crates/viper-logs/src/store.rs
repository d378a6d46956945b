//! In-memory record storage.
//!
//! This module provides:
//! - [`MemoryRecordStore`]: Thread-safe, append-only record storage
//! - Implementation of [`RecordStore`] for generic usage

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::traits::{RecordIter, RecordStore};
use crate::types::LogRecord;
use crate::ulid::Ulid;

/// Thread-safe in-memory record store.
///
/// Records are kept in append order; a side table maps IDs to positions.
#[derive(Default)]
pub struct MemoryRecordStore {
    /// All records, ordered by insertion
    records: RwLock<Vec<LogRecord>>,
    /// Fast lookup by record ID
    by_id: RwLock<HashMap<Ulid, usize>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    #[allow(clippy::significant_drop_tightening)]
    pub fn append(&self, record: &LogRecord) {
        let mut records = self.records.write();
        let mut by_id = self.by_id.write();
        by_id.insert(record.id, records.len());
        records.push(record.clone());
    }

    /// Gets a specific record by ID.
    #[must_use]
    pub fn get(&self, id: Ulid) -> Option<LogRecord> {
        let position = *self.by_id.read().get(&id)?;
        self.records.read().get(position).cloned()
    }

    /// Returns a snapshot of all records in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all records.
    pub fn clear(&self) {
        self.records.write().clear();
        self.by_id.write().clear();
    }
}

/// Shared record store handle.
pub type SharedRecordStore = Arc<MemoryRecordStore>;

/// Creates a new shared in-memory store.
#[must_use]
pub fn shared_store() -> SharedRecordStore {
    Arc::new(MemoryRecordStore::new())
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl RecordStore for MemoryRecordStore {
    fn append(&self, record: &LogRecord) -> Result<()> {
        MemoryRecordStore::append(self, record);
        Ok(())
    }

    fn iter(&self) -> RecordIter<'_> {
        Box::new(self.snapshot().into_iter())
    }

    fn get(&self, id: Ulid) -> Option<LogRecord> {
        MemoryRecordStore::get(self, id)
    }

    fn len(&self) -> usize {
        MemoryRecordStore::len(self)
    }

    fn is_empty(&self) -> bool {
        MemoryRecordStore::is_empty(self)
    }

    fn clear(&self) -> Result<()> {
        MemoryRecordStore::clear(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;
    use chrono::Utc;

    fn make_record(level: LogLevel, description: &str) -> LogRecord {
        LogRecord::builder()
            .id(Ulid::generate_monotonic())
            .timestamp(Utc::now())
            .level(level)
            .user_id("user-1")
            .action("test")
            .description(description)
            .component("core")
            .build()
            .expect("build record")
    }

    #[test]
    fn store_append_and_get() {
        let store = MemoryRecordStore::new();
        let record = make_record(LogLevel::Info, "hello");

        store.append(&record);

        let retrieved = store.get(record.id);
        assert_eq!(retrieved.map(|r| r.description), Some("hello".to_string()));
    }

    #[test]
    fn store_get_nonexistent_returns_none() {
        let store = MemoryRecordStore::new();
        assert!(store.get(Ulid::generate()).is_none());
    }

    #[test]
    fn store_iter_preserves_append_order() {
        let store = MemoryRecordStore::new();
        store.append(&make_record(LogLevel::Info, "first"));
        store.append(&make_record(LogLevel::Warn, "second"));
        store.append(&make_record(LogLevel::Error, "third"));

        let descriptions: Vec<String> = RecordStore::iter(&store).map(|r| r.description).collect();
        assert_eq!(descriptions, vec!["first", "second", "third"]);
    }

    #[test]
    fn store_len_and_is_empty() {
        let store = MemoryRecordStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);

        store.append(&make_record(LogLevel::Info, "test"));
        assert!(!store.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_clear() {
        let store = MemoryRecordStore::new();
        let record = make_record(LogLevel::Info, "test");
        store.append(&record);

        store.clear();
        assert!(store.is_empty());
        assert!(store.get(record.id).is_none());
    }

    #[test]
    fn shared_store_across_threads() {
        let store = shared_store();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.append(&make_record(LogLevel::Info, &format!("t{i} m{j}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(store.len(), 100);
        for record in store.snapshot() {
            assert!(store.get(record.id).is_some());
        }
    }
}
