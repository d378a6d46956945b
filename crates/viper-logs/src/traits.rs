//! Traits for record storage backends.
//!
//! This module provides the [`RecordStore`] trait, the storage collaborator
//! consumed by the filter-scan engine and the log pipeline. Rotation and
//! retention live behind it; callers only see append, iterate and get.

use crate::error::Result;
use crate::types::LogRecord;
use crate::ulid::Ulid;

/// Lazy sequence of persisted records, in storage order.
pub type RecordIter<'a> = Box<dyn Iterator<Item = LogRecord> + Send + 'a>;

/// Trait for record storage backends.
///
/// Implementors persist records whose identifiers were assigned by the caller,
/// and hand them back in append order. This trait allows code to work with
/// different storage backends interchangeably.
pub trait RecordStore: Send + Sync {
    /// Appends a record to the store.
    ///
    /// The record's ID must already be assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot persist the record.
    fn append(&self, record: &LogRecord) -> Result<()>;

    /// Iterates over every persisted record in storage order.
    ///
    /// Records that cannot be decoded are skipped.
    fn iter(&self) -> RecordIter<'_>;

    /// Gets a specific record by ID.
    ///
    /// Returns `None` if the record is not found.
    fn get(&self, id: Ulid) -> Option<LogRecord>;

    /// Returns the number of stored records.
    fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all records.
    ///
    /// # Errors
    ///
    /// Returns an error if clearing fails.
    fn clear(&self) -> Result<()>;
}
