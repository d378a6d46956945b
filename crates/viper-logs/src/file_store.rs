//! File-based record storage with rotation support.
//!
//! This module provides:
//! - [`FileRecordStore`]: Persistent record storage backed by files
//! - Log rotation based on size
//! - JSON-lines format for records
//! - Implementation of [`RecordStore`]
//!
//! Reads never fail on bad data: lines that do not decode as a
//! [`LogRecord`] and segments that cannot be opened are skipped.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::{RecordIter, RecordStore};
use crate::types::LogRecord;
use crate::ulid::Ulid;

/// Configuration for file-based record storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecordStoreConfig {
    /// Base directory for log files.
    pub base_dir: PathBuf,
    /// Maximum size of a single log file before rotation (bytes).
    pub max_file_size: u64,
    /// Prefix for log file names.
    pub file_prefix: String,
}

impl Default for FileRecordStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("logs"),
            max_file_size: 5 * 1024 * 1024, // 5 MB
            file_prefix: "viper".to_string(),
        }
    }
}

impl FileRecordStoreConfig {
    /// Creates a new config with the given base directory.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    /// Sets the max file size for rotation.
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Sets the file prefix.
    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }
}

/// Internal state for file management.
struct FileState {
    /// Current active log file path.
    current_file: Option<PathBuf>,
    /// Current file size in bytes.
    current_size: u64,
    /// List of rotated log files (oldest first).
    rotated_files: Vec<PathBuf>,
}

impl FileState {
    /// All segments, oldest first.
    fn segments(&self) -> Vec<PathBuf> {
        let mut all = self.rotated_files.clone();
        if let Some(ref current) = self.current_file {
            all.push(current.clone());
        }
        all
    }
}

/// File-based record storage with rotation.
///
/// Stores records as JSON lines, rotating to a new segment when the next line
/// would push the active file past `max_file_size`.
pub struct FileRecordStore {
    config: FileRecordStoreConfig,
    state: RwLock<FileState>,
    /// Monotonic counter for unique filenames (avoids collisions within same millisecond).
    file_seq: AtomicU64,
}

impl FileRecordStore {
    /// Opens a file record store, resuming any segments already in `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory cannot be created or listed.
    pub fn new(config: FileRecordStoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.base_dir)?;

        let mut segments: Vec<(u64, PathBuf)> = fs::read_dir(&config.base_dir)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter_map(|p| Self::segment_seq(&p, &config.file_prefix).map(|seq| (seq, p)))
            .collect();
        segments.sort();

        // Continue after the highest sequence on disk, even if older segments were removed
        let file_seq = segments.last().map_or(0, |(seq, _)| seq + 1);
        let mut files: Vec<PathBuf> = segments.into_iter().map(|(_, p)| p).collect();

        let current_file = files.pop();
        let current_size = current_file
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        debug!(
            dir = %config.base_dir.display(),
            segments = files.len() + usize::from(current_file.is_some()),
            next_seq = file_seq,
            "opened file record store"
        );

        Ok(Self {
            config,
            state: RwLock::new(FileState {
                current_file,
                current_size,
                rotated_files: files,
            }),
            file_seq: AtomicU64::new(file_seq),
        })
    }

    /// Opens a file record store with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory cannot be created.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(FileRecordStoreConfig::new(base_dir))
    }

    /// Appends a record to the active segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let line = format!("{json}\n");
        let line_bytes = line.len() as u64;

        let mut state = self.state.write();

        // Rotate if this line would overflow a non-empty segment
        if state.current_size > 0 && state.current_size + line_bytes > self.config.max_file_size {
            self.rotate_locked(&mut state);
        }

        let path = match state.current_file {
            Some(ref path) => path.clone(),
            None => {
                let path = self.config.base_dir.join(self.generate_filename());
                state.current_file = Some(path.clone());
                state.current_size = 0;
                path
            }
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        state.current_size += line_bytes;

        Ok(())
    }

    /// Iterates lazily over all records, oldest segment first.
    #[must_use]
    pub fn iter(&self) -> RecordIter<'static> {
        let segments = self.state.read().segments();
        Box::new(SegmentReader::new(segments))
    }

    /// Gets a specific record by ID.
    ///
    /// Note: This is O(n) as it scans all files.
    #[must_use]
    pub fn get(&self, id: Ulid) -> Option<LogRecord> {
        self.iter().find(|record| record.id == id)
    }

    /// Rotates the active log file; the next append opens a new segment.
    pub fn rotate(&self) {
        let mut state = self.state.write();
        self.rotate_locked(&mut state);
    }

    /// Returns the number of log files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        let state = self.state.read();
        state.rotated_files.len() + usize::from(state.current_file.is_some())
    }

    /// Returns the total size of all log files in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        let state = self.state.read();
        let rotated: u64 = state
            .rotated_files
            .iter()
            .map(|path| fs::metadata(path).map_or(0, |m| m.len()))
            .sum();
        rotated + state.current_size
    }

    /// Clears all log files.
    ///
    /// # Errors
    ///
    /// Returns an error if files cannot be deleted.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write();

        for path in state.segments() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        state.rotated_files.clear();
        state.current_file = None;
        state.current_size = 0;

        Ok(())
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &FileRecordStoreConfig {
        &self.config
    }

    // ========== Internal Methods ==========

    fn rotate_locked(&self, state: &mut FileState) {
        if let Some(current) = state.current_file.take() {
            info!(segment = %current.display(), "rotating log segment");
            state.rotated_files.push(current);
        }
        state.current_size = 0;
    }

    fn generate_filename(&self) -> String {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let seq = self.file_seq.fetch_add(1, Ordering::Relaxed);
        // Sequence first so lexical order is creation order even across clock skew
        format!("{}_s{:06}_{}.log", self.config.file_prefix, seq, timestamp)
    }

    /// Parses the sequence number out of `{prefix}_s{seq}_{timestamp}.log`.
    fn segment_seq(path: &Path, prefix: &str) -> Option<u64> {
        if path.extension().is_none_or(|ext| ext != "log") {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let rest = stem.strip_prefix(prefix)?.strip_prefix("_s")?;
        let digits = rest.split('_').next()?;
        digits.parse().ok()
    }
}

/// Lazily walks segment files line by line.
struct SegmentReader {
    pending: VecDeque<PathBuf>,
    current: Option<(PathBuf, Lines<BufReader<File>>)>,
}

impl SegmentReader {
    fn new(segments: Vec<PathBuf>) -> Self {
        Self {
            pending: segments.into(),
            current: None,
        }
    }

    fn open_next(&mut self) -> bool {
        while let Some(path) = self.pending.pop_front() {
            match File::open(&path) {
                Ok(file) => {
                    self.current = Some((path, BufReader::new(file).lines()));
                    return true;
                }
                Err(e) => {
                    warn!(segment = %path.display(), error = %e, "skipping unreadable log segment");
                }
            }
        }
        false
    }
}

impl Iterator for SegmentReader {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        loop {
            if self.current.is_none() && !self.open_next() {
                return None;
            }
            let (path, lines) = self.current.as_mut()?;

            match lines.next() {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<LogRecord>(&line) {
                        Ok(record) => return Some(record),
                        Err(e) => {
                            debug!(segment = %path.display(), error = %e, "skipping corrupt log line");
                        }
                    }
                }
                Some(Err(e)) => {
                    debug!(segment = %path.display(), error = %e, "skipping unreadable log line");
                }
                None => self.current = None,
            }
        }
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl RecordStore for FileRecordStore {
    fn append(&self, record: &LogRecord) -> Result<()> {
        FileRecordStore::append(self, record)
    }

    fn iter(&self) -> RecordIter<'_> {
        FileRecordStore::iter(self)
    }

    fn get(&self, id: Ulid) -> Option<LogRecord> {
        FileRecordStore::get(self, id)
    }

    fn clear(&self) -> Result<()> {
        FileRecordStore::clear(self)
    }
}
