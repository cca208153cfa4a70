//! Core data types for Gramdex.
//!
//! These types are shared between the build pipeline, the snapshot and the
//! command-line front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Default n-gram arity.
pub const DEFAULT_ARITY: usize = 3;

/// Default separator placed between lines when a file is tokenized or scanned.
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Interned n-gram symbol.
pub type NGramKey = lasso::Spur;

/// Build-wide n-gram pool shared by all workers of one build.
pub type NGramInterner = lasso::ThreadedRodeo<NGramKey>;

/// Matches inside one file: line -> ordered character offsets.
pub type LineMatches = BTreeMap<usize, Vec<usize>>;

/// Scan results: file -> line -> ordered character offsets.
pub type ScanResults = BTreeMap<PathBuf, LineMatches>;

/// Position of a file in a snapshot's filename table.
///
/// Assigned at build time and only meaningful within the snapshot that
/// assigned it. 32 bits wide to match the posting bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Largest number of files one snapshot can address.
    pub const CEILING: usize = u32::MAX as usize;

    /// Create a new file ID
    pub fn new(id: u32) -> Self {
        FileId(id)
    }

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Position in the filename table
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate figures about one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Distinct n-grams in the index
    pub ngrams: usize,

    /// Files in the filename table
    pub files: usize,

    /// Smallest indexed file in bytes
    pub file_size_min: u64,

    /// Largest indexed file in bytes
    pub file_size_max: u64,

    /// Total size of indexed files in bytes
    pub file_size_total: u64,

    /// Average file size in bytes
    pub file_size_avg: f64,

    /// Sum of all posting list lengths
    pub entries_total: u64,

    /// Longest posting list
    pub entries_per_ngram_max: u64,

    /// Average posting list length
    pub entries_per_ngram_avg: f64,

    /// Average number of distinct n-grams per file
    pub avg_ngrams_per_file: f64,

    /// Every character seen in n-gram keys, sorted
    pub alphabet: String,

    /// When the snapshot was built (None for the empty snapshot)
    pub built_at: Option<DateTime<Utc>>,
}

/// Counters describing how one build went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Files enumerated under the roots
    pub files: usize,

    /// Files whose n-grams made it into the index
    pub indexed: usize,

    /// Files vetoed by the content inspector
    pub rejected: usize,

    /// Files that could not be read
    pub unreadable: usize,

    /// Wall-clock build time in milliseconds
    pub elapsed_ms: u64,
}
