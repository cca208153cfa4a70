//! Immutable, queryable result of a build.
//!
//! A snapshot owns its inverted index, the filename table its file IDs
//! point into and the interner its n-gram keys come from. Nothing in it
//! changes after construction, so it is shared as `Arc<IndexSnapshot>` and
//! queried from any number of threads without locking. Statistics are
//! computed on first use and memoized.
//!
//! File contents are never cached: [`IndexSnapshot::query_and_scan`] reads
//! matched files again through the snapshot's [`FileReader`].

use crate::error::{IndexError, Result};
use crate::index::InvertedIndex;
use crate::ngram::ngrams_of;
use crate::reader::FileReader;
use crate::scan::MultilineScanner;
use crate::types::{IndexStats, LineMatches, NGramInterner, ScanResults};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use roaring::RoaringBitmap;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

/// Matched files above this count are scanned on the rayon pool.
const PARALLEL_SCAN_THRESHOLD: usize = 10;

pub struct IndexSnapshot {
    n: usize,
    separator: String,
    index: InvertedIndex,
    files: Vec<PathBuf>,
    interner: Arc<NGramInterner>,
    reader: Arc<dyn FileReader>,
    built_at: Option<DateTime<Utc>>,
    stats: OnceLock<IndexStats>,
}

impl IndexSnapshot {
    /// Wrap a finished build. `files[id]` must name the file behind every
    /// ID stored in `index`.
    pub(crate) fn new(
        n: usize,
        separator: impl Into<String>,
        index: InvertedIndex,
        files: Vec<PathBuf>,
        interner: Arc<NGramInterner>,
        reader: Arc<dyn FileReader>,
    ) -> Self {
        IndexSnapshot {
            n,
            separator: separator.into(),
            index,
            files,
            interner,
            reader,
            built_at: Some(Utc::now()),
            stats: OnceLock::new(),
        }
    }

    /// Snapshot served before the first successful build.
    ///
    /// Patterns are still validated against `n`; valid ones match nothing.
    pub(crate) fn empty(n: usize, separator: impl Into<String>, reader: Arc<dyn FileReader>) -> Self {
        IndexSnapshot {
            n,
            separator: separator.into(),
            index: InvertedIndex::new(),
            files: Vec::new(),
            interner: Arc::new(NGramInterner::new()),
            reader,
            built_at: None,
            stats: OnceLock::new(),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// The filename table, indexed by file ID.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    /// True for the snapshot of a build that never happened.
    pub fn is_empty(&self) -> bool {
        self.built_at.is_none()
    }

    fn validate(&self, pattern: &str) -> Result<()> {
        if self.n == 0 {
            return Err(IndexError::InvalidArity { n: self.n });
        }
        if pattern.is_empty() {
            return Err(IndexError::EmptyPattern);
        }
        let len = pattern.chars().count();
        if len < self.n {
            return Err(IndexError::PatternTooShort {
                pattern: pattern.to_string(),
                len,
                n: self.n,
            });
        }
        Ok(())
    }

    /// IDs of files containing every n-gram of `pattern`.
    fn candidates(&self, pattern: &str) -> Result<RoaringBitmap> {
        self.validate(pattern)?;

        let mut seen = HashSet::new();
        let mut postings = Vec::new();
        for ngram in ngrams_of(pattern, self.n) {
            if !seen.insert(ngram.clone()) {
                continue;
            }
            let bitmap = self
                .interner
                .get(&ngram)
                .and_then(|key| self.index.get(&key));
            match bitmap {
                Some(bitmap) => postings.push(bitmap),
                None => return Ok(RoaringBitmap::new()),
            }
        }

        // start from the rarest n-gram
        postings.sort_by_key(|bitmap| bitmap.len());
        let Some((first, rest)) = postings.split_first() else {
            return Ok(RoaringBitmap::new());
        };
        let mut result = (*first).clone();
        for bitmap in rest {
            result &= *bitmap;
            if result.is_empty() {
                break;
            }
        }
        Ok(result)
    }

    /// Files containing every n-gram of `pattern`.
    ///
    /// This is a candidate set: a file may contain all n-grams without
    /// containing the pattern itself. Use [`query_and_scan`](Self::query_and_scan)
    /// for verified positions.
    #[instrument(skip(self), level = "debug")]
    pub fn query(&self, pattern: &str) -> Result<BTreeSet<PathBuf>> {
        let ids = self.candidates(pattern)?;
        let files: BTreeSet<PathBuf> = ids
            .iter()
            .filter_map(|id| self.files.get(id as usize).cloned())
            .collect();
        debug!(matches = files.len(), "Query complete");
        Ok(files)
    }

    /// Exact match positions of `pattern` in every candidate file.
    ///
    /// Candidates without a verified occurrence are omitted, as are files
    /// that can no longer be read.
    #[instrument(skip(self), level = "debug")]
    pub fn query_and_scan(&self, pattern: &str) -> Result<ScanResults> {
        let files: Vec<PathBuf> = self.query(pattern)?.into_iter().collect();
        let scanner = MultilineScanner::new(pattern, &self.separator);

        let scan = |path: PathBuf| {
            let matches = self.scan_file(&path, &scanner)?;
            (!matches.is_empty()).then_some((path, matches))
        };

        let results: ScanResults = if files.len() > PARALLEL_SCAN_THRESHOLD {
            files.into_par_iter().filter_map(scan).collect()
        } else {
            files.into_iter().filter_map(scan).collect()
        };
        debug!(files = results.len(), "Scan complete");
        Ok(results)
    }

    fn scan_file(&self, path: &Path, scanner: &MultilineScanner) -> Option<LineMatches> {
        let stream = match self.reader.read_lines(path) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "Matched file is no longer readable");
                return None;
            }
        };

        let mut failure: Option<io::Error> = None;
        let matches = scanner.scan(stream.map_while(|line| match line {
            Ok(line) => Some(line),
            Err(err) => {
                failure = Some(err);
                None
            }
        }));

        match failure {
            Some(err) => {
                warn!(file = %path.display(), error = %err, "Matched file failed mid-read");
                None
            }
            None => Some(matches),
        }
    }

    /// Aggregate statistics, computed once.
    pub fn stats(&self) -> &IndexStats {
        self.stats.get_or_init(|| self.compute_stats())
    }

    fn compute_stats(&self) -> IndexStats {
        let sizes: Vec<u64> = self
            .files
            .iter()
            .filter_map(|path| match self.reader.file_size(path) {
                Ok(size) => Some(size),
                Err(err) => {
                    debug!(file = %path.display(), error = %err, "No size for file");
                    None
                }
            })
            .collect();
        let file_size_total: u64 = sizes.iter().sum();

        let ngrams = self.index.len();
        let entries_total = self.index.entries_total();
        let entries_per_ngram_max = self
            .index
            .iter()
            .map(|(_, bitmap)| bitmap.len())
            .max()
            .unwrap_or(0);

        let alphabet: BTreeSet<char> = self
            .index
            .iter()
            .flat_map(|(key, _)| self.interner.resolve(key).chars())
            .collect();

        IndexStats {
            ngrams,
            files: self.files.len(),
            file_size_min: sizes.iter().copied().min().unwrap_or(0),
            file_size_max: sizes.iter().copied().max().unwrap_or(0),
            file_size_total,
            file_size_avg: ratio(file_size_total, sizes.len()),
            entries_total,
            entries_per_ngram_max,
            entries_per_ngram_avg: ratio(entries_total, ngrams),
            avg_ngrams_per_file: ratio(entries_total, self.files.len()),
            alphabet: alphabet.into_iter().collect(),
            built_at: self.built_at,
        }
    }
}

fn ratio(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

impl fmt::Debug for IndexSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSnapshot")
            .field("n", &self.n)
            .field("separator", &self.separator)
            .field("ngrams", &self.index.len())
            .field("files", &self.files.len())
            .field("built_at", &self.built_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildContext, BuildStrategy, Sequential};
    use crate::inspect::AcceptAll;
    use crate::test_support::MemoryReader;

    fn snapshot(n: usize, reader: Arc<MemoryReader>, files: &[&str]) -> IndexSnapshot {
        let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
        let ctx = BuildContext::new(n, "\n", Arc::new(AcceptAll), reader.clone()).unwrap();
        let index = Sequential.build(&files, &ctx).unwrap();
        IndexSnapshot::new(n, "\n", index, files, ctx.interner().clone(), reader)
    }

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_kindly_scenario() {
        let reader = Arc::new(MemoryReader::new().with_file("that.txt", &["Would you kindly index this?"]));
        let snapshot = snapshot(3, reader, &["that.txt"]);

        assert_eq!(snapshot.query("Would").unwrap(), set(&["that.txt"]));
        assert!(snapshot.query("notHappening").unwrap().is_empty());

        let err = snapshot.query("Wo").unwrap_err();
        assert!(matches!(err, IndexError::PatternTooShort { len: 2, n: 3, .. }));
        assert!(matches!(snapshot.query(""), Err(IndexError::EmptyPattern)));
    }

    #[test]
    fn test_query_is_a_candidate_set() {
        let reader = Arc::new(
            MemoryReader::new()
                .with_file("a", &["abcd"])
                .with_file("b", &["abc", "bcd"])
                .with_file("c", &["xyz"]),
        );
        let snapshot = snapshot(3, reader, &["a", "b", "c"]);

        // "b" holds both n-grams but not the pattern
        assert_eq!(snapshot.query("abcd").unwrap(), set(&["a", "b"]));

        let scanned = snapshot.query_and_scan("abcd").unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[&PathBuf::from("a")], LineMatches::from([(0, vec![0])]));
    }

    #[test]
    fn test_query_and_scan_across_lines() {
        let reader = Arc::new(MemoryReader::new().with_file("f.rs", &["fn foo", "bar()"]));
        let snapshot = snapshot(2, reader, &["f.rs"]);

        let scanned = snapshot.query_and_scan("oo\nba").unwrap();
        assert_eq!(scanned[&PathBuf::from("f.rs")], LineMatches::from([(0, vec![4])]));
    }

    #[test]
    fn test_idempotent_queries() {
        let reader = Arc::new(
            MemoryReader::new()
                .with_file("a", &["hello world"])
                .with_file("b", &["world peace"]),
        );
        let snapshot = snapshot(3, reader, &["a", "b"]);

        let first = (snapshot.query("world").unwrap(), snapshot.query_and_scan("world").unwrap());
        let second = (snapshot.query("world").unwrap(), snapshot.query_and_scan("world").unwrap());
        assert_eq!(first, second);
        assert_eq!(first.0.len(), 2);
    }

    #[test]
    fn test_deleted_file_is_dropped_from_scan() {
        let reader = Arc::new(
            MemoryReader::new()
                .with_file("keep", &["needle here"])
                .with_file("gone", &["needle there"]),
        );
        let snapshot = snapshot(3, reader.clone(), &["keep", "gone"]);
        reader.remove("gone");

        // the index still names the file, the scan no longer can read it
        assert_eq!(snapshot.query("needle").unwrap(), set(&["gone", "keep"]));
        let scanned = snapshot.query_and_scan("needle").unwrap();
        assert_eq!(scanned.keys().collect::<Vec<_>>(), vec![&PathBuf::from("keep")]);
        assert_eq!(scanned[&PathBuf::from("keep")], LineMatches::from([(0, vec![0])]));
    }

    #[test]
    fn test_parallel_scan() {
        let mut reader = MemoryReader::new();
        let mut names = Vec::new();
        for i in 0..(PARALLEL_SCAN_THRESHOLD * 3) {
            let name = format!("file{:02}", i);
            reader = reader.with_lines(&name, vec![format!("{} shared token", i)]);
            names.push(name);
        }
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let snapshot = snapshot(3, Arc::new(reader), &names);

        let scanned = snapshot.query_and_scan("shared").unwrap();
        assert_eq!(scanned.len(), PARALLEL_SCAN_THRESHOLD * 3);
    }

    #[test]
    fn test_stats() {
        let reader = Arc::new(
            MemoryReader::new()
                .with_file("a", &["abcd"])
                .with_file("b", &["bcde", "f"]),
        );
        let snapshot = snapshot(3, reader, &["a", "b"]);
        let stats = snapshot.stats();

        // a: abc bcd; b: bcd cde de\n e\nf
        assert_eq!(stats.files, 2);
        assert_eq!(stats.ngrams, snapshot.index().len());
        assert_eq!(stats.ngrams, 5);
        assert_eq!(stats.entries_total, 6);
        assert_eq!(stats.entries_per_ngram_max, 2);
        assert_eq!(stats.avg_ngrams_per_file, 3.0);
        assert_eq!(stats.file_size_min, 4);
        assert_eq!(stats.file_size_max, 6);
        assert_eq!(stats.file_size_total, 10);
        assert_eq!(stats.alphabet, "\nabcdef");
        assert!(stats.built_at.is_some());

        // memoized
        assert!(std::ptr::eq(stats, snapshot.stats()));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = IndexSnapshot::empty(3, "\n", Arc::new(MemoryReader::new()));
        assert!(snapshot.is_empty());
        assert!(snapshot.query("abc").unwrap().is_empty());
        assert!(snapshot.query("ab").is_err());
        assert_eq!(snapshot.stats().files, 0);
        assert_eq!(snapshot.stats().entries_per_ngram_max, 0);
        assert_eq!(snapshot.stats().file_size_avg, 0.0);
    }

    #[test]
    fn test_zero_arity_is_an_error() {
        let snapshot = IndexSnapshot::empty(0, "\n", Arc::new(MemoryReader::new()));
        assert!(matches!(snapshot.query("abc"), Err(IndexError::InvalidArity { n: 0 })));
        assert!(matches!(
            snapshot.query_and_scan("abc"),
            Err(IndexError::InvalidArity { n: 0 })
        ));
    }
}
