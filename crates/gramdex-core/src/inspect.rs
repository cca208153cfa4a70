//! Indexing policies: which files to visit and which contents to keep.
//!
//! - A [`FileFilter`] decides from the path alone, during file enumeration.
//! - A [`ContentInspector`] is consulted while a file is tokenized and can
//!   veto the whole file before any content is read, or abort it halfway
//!   through. Either way the file contributes nothing to the index.
//!
//! One inspector instance is shared by every worker of a build, so
//! implementations must tolerate concurrent calls for different files.

use crate::error::{IndexError, Result};
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Per-file content policy consulted during tokenization.
pub trait ContentInspector: Send + Sync {
    /// Called exactly once per file, before any of its content is read.
    ///
    /// Returning false skips the file.
    fn proceed_on_file(&self, path: &Path) -> bool;

    /// Called once per generated n-gram, in file order.
    ///
    /// Calls for one file are never concurrent but may come from different
    /// threads. Returning false aborts the file and discards everything
    /// collected for it so far.
    fn proceed_on_ngram(&self, ngram: &str, line: usize, path: &Path) -> bool;
}

/// Path-based filter applied while enumerating files under the roots.
pub trait FileFilter: Send + Sync {
    /// Whether the file at `path` should be indexed
    fn accept(&self, path: &Path) -> bool;
}

impl<F> FileFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn accept(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Accepts every file and every n-gram.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ContentInspector for AcceptAll {
    fn proceed_on_file(&self, _path: &Path) -> bool {
        true
    }

    fn proceed_on_ngram(&self, _ngram: &str, _line: usize, _path: &Path) -> bool {
        true
    }
}

impl FileFilter for AcceptAll {
    fn accept(&self, _path: &Path) -> bool {
        true
    }
}

/// Glob-based include/exclude filter.
///
/// An empty include list accepts everything; exclusions always win.
#[derive(Debug, Clone, Default)]
pub struct GlobFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl GlobFilter {
    /// Compile include and exclude patterns.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(GlobFilter {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern).map_err(|e| {
                IndexError::config(format!("invalid file pattern {:?}: {}", pattern, e))
            })
        })
        .collect()
}

impl FileFilter for GlobFilter {
    fn accept(&self, path: &Path) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| p.matches_path(path));
        included && !self.exclude.iter().any(|p| p.matches_path(path))
    }
}

const LATIN: &str = "abcdefghijklmnopqrstuvwxyz";
const CYRILLIC: &str = "абвгдеёжзийклмнопрстуфхцчшщъыьэюя";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "~!@#$%^&*()_+-=,./?\\[]{}';\":|<>`";
const EXTRA_SYMBOLS: &str = "©⋯–…’";
const WHITESPACE: &str = "\t \n\r";

/// Characters expected in ordinary source files.
pub fn default_whitelist() -> HashSet<char> {
    let letters = LATIN.chars().chain(CYRILLIC.chars());
    letters
        .clone()
        .chain(letters.flat_map(char::to_uppercase))
        .chain(DIGITS.chars())
        .chain(SYMBOLS.chars())
        .chain(EXTRA_SYMBOLS.chars())
        .chain(WHITESPACE.chars())
        .collect()
}

/// Rejects files with more than `tolerance` distinct characters outside a
/// whitelist. Useful to keep binaries and generated blobs out of the index.
#[derive(Debug)]
pub struct WhitelistInspector {
    tolerance: usize,
    whitelist: HashSet<char>,
    suspicious: DashMap<PathBuf, HashSet<char>>,
}

impl WhitelistInspector {
    /// Inspector over [`default_whitelist`].
    pub fn new(tolerance: usize) -> Self {
        Self::with_whitelist(tolerance, default_whitelist())
    }

    /// Inspector over a custom whitelist.
    pub fn with_whitelist(tolerance: usize, whitelist: HashSet<char>) -> Self {
        WhitelistInspector {
            tolerance,
            whitelist,
            suspicious: DashMap::new(),
        }
    }

    /// Characters outside the whitelist seen so far in `path`, sorted.
    pub fn suspicious_chars(&self, path: &Path) -> Vec<char> {
        let mut chars: Vec<char> = self
            .suspicious
            .get(path)
            .map(|seen| seen.iter().copied().collect())
            .unwrap_or_default();
        chars.sort_unstable();
        chars
    }
}

impl ContentInspector for WhitelistInspector {
    fn proceed_on_file(&self, path: &Path) -> bool {
        // a rebuild inspects the file afresh
        self.suspicious.remove(path);
        true
    }

    fn proceed_on_ngram(&self, ngram: &str, line: usize, path: &Path) -> bool {
        let mut seen_count = None;
        for ch in ngram.chars().filter(|ch| !self.whitelist.contains(ch)) {
            let mut seen = self.suspicious.entry(path.to_path_buf()).or_default();
            if seen.insert(ch) {
                warn!(
                    file = %path.display(),
                    line,
                    character = ?ch,
                    "First occurrence of suspicious character"
                );
            }
            seen_count = Some(seen.len());
        }
        seen_count.map_or(true, |count| count <= self.tolerance)
    }
}
