//! Build strategies.
//!
//! A strategy turns an ordered file list into one merged [`InvertedIndex`].
//! The position of a file in the list is its [`FileId`]. Strategies differ
//! only in scheduling:
//!
//! - [`Sequential`] indexes files one at a time on the calling thread.
//! - [`ForkJoin`] maps files to partial indices on a rayon pool and reduces
//!   them pairwise.
//! - [`Pipeline`] connects a filename producer, reader workers and merger
//!   workers with bounded channels, so the number of files in flight does
//!   not grow with the corpus.
//!
//! All of them share a [`BuildContext`] holding the arity, separator,
//! inspector, reader, interner and cancellation token of one build, and all
//! of them produce the same postings for the same input.

mod parallel;
mod pipeline;
mod sequential;

pub use parallel::ForkJoin;
pub use pipeline::Pipeline;
pub use sequential::Sequential;

use crate::error::{IndexError, Result};
use crate::index::{self, FileOutcome, InvertedIndex};
use crate::inspect::ContentInspector;
use crate::ngram::Tokenizer;
use crate::reader::FileReader;
use crate::types::{BuildReport, FileId, NGramInterner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Files between two progress log lines.
const PROGRESS_INTERVAL: usize = 1000;

/// Cooperative cancellation flag shared by every worker of one build.
///
/// Cancelling is idempotent; once set the flag never clears.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything one build needs, shared by all of its workers.
pub struct BuildContext {
    n: usize,
    separator: String,
    inspector: Arc<dyn ContentInspector>,
    reader: Arc<dyn FileReader>,
    interner: Arc<NGramInterner>,
    cancel: CancellationToken,
    processed: AtomicUsize,
    indexed: AtomicUsize,
    rejected: AtomicUsize,
    unreadable: AtomicUsize,
}

impl BuildContext {
    /// Context with a fresh interner and its own cancellation token.
    pub fn new(
        n: usize,
        separator: impl Into<String>,
        inspector: Arc<dyn ContentInspector>,
        reader: Arc<dyn FileReader>,
    ) -> Result<Self> {
        if n == 0 {
            return Err(IndexError::InvalidArity { n });
        }
        Ok(BuildContext {
            n,
            separator: separator.into(),
            inspector,
            reader,
            interner: Arc::new(NGramInterner::new()),
            cancel: CancellationToken::new(),
            processed: AtomicUsize::new(0),
            indexed: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            unreadable: AtomicUsize::new(0),
        })
    }

    /// Observe `cancel` instead of the context's own token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn reader(&self) -> &Arc<dyn FileReader> {
        &self.reader
    }

    pub fn interner(&self) -> &Arc<NGramInterner> {
        &self.interner
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tokenizer bound to this build's settings.
    pub fn tokenizer(&self) -> Tokenizer<'_> {
        Tokenizer::new(self.n, &self.separator, self.inspector.as_ref(), &self.interner)
            .with_cancellation(&self.cancel)
    }

    /// Index one file and count the outcome.
    ///
    /// Returns an empty index without touching the file once the build is
    /// cancelled.
    pub fn index_file(&self, file_id: FileId, path: &Path) -> InvertedIndex {
        if self.is_cancelled() {
            return InvertedIndex::new();
        }

        let outcome = index::index_file(path, file_id, &self.tokenizer(), self.reader.as_ref());
        let counter = match &outcome {
            FileOutcome::Indexed(_) => Some(&self.indexed),
            FileOutcome::Rejected => Some(&self.rejected),
            FileOutcome::Unreadable => Some(&self.unreadable),
            FileOutcome::Cancelled => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
            let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
            if processed % PROGRESS_INTERVAL == 0 {
                debug!(files = processed, "Build progress");
            }
        }
        outcome.into_index()
    }

    /// Counters collected so far.
    pub fn report(&self, files: usize, elapsed: Duration) -> BuildReport {
        BuildReport {
            files,
            indexed: self.indexed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unreadable: self.unreadable.load(Ordering::Relaxed),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Scheduling policy for turning a file list into one merged index.
///
/// A cancelled build may return whatever it accumulated; the caller checks
/// the context's token and discards it.
pub trait BuildStrategy: Send + Sync + fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Index `files`, where each file's position is its ID.
    fn build(&self, files: &[PathBuf], ctx: &BuildContext) -> Result<InvertedIndex>;
}

/// File ID for position `i` of the file list.
///
/// The builder rejects lists longer than [`FileId::CEILING`] before any
/// strategy runs.
pub(crate) fn file_id(i: usize) -> FileId {
    FileId(i as u32)
}

/// Built-in strategies, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Sequential,
    Parallel,
    #[default]
    Pipeline,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Sequential => write!(f, "sequential"),
            StrategyKind::Parallel => write!(f, "parallel"),
            StrategyKind::Pipeline => write!(f, "pipeline"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(StrategyKind::Sequential),
            "parallel" | "forkjoin" | "fork-join" => Ok(StrategyKind::Parallel),
            "pipeline" => Ok(StrategyKind::Pipeline),
            other => Err(IndexError::config(format!(
                "unknown build strategy {:?} (expected sequential, parallel or pipeline)",
                other
            ))),
        }
    }
}
