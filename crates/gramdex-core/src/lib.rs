//! # Gramdex Core Library
//!
//! In-memory n-gram index over source trees. A build maps every
//! fixed-length substring of every file to the set of files containing it;
//! a query intersects those sets for the n-grams of the pattern and can
//! rescan the candidates for exact line and offset positions.
//!
//! ## Architecture
//!
//! - **Windowing** (`window`): lazy sliding windows over joined lines
//! - **Tokenizer** (`ngram`): query n-grams and per-file distinct n-gram sets
//! - **Index** (`index`): roaring-bitmap postings and their union merge
//! - **Build** (`build`): sequential, fork-join and pipeline strategies
//! - **Builder** (`builder`): build lifecycle, cancellation, current snapshot
//! - **Snapshot** (`snapshot`): immutable queryable index with stats
//! - **Scanner** (`scan`): exact multiline match positions
//! - **Policies** (`inspect`, `reader`): content inspectors, file filters,
//!   file access
//! - **Config** (`config`): configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use gramdex_core::{BuildOutcome, IndexBuilder};
//!
//! let builder = IndexBuilder::new().with_root("src").with_arity(3)?;
//! if let BuildOutcome::Ready { snapshot, .. } = builder.build_and_wait()? {
//!     for (path, lines) in snapshot.query_and_scan("fn main")? {
//!         for (line, offsets) in lines {
//!             println!("{}:{}: {:?}", path.display(), line + 1, offsets);
//!         }
//!     }
//! }
//! # Ok::<(), gramdex_core::IndexError>(())
//! ```

pub mod build;
pub mod builder;
pub mod config;
pub mod error;
pub mod index;
pub mod inspect;
pub mod ngram;
pub mod reader;
pub mod scan;
pub mod snapshot;
pub mod types;
pub mod window;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use build::{BuildStrategy, CancellationToken, ForkJoin, Pipeline, Sequential, StrategyKind};
pub use builder::{BuildOutcome, BuilderState, IndexBuilder, PendingBuild};
pub use config::Config;
pub use error::{IndexError, Result};
pub use index::InvertedIndex;
pub use inspect::{AcceptAll, ContentInspector, FileFilter, GlobFilter, WhitelistInspector};
pub use reader::{BasicFileReader, FileReader};
pub use scan::MultilineScanner;
pub use snapshot::IndexSnapshot;
pub use types::{BuildReport, FileId, IndexStats, LineMatches, ScanResults};
