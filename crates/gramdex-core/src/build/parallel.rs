use super::{file_id, BuildContext, BuildStrategy};
use crate::error::{IndexError, Result};
use crate::index::InvertedIndex;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Fork-join build: files are mapped to partial indices in parallel and
/// reduced pairwise.
///
/// Runs on the global rayon pool unless a thread count is given, in which
/// case a dedicated pool is created per build.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkJoin {
    threads: Option<usize>,
}

impl ForkJoin {
    /// Use a dedicated pool of `threads` workers (0 means the global pool).
    pub fn with_threads(threads: usize) -> Self {
        ForkJoin {
            threads: (threads > 0).then_some(threads),
        }
    }

    fn map_reduce(files: &[PathBuf], ctx: &BuildContext) -> InvertedIndex {
        files
            .par_iter()
            .enumerate()
            .map(|(i, path)| ctx.index_file(file_id(i), path))
            .reduce(InvertedIndex::new, InvertedIndex::merged)
    }
}

impl BuildStrategy for ForkJoin {
    fn name(&self) -> &'static str {
        "parallel"
    }

    #[instrument(skip_all, fields(files = files.len(), threads = ?self.threads))]
    fn build(&self, files: &[PathBuf], ctx: &BuildContext) -> Result<InvertedIndex> {
        match self.threads {
            None => Ok(Self::map_reduce(files, ctx)),
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("gramdex-worker-{}", i))
                    .build()
                    .map_err(|e| IndexError::build_failed(format!("thread pool: {}", e)))?;
                debug!(threads, "Created dedicated build pool");
                Ok(pool.install(|| Self::map_reduce(files, ctx)))
            }
        }
    }
}
