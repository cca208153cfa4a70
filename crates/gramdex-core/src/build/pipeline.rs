use super::{file_id, BuildContext, BuildStrategy};
use crate::error::{IndexError, Result};
use crate::index::InvertedIndex;
use crate::types::FileId;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread::{self, ScopedJoinHandle};
use tracing::{debug, instrument, trace};

const DEFAULT_READERS: usize = 8;
const DEFAULT_MERGERS: usize = 2;
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Bounded producer/reader/merger pipeline.
///
/// ```text
/// producer --file queue--> N readers --partial queue--> M mergers
/// ```
///
/// The producer feeds file IDs and paths, readers turn each file into a
/// partial index, mergers fold partials into their own accumulator. The
/// accumulators are merged once every merger has finished. At most
/// `file_queue + readers` files and `partial_queue + readers` partial
/// indices exist at any time.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    readers: usize,
    mergers: usize,
    file_queue: usize,
    partial_queue: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline {
            readers: DEFAULT_READERS,
            mergers: DEFAULT_MERGERS,
            file_queue: DEFAULT_QUEUE_CAPACITY,
            partial_queue: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Pipeline {
    /// Pipeline with `readers` reader and `mergers` merger threads.
    pub fn new(readers: usize, mergers: usize) -> Result<Self> {
        positive("readers", readers)?;
        positive("mergers", mergers)?;
        Ok(Pipeline {
            readers,
            mergers,
            ..Default::default()
        })
    }

    /// Set the capacities of the file and partial-index queues.
    pub fn with_queue_capacities(mut self, file_queue: usize, partial_queue: usize) -> Result<Self> {
        positive("file queue capacity", file_queue)?;
        positive("partial queue capacity", partial_queue)?;
        self.file_queue = file_queue;
        self.partial_queue = partial_queue;
        Ok(self)
    }

    pub fn readers(&self) -> usize {
        self.readers
    }

    pub fn mergers(&self) -> usize {
        self.mergers
    }

    pub fn file_queue(&self) -> usize {
        self.file_queue
    }

    pub fn partial_queue(&self) -> usize {
        self.partial_queue
    }
}

fn positive(what: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(IndexError::config(format!("pipeline {} must be at least 1", what)));
    }
    Ok(())
}

fn spawn_failed(err: std::io::Error) -> IndexError {
    IndexError::build_failed(format!("failed to spawn pipeline thread: {}", err))
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> Result<T> {
    let name = handle.thread().name().unwrap_or("pipeline").to_string();
    handle
        .join()
        .map_err(|_| IndexError::build_failed(format!("{} thread panicked", name)))
}

fn produce<'a>(files: &'a [PathBuf], ctx: &BuildContext, tx: Sender<(FileId, &'a Path)>) {
    for (i, path) in files.iter().enumerate() {
        if ctx.is_cancelled() {
            debug!(queued = i, "Producer stopped by cancellation");
            return;
        }
        if tx.send((file_id(i), path.as_path())).is_err() {
            return;
        }
    }
}

fn read(ctx: &BuildContext, rx: Receiver<(FileId, &Path)>, tx: Sender<InvertedIndex>) {
    for (id, path) in rx {
        if ctx.is_cancelled() {
            return;
        }
        let partial = ctx.index_file(id, path);
        if partial.is_empty() {
            continue;
        }
        if tx.send(partial).is_err() {
            return;
        }
    }
}

fn merge(rx: Receiver<InvertedIndex>) -> InvertedIndex {
    let mut accumulated = InvertedIndex::new();
    let mut partials = 0usize;
    for partial in rx {
        accumulated.merge(partial);
        partials += 1;
    }
    trace!(partials, ngrams = accumulated.len(), "Merger finished");
    accumulated
}

impl BuildStrategy for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    #[instrument(skip_all, fields(files = files.len(), readers = self.readers, mergers = self.mergers))]
    fn build(&self, files: &[PathBuf], ctx: &BuildContext) -> Result<InvertedIndex> {
        thread::scope(|scope| {
            let (file_tx, file_rx) = bounded(self.file_queue);
            let (partial_tx, partial_rx) = bounded(self.partial_queue);

            let producer = thread::Builder::new()
                .name("gramdex-producer".to_string())
                .spawn_scoped(scope, move || produce(files, ctx, file_tx))
                .map_err(spawn_failed)?;

            let mut readers = Vec::with_capacity(self.readers);
            for i in 0..self.readers {
                let (rx, tx) = (file_rx.clone(), partial_tx.clone());
                let handle = thread::Builder::new()
                    .name(format!("gramdex-reader-{}", i))
                    .spawn_scoped(scope, move || read(ctx, rx, tx))
                    .map_err(spawn_failed)?;
                readers.push(handle);
            }

            let mut mergers = Vec::with_capacity(self.mergers);
            for i in 0..self.mergers {
                let rx = partial_rx.clone();
                let handle = thread::Builder::new()
                    .name(format!("gramdex-merger-{}", i))
                    .spawn_scoped(scope, move || merge(rx))
                    .map_err(spawn_failed)?;
                mergers.push(handle);
            }

            // only the workers hold channel ends from here on
            drop(file_rx);
            drop(partial_tx);
            drop(partial_rx);

            // every handle is joined so a panicked worker surfaces as an error
            let mut failures = Vec::new();
            let mut index = InvertedIndex::new();
            for handle in mergers {
                match join(handle) {
                    Ok(partial) => index.merge(partial),
                    Err(err) => failures.push(err),
                }
            }
            failures.extend(
                readers
                    .into_iter()
                    .chain(std::iter::once(producer))
                    .filter_map(|handle| join(handle).err()),
            );

            match failures.into_iter().next() {
                Some(err) => Err(err),
                None => Ok(index),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{AcceptAll, ContentInspector};
    use crate::test_support::MemoryReader;
    use std::sync::Arc;

    fn corpus(files: usize) -> (MemoryReader, Vec<PathBuf>) {
        let mut reader = MemoryReader::new();
        let mut paths = Vec::new();
        for i in 0..files {
            let path = PathBuf::from(format!("src/file{}.rs", i));
            reader = reader.with_lines(&path, vec![format!("fn item_{}() {{}}", i), "// shared".to_string()]);
            paths.push(path);
        }
        (reader, paths)
    }

    #[test]
    fn test_sizing_validation() {
        assert!(Pipeline::new(0, 1).unwrap_err().is_configuration_error());
        assert!(Pipeline::new(1, 0).is_err());
        assert!(Pipeline::default().with_queue_capacities(0, 4).is_err());
        assert!(Pipeline::default().with_queue_capacities(4, 0).is_err());

        let pipeline = Pipeline::new(3, 1).unwrap();
        assert_eq!((pipeline.readers(), pipeline.mergers()), (3, 1));
    }

    #[test]
    fn test_pipeline_build() {
        let (reader, files) = corpus(100);
        let ctx = BuildContext::new(3, "\n", Arc::new(AcceptAll), Arc::new(reader)).unwrap();
        let pipeline = Pipeline::new(4, 2).unwrap().with_queue_capacities(2, 2).unwrap();

        let index = pipeline.build(&files, &ctx).unwrap();
        let shared = ctx.interner().get("sha").unwrap();
        assert_eq!(index.get(&shared).unwrap().len(), 100);
        assert_eq!(ctx.report(files.len(), Default::default()).indexed, 100);
    }

    #[test]
    fn test_pipeline_empty_input() {
        let ctx = BuildContext::new(3, "\n", Arc::new(AcceptAll), Arc::new(MemoryReader::new())).unwrap();
        assert!(Pipeline::default().build(&[], &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_pipeline_cancelled_upfront() {
        let (reader, files) = corpus(20);
        let ctx = BuildContext::new(3, "\n", Arc::new(AcceptAll), Arc::new(reader)).unwrap();
        ctx.cancellation().cancel();

        let index = Pipeline::default().build(&files, &ctx).unwrap();
        assert!(index.is_empty());
        assert_eq!(ctx.report(files.len(), Default::default()).indexed, 0);
    }

    struct Explodes;

    impl ContentInspector for Explodes {
        fn proceed_on_file(&self, _path: &Path) -> bool {
            panic!("inspector exploded")
        }

        fn proceed_on_ngram(&self, _: &str, _: usize, _: &Path) -> bool {
            true
        }
    }

    #[test]
    fn test_reader_panic_becomes_build_failure() {
        let (reader, files) = corpus(4);
        let ctx = BuildContext::new(3, "\n", Arc::new(Explodes), Arc::new(reader)).unwrap();

        let err = Pipeline::new(2, 1).unwrap().build(&files, &ctx).unwrap_err();
        assert!(matches!(err, IndexError::BuildFailed { .. }));
    }
}
