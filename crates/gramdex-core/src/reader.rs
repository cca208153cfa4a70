//! File access used by the build and by result scanning.
//!
//! The index never caches file contents. Everything goes through a
//! [`FileReader`], which is shared by all workers and must tolerate
//! concurrent calls for different files.

use crate::build::CancellationToken;
use crate::inspect::FileFilter;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Lazily read lines of one file, without their terminators.
pub type LineStream<'a> = Box<dyn Iterator<Item = io::Result<String>> + Send + 'a>;

/// Source of file lists and file contents.
pub trait FileReader: Send + Sync {
    /// Stream the lines of a file without reading it whole.
    fn read_lines(&self, path: &Path) -> io::Result<LineStream<'_>>;

    /// Read all lines of a file into memory.
    fn read_to_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        self.read_lines(path)?.collect()
    }

    /// Enumerate the files under `roots` accepted by `filter`.
    ///
    /// Stops early once `cancel` is set; the partial list is then
    /// meaningless and callers discard it.
    fn list_files(
        &self,
        roots: &[PathBuf],
        filter: &dyn FileFilter,
        cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        walk_roots(roots, filter, cancel)
    }

    /// Size of a file in bytes.
    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}

/// Buffered UTF-8 reader over the local filesystem.
///
/// `\n` and `\r\n` terminators are stripped. Invalid UTF-8 surfaces as an
/// `InvalidData` error from the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicFileReader;

impl BasicFileReader {
    pub fn new() -> Self {
        BasicFileReader
    }
}

impl FileReader for BasicFileReader {
    fn read_lines(&self, path: &Path) -> io::Result<LineStream<'_>> {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file).lines()))
    }
}

/// Walk every root and collect accepted regular files.
///
/// Directories are descended transparently, a root that is itself a file is
/// returned as is, symlinks are not followed. A file reachable from several
/// roots is listed once, at its first position. Entries that cannot be read
/// are logged and skipped. The walk is abandoned as soon as `cancel` is set.
pub fn walk_roots(
    roots: &[PathBuf],
    filter: &dyn FileFilter,
    cancel: &CancellationToken,
) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for root in roots {
        let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
        for entry in walker {
            if cancel.is_cancelled() {
                debug!(files = files.len(), "Enumeration cancelled");
                return files;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %root.display(), error = %err, "Skipping unreadable path");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            if filter.accept(&path) && seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    debug!(roots = roots.len(), files = files.len(), "Enumerated files");
    files
}
