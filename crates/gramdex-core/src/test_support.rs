//! Test doubles shared by unit tests across modules.

use crate::build::CancellationToken;
use crate::inspect::{ContentInspector, FileFilter};
use crate::reader::{FileReader, LineStream};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct MemoryFile {
    lines: Vec<String>,
    /// Fail with an I/O error after the last line instead of ending.
    broken: bool,
}

/// File reader over an in-memory corpus.
///
/// Files are listed in insertion order. Roots are matched as path prefixes.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: RwLock<HashMap<PathBuf, MemoryFile>>,
    order: RwLock<Vec<PathBuf>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl AsRef<Path>, lines: &[&str]) -> Self {
        self.with_lines(path, lines.iter().map(|l| l.to_string()).collect())
    }

    pub fn with_lines(self, path: impl AsRef<Path>, lines: Vec<String>) -> Self {
        self.insert(path.as_ref(), lines, false);
        self
    }

    /// A file whose stream breaks after yielding `lines`.
    pub fn with_broken_file(self, path: impl AsRef<Path>, lines: &[&str]) -> Self {
        self.insert(
            path.as_ref(),
            lines.iter().map(|l| l.to_string()).collect(),
            true,
        );
        self
    }

    /// Remove a file, as if it was deleted from disk.
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.files.write().remove(path.as_ref());
        self.order.write().retain(|p| p != path.as_ref());
    }

    fn insert(&self, path: &Path, lines: Vec<String>, broken: bool) {
        let previous = self
            .files
            .write()
            .insert(path.to_path_buf(), MemoryFile { lines, broken });
        if previous.is_none() {
            self.order.write().push(path.to_path_buf());
        }
    }

    fn get(&self, path: &Path) -> io::Result<MemoryFile> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

impl FileReader for MemoryReader {
    fn read_lines(&self, path: &Path) -> io::Result<LineStream<'_>> {
        let file = self.get(path)?;
        let lines = file.lines.into_iter().map(Ok::<String, io::Error>);
        if file.broken {
            let failure = io::Error::new(io::ErrorKind::InvalidData, "stream broke");
            Ok(Box::new(lines.chain(std::iter::once(Err(failure)))))
        } else {
            Ok(Box::new(lines))
        }
    }

    fn list_files(
        &self,
        roots: &[PathBuf],
        filter: &dyn FileFilter,
        cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        self.order
            .read()
            .iter()
            .filter(|path| roots.iter().any(|root| path.starts_with(root)))
            .filter(|path| filter.accept(path))
            .cloned()
            .collect()
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        let file = self.get(path)?;
        let bytes: usize = file.lines.iter().map(|l| l.len()).sum();
        Ok((bytes + file.lines.len().saturating_sub(1)) as u64)
    }
}

/// Vetoes every file.
#[derive(Debug, Default)]
pub struct RejectAll;

impl ContentInspector for RejectAll {
    fn proceed_on_file(&self, _path: &Path) -> bool {
        false
    }

    fn proceed_on_ngram(&self, _ngram: &str, _line: usize, _path: &Path) -> bool {
        false
    }
}
