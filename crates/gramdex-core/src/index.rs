//! Inverted index from n-grams to the files containing them.
//!
//! ## Merge algebra
//!
//! Every build produces one small `InvertedIndex` per file and folds them
//! together with [`InvertedIndex::merge`]: a per-key bitmap union where keys
//! present on one side pass through untouched. The union is commutative and
//! associative, so strategies may combine partial results in any order or
//! grouping and still end up with the same postings.

use crate::ngram::{Tokenizer, Tokens};
use crate::reader::FileReader;
use crate::types::{FileId, NGramKey};
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Mapping n-gram -> posting bitmap of file IDs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    postings: HashMap<NGramKey, RoaringBitmap>,
}

impl InvertedIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-file index: every key maps to `{file_id}`.
    pub fn for_file(file_id: FileId, keys: impl IntoIterator<Item = NGramKey>) -> Self {
        let postings = keys
            .into_iter()
            .map(|key| {
                let mut bitmap = RoaringBitmap::new();
                bitmap.insert(file_id.as_u32());
                (key, bitmap)
            })
            .collect();
        InvertedIndex { postings }
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, mut other: InvertedIndex) {
        // fold the smaller map into the larger one
        if other.postings.len() > self.postings.len() {
            std::mem::swap(&mut self.postings, &mut other.postings);
        }
        for (key, bitmap) in other.postings {
            match self.postings.get_mut(&key) {
                Some(existing) => *existing |= bitmap,
                None => {
                    self.postings.insert(key, bitmap);
                }
            }
        }
    }

    /// By-value form of [`merge`](Self::merge), for reductions.
    pub fn merged(mut self, other: InvertedIndex) -> Self {
        self.merge(other);
        self
    }

    /// Posting bitmap for one n-gram.
    pub fn get(&self, key: &NGramKey) -> Option<&RoaringBitmap> {
        self.postings.get(key)
    }

    /// Number of distinct n-grams.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NGramKey, &RoaringBitmap)> {
        self.postings.iter()
    }

    /// Sum of all posting list lengths.
    pub fn entries_total(&self) -> u64 {
        self.postings.values().map(RoaringBitmap::len).sum()
    }
}

/// How one file fared during indexing.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Indexed(InvertedIndex),
    Rejected,
    Unreadable,
    Cancelled,
}

impl FileOutcome {
    /// The file's contribution to the index; empty unless indexed.
    pub fn into_index(self) -> InvertedIndex {
        match self {
            FileOutcome::Indexed(index) => index,
            _ => InvertedIndex::new(),
        }
    }
}

/// Tokenize one file straight from the reader's line stream.
///
/// The inspector's file gate runs before the file is opened. Neither an
/// unreadable file nor an inspector veto is an error: both are logged and
/// yield no postings.
pub fn index_file(
    path: &Path,
    file_id: FileId,
    tokenizer: &Tokenizer<'_>,
    reader: &dyn FileReader,
) -> FileOutcome {
    if !tokenizer.admits(path) {
        warn!(file = %path.display(), "File rejected by content inspector");
        return FileOutcome::Rejected;
    }

    let stream = match reader.read_lines(path) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "Skipping unreadable file");
            return FileOutcome::Unreadable;
        }
    };

    let mut failure: Option<io::Error> = None;
    let lines = stream.map_while(|line| match line {
        Ok(line) => Some(line),
        Err(err) => {
            failure = Some(err);
            None
        }
    });

    let tokens = tokenizer.admitted_ngrams(lines, path);

    if let Some(err) = failure {
        warn!(file = %path.display(), error = %err, "Skipping file that failed mid-read");
        return FileOutcome::Unreadable;
    }

    match tokens {
        Tokens::Accepted(keys) => {
            debug!(file = %path.display(), %file_id, ngrams = keys.len(), "Indexed file");
            FileOutcome::Indexed(InvertedIndex::for_file(file_id, keys))
        }
        Tokens::FileRejected => {
            warn!(file = %path.display(), "File rejected by content inspector");
            FileOutcome::Rejected
        }
        Tokens::NGramRejected { ngram, line } => {
            warn!(
                file = %path.display(),
                line,
                ngram = ?ngram,
                "File aborted by content inspector"
            );
            FileOutcome::Rejected
        }
        Tokens::Cancelled => FileOutcome::Cancelled,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::types::NGramInterner;
    use proptest::prelude::*;

    fn partials(files: &[Vec<u8>], interner: &NGramInterner) -> Vec<InvertedIndex> {
        files
            .iter()
            .enumerate()
            .map(|(id, keys)| {
                let keys = keys.iter().map(|k| interner.get_or_intern(format!("k{}", k)));
                InvertedIndex::for_file(FileId(id as u32), keys.collect::<Vec<_>>())
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_merge_order_and_grouping(
            files in prop::collection::vec(prop::collection::vec(0u8..12, 0..6), 1..8),
            seed in any::<u64>(),
        ) {
            let interner = NGramInterner::new();
            let parts = partials(&files, &interner);

            let left_fold = parts
                .iter()
                .cloned()
                .fold(InvertedIndex::new(), InvertedIndex::merged);

            let right_fold = parts
                .iter()
                .rev()
                .cloned()
                .fold(InvertedIndex::new(), |acc, part| part.merged(acc));

            // pairwise tree reduction over a rotated order
            let mut rotated = parts.clone();
            let shift = (seed as usize) % rotated.len();
            rotated.rotate_left(shift);
            while rotated.len() > 1 {
                let mut next = Vec::with_capacity(rotated.len() / 2 + 1);
                let mut iter = rotated.into_iter();
                while let Some(a) = iter.next() {
                    next.push(match iter.next() {
                        Some(b) => a.merged(b),
                        None => a,
                    });
                }
                rotated = next;
            }
            let tree = rotated.pop().unwrap_or_default();

            prop_assert_eq!(&left_fold, &right_fold);
            prop_assert_eq!(&left_fold, &tree);
        }
    }
}
