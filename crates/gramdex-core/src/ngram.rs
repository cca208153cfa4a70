//! N-gram extraction for queries and for indexed files.

use crate::build::CancellationToken;
use crate::inspect::ContentInspector;
use crate::types::{NGramInterner, NGramKey};
use crate::window::windowed;
use std::collections::HashSet;
use std::path::Path;

/// All n-grams of `pattern` in order, duplicates included.
///
/// Yields nothing when the pattern is shorter than `n`; callers reject such
/// patterns before getting here.
pub fn ngrams_of(pattern: &str, n: usize) -> Vec<String> {
    windowed([pattern], "", n).collect()
}

/// What tokenizing one file produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tokens {
    /// Distinct n-grams of the file
    Accepted(HashSet<NGramKey>),

    /// The inspector vetoed the file before reading it
    FileRejected,

    /// The inspector aborted the file at this n-gram
    NGramRejected { ngram: String, line: usize },

    /// The build was cancelled while the file was being tokenized
    Cancelled,
}

/// Turns a file's lines into its distinct n-gram set.
pub struct Tokenizer<'a> {
    n: usize,
    separator: &'a str,
    inspector: &'a dyn ContentInspector,
    interner: &'a NGramInterner,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(
        n: usize,
        separator: &'a str,
        inspector: &'a dyn ContentInspector,
        interner: &'a NGramInterner,
    ) -> Self {
        Tokenizer {
            n,
            separator,
            inspector,
            interner,
            cancel: None,
        }
    }

    /// Stop between windows once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Window the virtual join of `lines` and collect the surviving n-grams.
    ///
    /// The inspector sees the file once before any line is pulled, then
    /// every window. The line counter moves after a window whose trailing
    /// piece is exactly the separator.
    pub fn reverse_ngrams<I, S>(&self, lines: I, path: &Path) -> Tokens
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.admits(path) {
            return Tokens::FileRejected;
        }
        self.admitted_ngrams(lines, path)
    }

    /// Ask the inspector whether `path` may be read at all.
    pub fn admits(&self, path: &Path) -> bool {
        self.inspector.proceed_on_file(path)
    }

    /// [`reverse_ngrams`](Self::reverse_ngrams) for a file that already
    /// passed [`admits`](Self::admits).
    pub fn admitted_ngrams<I, S>(&self, lines: I, path: &Path) -> Tokens
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys = HashSet::new();
        let mut line = 0;
        let mut windows = windowed(lines, self.separator, self.n);

        while let Some(ngram) = windows.next() {
            if self.cancel.is_some_and(CancellationToken::is_cancelled) {
                return Tokens::Cancelled;
            }
            if !self.inspector.proceed_on_ngram(&ngram, line, path) {
                return Tokens::NGramRejected { ngram, line };
            }
            keys.insert(self.interner.get_or_intern(ngram));
            if windows.trailing_separator() {
                line += 1;
            }
        }

        Tokens::Accepted(keys)
    }
}
