//! Exact match positions of a literal inside a file's lines.
//!
//! The scanner finds every occurrence of a query in the virtual join of a
//! file's lines and reports where it starts as `(line, character offset)`.
//! Queries may contain the separator and span several lines.
//!
//! Lines are processed one piece at a time (line, separator, line, ...):
//!
//! 1. Partial matches carried over from earlier pieces are either
//!    completed, extended by the whole piece, or dropped.
//! 2. Occurrences entirely inside the piece are found with KMP.
//! 3. Every suffix of the piece that is a proper prefix of the query
//!    becomes a new partial match, found by walking the failure function
//!    from the final KMP state.
//!
//! Only the line being processed and a handful of partial matches are held
//! in memory.
//!
//! ## Coordinates
//!
//! A match starting inside line `L` is reported at its character offset in
//! `L`. A match starting at character `k` of the separator that follows `L`
//! is reported at `(L, len(L) + k)`. A line whose text equals the separator
//! does not advance the line counter, so the following line shares its
//! number.

use crate::types::LineMatches;

/// A match that started in an earlier piece and has consumed `matched`
/// characters of the query so far.
#[derive(Debug, Clone, Copy)]
struct Tentative {
    line: usize,
    offset: usize,
    matched: usize,
}

/// Reusable scanner for one query and separator.
#[derive(Debug, Clone)]
pub struct MultilineScanner {
    query: Vec<char>,
    failure: Vec<usize>,
    separator: Vec<char>,
    separator_text: String,
}

impl MultilineScanner {
    pub fn new(query: &str, separator: &str) -> Self {
        let query: Vec<char> = query.chars().collect();
        let failure = failure_function(&query);
        MultilineScanner {
            query,
            failure,
            separator: separator.chars().collect(),
            separator_text: separator.to_string(),
        }
    }

    /// All occurrences in `lines`, by line then ascending offset.
    ///
    /// Lines without a match are absent. An empty query matches nothing.
    pub fn scan<I, S>(&self, lines: I) -> LineMatches
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matches = LineMatches::new();
        if self.query.is_empty() {
            return matches;
        }

        let mut carried: Vec<Tentative> = Vec::new();
        let mut line_no = 0;
        // number and length of the previous line, for separator coordinates
        let mut previous: Option<(usize, usize)> = None;

        for line in lines {
            let line = line.as_ref();

            if let Some((prev_line, prev_len)) = previous {
                carried = self.piece(&self.separator, prev_line, prev_len, carried, &mut matches);
            }

            let text: Vec<char> = line.chars().collect();
            carried = self.piece(&text, line_no, 0, carried, &mut matches);

            previous = Some((line_no, text.len()));
            if line != self.separator_text {
                line_no += 1;
            }
        }

        for offsets in matches.values_mut() {
            offsets.sort_unstable();
            offsets.dedup();
        }
        matches
    }

    /// Process one piece whose first character sits at `(line, base)`.
    fn piece(
        &self,
        text: &[char],
        line: usize,
        base: usize,
        carried: Vec<Tentative>,
        matches: &mut LineMatches,
    ) -> Vec<Tentative> {
        let m = self.query.len();
        let mut next = Vec::new();

        for tentative in carried {
            let rest = &self.query[tentative.matched..];
            if text.len() >= rest.len() {
                if text[..rest.len()] == *rest {
                    record(matches, tentative.line, tentative.offset);
                }
            } else if rest[..text.len()] == *text {
                next.push(Tentative {
                    matched: tentative.matched + text.len(),
                    ..tentative
                });
            }
        }

        let mut state = 0;
        for (i, &ch) in text.iter().enumerate() {
            while state > 0 && self.query[state] != ch {
                state = self.failure[state - 1];
            }
            if self.query[state] == ch {
                state += 1;
            }
            if state == m {
                record(matches, line, base + i + 1 - m);
                state = self.failure[m - 1];
            }
        }

        while state > 0 {
            next.push(Tentative {
                line,
                offset: base + text.len() - state,
                matched: state,
            });
            state = self.failure[state - 1];
        }

        next
    }
}

fn record(matches: &mut LineMatches, line: usize, offset: usize) {
    matches.entry(line).or_default().push(offset);
}

/// `failure[i]` is the length of the longest proper prefix of
/// `query[..=i]` that is also its suffix.
fn failure_function(query: &[char]) -> Vec<usize> {
    let mut failure = vec![0; query.len()];
    let mut k = 0;
    for i in 1..query.len() {
        while k > 0 && query[i] != query[k] {
            k = failure[k - 1];
        }
        if query[i] == query[k] {
            k += 1;
        }
        failure[i] = k;
    }
    failure
}

/// One-shot form of [`MultilineScanner::scan`].
pub fn indices_of<I, S>(lines: I, query: &str, separator: &str) -> LineMatches
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    MultilineScanner::new(query, separator).scan(lines)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Join the lines, search naively, then map every start back to
    /// coordinates character by character.
    fn oracle(lines: &[String], query: &str, separator: &str) -> LineMatches {
        let mut coordinates = Vec::new();
        let mut line_no = 0;
        for (i, line) in lines.iter().enumerate() {
            let len = line.chars().count();
            coordinates.extend((0..len).map(|k| (line_no, k)));
            if i + 1 < lines.len() {
                coordinates.extend((0..separator.chars().count()).map(|k| (line_no, len + k)));
            }
            if line != separator {
                line_no += 1;
            }
        }

        let joined: Vec<char> = lines.join(separator).chars().collect();
        let query: Vec<char> = query.chars().collect();
        let mut matches = LineMatches::new();
        if query.is_empty() || joined.len() < query.len() {
            return matches;
        }
        for start in 0..=joined.len() - query.len() {
            if joined[start..start + query.len()] == query[..] {
                let (line, offset) = coordinates[start];
                matches.entry(line).or_default().push(offset);
            }
        }
        for offsets in matches.values_mut() {
            offsets.sort_unstable();
            offsets.dedup();
        }
        matches
    }

    proptest! {
        #[test]
        fn prop_scanner_matches_oracle(
            lines in prop::collection::vec("[ab;\\n]{0,6}", 0..6),
            query in "[ab;\\n]{1,5}",
            separator in prop_oneof![Just("\n"), Just(";"), Just(";;"), Just("")],
        ) {
            prop_assert_eq!(
                indices_of(&lines, &query, separator),
                oracle(&lines, &query, separator)
            );
        }
    }
}
