//! Sliding character windows over a virtually joined sequence of lines.
//!
//! `Windows` yields exactly what `lines.join(separator)` windowed by `size`
//! characters would yield, without ever building the joined string. At most
//! `size` characters are buffered on top of the line currently being
//! consumed, so a file can be tokenized straight from a line stream.
//!
//! Windows are full-size only; a total length below `size` (including empty
//! input) yields nothing.

use std::collections::VecDeque;

/// A single character of the virtual join.
#[derive(Debug, Clone, Copy)]
struct Slot {
    ch: char,
    /// Character length of the piece this character closes, if the piece's
    /// text equals the separator.
    closes_separator: Option<usize>,
}

enum Piece {
    Line { text: String, is_separator: bool },
    Separator,
}

/// Character stream over `line0, sep, line1, sep, ..., lineN`.
struct JoinedChars<I> {
    lines: I,
    separator: String,
    started: bool,
    current: Option<Piece>,
    /// Line waiting behind the separator currently being drained.
    next_line: Option<String>,
    /// Byte position inside the current piece.
    pos: usize,
    /// Characters already taken from the current piece.
    taken: usize,
}

impl<I, S> JoinedChars<I>
where
    I: Iterator<Item = S>,
    S: Into<String>,
{
    fn new(lines: I, separator: &str) -> Self {
        JoinedChars {
            lines,
            separator: separator.to_string(),
            started: false,
            current: None,
            next_line: None,
            pos: 0,
            taken: 0,
        }
    }

    fn line_piece(&self, text: String) -> Piece {
        let is_separator = text == self.separator;
        Piece::Line { text, is_separator }
    }

    fn advance(&mut self) {
        self.current = match self.current.take() {
            Some(Piece::Line { .. }) => match self.lines.next() {
                Some(line) => {
                    self.next_line = Some(line.into());
                    Some(Piece::Separator)
                }
                None => None,
            },
            Some(Piece::Separator) => self.next_line.take().map(|line| self.line_piece(line)),
            None => None,
        };
        self.pos = 0;
        self.taken = 0;
    }
}

impl<I, S> Iterator for JoinedChars<I>
where
    I: Iterator<Item = S>,
    S: Into<String>,
{
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if !self.started {
            self.started = true;
            self.current = self.lines.next().map(|line| self.line_piece(line.into()));
        }

        loop {
            let piece = self.current.as_ref()?;
            let (text, is_separator) = match piece {
                Piece::Line { text, is_separator } => (text.as_str(), *is_separator),
                Piece::Separator => (self.separator.as_str(), true),
            };

            if let Some(ch) = text[self.pos..].chars().next() {
                self.pos += ch.len_utf8();
                self.taken += 1;
                let closes_separator =
                    (is_separator && self.pos == text.len()).then_some(self.taken);
                return Some(Slot {
                    ch,
                    closes_separator,
                });
            }

            self.advance();
        }
    }
}

/// Lazy sliding windows over lines joined by a separator.
///
/// Driven through `&mut self`; one consumer at a time.
pub struct Windows<I> {
    chars: JoinedChars<I>,
    size: usize,
    step: usize,
    buffer: VecDeque<Slot>,
    /// Characters still to be discarded before the next window starts.
    skip: usize,
    trailing_separator: bool,
}

impl<I, S> Windows<I>
where
    I: Iterator<Item = S>,
    S: Into<String>,
{
    /// Create windows of `size` characters advancing by one character.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(lines: I, separator: &str, size: usize) -> Self {
        assert!(size > 0, "window size must be at least 1");
        Windows {
            chars: JoinedChars::new(lines, separator),
            size,
            step: 1,
            buffer: VecDeque::with_capacity(size),
            skip: 0,
            trailing_separator: false,
        }
    }

    /// Advance by `step` characters between windows instead of one.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero.
    pub fn with_step(mut self, step: usize) -> Self {
        assert!(step > 0, "window step must be at least 1");
        self.step = step;
        self
    }

    /// Whether the most recently emitted window ends with a whole piece
    /// whose text is exactly the separator.
    pub fn trailing_separator(&self) -> bool {
        self.trailing_separator
    }
}

impl<I, S> Iterator for Windows<I>
where
    I: Iterator<Item = S>,
    S: Into<String>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.skip > 0 {
            self.chars.next()?;
            self.skip -= 1;
        }

        while self.buffer.len() < self.size {
            let slot = self.chars.next()?;
            self.buffer.push_back(slot);
        }

        let window: String = self.buffer.iter().map(|slot| slot.ch).collect();
        self.trailing_separator = self
            .buffer
            .back()
            .and_then(|slot| slot.closes_separator)
            .is_some_and(|len| len <= self.size);

        let consumed = self.step.min(self.buffer.len());
        self.buffer.drain(..consumed);
        self.skip = self.step - consumed;

        Some(window)
    }
}

/// Windows of `size` characters over `lines` joined by `separator`.
pub fn windowed<L, S>(lines: L, separator: &str, size: usize) -> Windows<L::IntoIter>
where
    L: IntoIterator<Item = S>,
    S: Into<String>,
{
    Windows::new(lines.into_iter(), separator, size)
}
