//! Byte spans into template source.

/// Byte span into the original template source, prolog included.
///
/// Invariant: `start` and `end` sit on UTF-8 boundaries of the buffer that
/// produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start must be <= end");
        Self { start, end }
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    pub fn len(self) -> usize {
        self.end - self.start
    }

    pub fn slice(self, source: &str) -> &str {
        &source[self.start..self.end]
    }
}
