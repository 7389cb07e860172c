//! Offset to line/column mapping for diagnostics.

/// 1-based line and column of a construct in the original source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Maps byte offsets of the original source (prolog included) to positions.
///
/// Line breaks are `\r\n`, `\r` or `\n`; a `\r\n` pair counts as one break.
/// Columns count characters, not bytes.
#[derive(Clone, Debug)]
pub struct PositionTracker {
    source: String,
    line_starts: Vec<usize>,
}

impl PositionTracker {
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while let Some(rel) = memchr::memchr2(b'\n', b'\r', &bytes[i..]) {
            let at = i + rel;
            let next = if bytes[at] == b'\r' && bytes.get(at + 1) == Some(&b'\n') {
                at + 2
            } else {
                at + 1
            };
            line_starts.push(next);
            i = next;
            if i >= bytes.len() {
                break;
            }
        }
        Self {
            source: source.to_string(),
            line_starts,
        }
    }

    /// Position of `offset` (clamped to the source length).
    pub fn position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let line_start = self.line_starts[line_index];
        let column = self.source[line_start..offset].chars().count() + 1;
        Position::new(line_index + 1, column)
    }

    /// Position of the construct in `source[offset..]`, skipping the leading
    /// whitespace a match may have absorbed.
    pub fn construct_position(&self, offset: usize) -> Position {
        let rest = self.source.get(offset..).unwrap_or("");
        let trimmed = rest.len() - rest.trim_start().len();
        self.position(offset + trimmed)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_starts_at_column_one() {
        let tracker = PositionTracker::new("<ten:if>");
        assert_eq!(tracker.position(0), Position::new(1, 1));
        assert_eq!(tracker.position(4), Position::new(1, 5));
    }

    #[test]
    fn all_line_break_conventions_count_once() {
        let tracker = PositionTracker::new("a\r\nb\rc\nd");
        assert_eq!(tracker.line_count(), 4);
        assert_eq!(tracker.position(3), Position::new(2, 1));
        assert_eq!(tracker.position(5), Position::new(3, 1));
        assert_eq!(tracker.position(7), Position::new(4, 1));
    }

    #[test]
    fn columns_count_characters() {
        let tracker = PositionTracker::new("héllo <x>");
        // 'é' is two bytes
        assert_eq!(tracker.position(7), Position::new(1, 7));
    }

    #[test]
    fn construct_position_skips_absorbed_indentation() {
        let source = "text\n    <ten:echo/>";
        let tracker = PositionTracker::new(source);
        assert_eq!(tracker.construct_position(4), Position::new(2, 5));
    }

    #[test]
    fn offsets_past_the_end_are_clamped() {
        let tracker = PositionTracker::new("ab\n");
        assert_eq!(tracker.position(100), Position::new(2, 1));
    }
}
