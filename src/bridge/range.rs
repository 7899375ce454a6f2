//! Source-range resolution for range-taking commands.
//!
//! Every range-based invocation carries a range computed by exactly one of
//! four strategies, in fixed precedence: explicit bounds, active selection,
//! paragraph around the cursor, whole buffer. Resolution is pure: it never
//! touches editor state, and positions leave here already translated to
//! LSP line/UTF-16-character pairs.

use lsp_types::{Position, Range};

/// Line-indexed view of a document used for range geometry.
///
/// Built once per invocation from the buffer text and discarded. Column
/// counts are UTF-16 code units, per LSP convention.
#[derive(Debug, Clone)]
pub struct DocumentText {
    lines: Vec<String>,
}

impl DocumentText {
    /// Creates a view over the given buffer text.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        // split always yields at least one element, so `lines` is non-empty
        Self { lines }
    }

    /// Number of lines in the document.
    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Index of the last line.
    #[must_use]
    pub fn last_line(&self) -> u32 {
        self.line_count().saturating_sub(1)
    }

    /// UTF-16 code-unit length of the given line (0 if out of bounds).
    #[must_use]
    pub fn line_utf16_len(&self, line: u32) -> u32 {
        self.lines
            .get(line as usize)
            .map_or(0, |l| l.encode_utf16().count() as u32)
    }

    /// End-of-buffer position.
    #[must_use]
    pub fn end_position(&self) -> Position {
        let last = self.last_line();
        Position::new(last, self.line_utf16_len(last))
    }

    /// Span of the whole buffer.
    #[must_use]
    pub fn full_range(&self) -> Range {
        Range::new(Position::new(0, 0), self.end_position())
    }

    /// Returns whether the given line is blank (empty or whitespace only).
    fn is_blank(&self, line: u32) -> bool {
        self.lines
            .get(line as usize)
            .is_none_or(|l| l.trim().is_empty())
    }

    /// Span of the paragraph containing the cursor.
    ///
    /// Scans backward to the nearest blank-line boundary before the cursor
    /// and forward to the nearest one after it. A cursor on a blank line
    /// yields an empty range at that line.
    #[must_use]
    pub fn paragraph_range(&self, cursor: Position) -> Range {
        let line = cursor.line.min(self.last_line());

        if self.is_blank(line) {
            return Range::new(Position::new(line, 0), Position::new(line, 0));
        }

        let mut first = line;
        while first > 0 && !self.is_blank(first - 1) {
            first -= 1;
        }

        let mut last = line;
        while last < self.last_line() && !self.is_blank(last + 1) {
            last += 1;
        }

        Range::new(
            Position::new(first, 0),
            Position::new(last, self.line_utf16_len(last)),
        )
    }
}

/// Resolves the range for a range-based command invocation.
///
/// Precedence, first match wins:
/// 1. both explicit bounds given
/// 2. active selection
/// 3. paragraph around the cursor, when the command is the paragraph variant
/// 4. whole buffer
#[must_use]
pub fn resolve(
    explicit_start: Option<Position>,
    explicit_end: Option<Position>,
    selection: Option<Range>,
    paragraph: bool,
    cursor: Position,
    document: &DocumentText,
) -> Range {
    if let (Some(start), Some(end)) = (explicit_start, explicit_end) {
        return Range::new(start, end);
    }

    if let Some(selection) = selection {
        return selection;
    }

    if paragraph {
        return document.paragraph_range(cursor);
    }

    document.full_range()
}
