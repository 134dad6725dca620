//! Live document text with offset ↔ position mapping.
//!
//! Offsets and columns count UTF-16 code units, the unit the analyzer
//! reports in. Only `\n` ends a line; a `\r` before it is an ordinary
//! character on that line. An offset that lands inside a surrogate pair
//! snaps back to the start of that character.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use ropey::Rope;

use crate::protocol::{self, PathToUriError};
use crate::types::{Position, Range};

/// A document as seen at publish time.
#[derive(Debug, Clone)]
pub struct TextDocument {
    path: PathBuf,
    version: i32,
    rope: Rope,
}

impl TextDocument {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, version: i32, text: &str) -> Self {
        Self {
            path: path.into(),
            version,
            rope: Rope::from_str(text),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uri(&self) -> Result<url::Url, PathToUriError> {
        protocol::path_to_file_uri(&self.path)
    }

    /// Editor version, or 0 for a snapshot read from disk.
    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        self.rope.slice(..).into()
    }

    /// Document length in UTF-16 code units.
    #[must_use]
    pub fn len_utf16(&self) -> usize {
        self.rope.len_utf16_cu()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Map an offset to a position. Offsets past the end clamp to the end
    /// of the document.
    #[must_use]
    pub fn position_at(&self, offset: usize) -> Position {
        let char_idx = self.char_at(offset);
        let line = self.rope.char_to_line(char_idx);
        let line_start = self.rope.char_to_utf16_cu(self.rope.line_to_char(line));
        let character = self.rope.char_to_utf16_cu(char_idx) - line_start;
        Position::new(to_u32(line), to_u32(character))
    }

    /// Map a position back to an offset. Lines past the end clamp to the
    /// document length; columns past the end of a line clamp to the line end.
    #[must_use]
    pub fn offset_at(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return self.len_utf16();
        }
        let start = self.rope.line_to_char(line);
        let end = if line + 1 < self.rope.len_lines() {
            // Stop before this line's '\n'.
            self.rope.line_to_char(line + 1) - 1
        } else {
            self.rope.len_chars()
        };
        let start_cu = self.rope.char_to_utf16_cu(start);
        let end_cu = self.rope.char_to_utf16_cu(end);
        let target = start_cu + (position.character as usize).min(end_cu - start_cu);
        self.rope.char_to_utf16_cu(self.char_at(target))
    }

    /// Range covering `length` code units starting at `offset`.
    #[must_use]
    pub fn range_at(&self, offset: usize, length: usize) -> Range {
        Range::new(
            self.position_at(offset),
            self.position_at(offset.saturating_add(length)),
        )
    }

    /// Text covered by `range`.
    #[must_use]
    pub fn text_in(&self, range: Range) -> Cow<'_, str> {
        let start = self.char_at(self.offset_at(range.start));
        let end = self.char_at(self.offset_at(range.end)).max(start);
        self.rope.slice(start..end).into()
    }

    /// Char index holding the code unit at `offset`, clamped to the end.
    fn char_at(&self, offset: usize) -> usize {
        self.rope.utf16_cu_to_char(offset.min(self.len_utf16()))
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
