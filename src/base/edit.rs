//! Text edits.

use text_size::{TextRange, TextSize};

/// A text splice: bytes `start..old_end` of the old text were replaced by
/// bytes `start..new_end` of the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start: TextSize,
    pub old_end: TextSize,
    pub new_end: TextSize,
}

impl InputEdit {
    pub fn new(start: TextSize, old_end: TextSize, new_end: TextSize) -> Self {
        debug_assert!(start <= old_end && start <= new_end);
        Self {
            start,
            old_end,
            new_end,
        }
    }

    /// `len` bytes inserted at `at`
    pub fn insert(at: TextSize, len: TextSize) -> Self {
        Self::new(at, at, at + len)
    }

    /// The bytes in `range` removed
    pub fn delete(range: TextRange) -> Self {
        Self::new(range.start(), range.end(), range.start())
    }

    /// The bytes in `range` replaced by `new_len` bytes
    pub fn replace(range: TextRange, new_len: TextSize) -> Self {
        Self::new(range.start(), range.end(), range.start() + new_len)
    }

    /// Apply a replacement to `text`, returning the new text and the matching edit.
    ///
    /// Returns `None` when `range` is out of bounds or not on char boundaries.
    pub fn splice(text: &str, range: TextRange, replacement: &str) -> Option<(String, InputEdit)> {
        let start = usize::from(range.start());
        let end = usize::from(range.end());
        if end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            return None;
        }
        let mut new_text = String::with_capacity(text.len() - (end - start) + replacement.len());
        new_text.push_str(&text[..start]);
        new_text.push_str(replacement);
        new_text.push_str(&text[end..]);
        Some((new_text, Self::replace(range, TextSize::of(replacement))))
    }

    pub fn old_range(&self) -> TextRange {
        TextRange::new(self.start, self.old_end)
    }

    pub fn new_range(&self) -> TextRange {
        TextRange::new(self.start, self.new_end)
    }

    /// Signed change in text length
    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_end)) - i64::from(u32::from(self.old_end))
    }

    /// Map an offset in the old text onto the new text.
    ///
    /// Offsets inside the replaced range, including its start, snap to
    /// `new_end`, so inserted text is attributed to whatever ends at the edit
    /// point. Offset zero never moves: with nothing before it, inserted text
    /// goes to whatever starts there. The mapping is monotone, so lengths
    /// derived from mapped boundaries always add up.
    pub fn map_offset(&self, offset: TextSize) -> TextSize {
        if offset < self.start || offset == TextSize::new(0) {
            offset
        } else if offset <= self.old_end {
            self.new_end
        } else {
            offset - self.old_end + self.new_end
        }
    }

    /// Whether the edit touches a region the lexer examined.
    ///
    /// `examined_end` is exclusive and already includes lookahead. A pure
    /// insertion exactly at `start` does not touch the region: the bytes the
    /// lexer saw are unchanged, only shifted.
    pub fn touches(&self, start: TextSize, examined_end: TextSize) -> bool {
        self.start < examined_end && self.old_end > start
    }
}
