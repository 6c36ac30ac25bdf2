//! Hand-written tokenizers for tokens a regular pattern cannot describe.

use crate::base::TextSize;

/// A tokenizer for a grammar's external symbols.
///
/// The scanner is consulted before the regular rules whenever at least one
/// external symbol is valid in the current parse state. `valid[i]` tells
/// whether the grammar's `i`-th external symbol is acceptable right now;
/// the scanner returns the index of the symbol it recognized, leaving the
/// cursor at (or marking) the token end.
///
/// Scanners are shared between parses and must not keep per-parse state.
pub trait ExternalScanner: Send + Sync {
    fn scan(&self, cursor: &mut ScanCursor<'_>, valid: &[bool]) -> Option<usize>;
}

/// Read-only cursor handed to an [`ExternalScanner`].
///
/// Every character the scanner looks at is recorded, so the incremental
/// reparser knows which bytes influenced the token.
#[derive(Debug)]
pub struct ScanCursor<'a> {
    text: &'a str,
    start: usize,
    position: usize,
    marked_end: Option<usize>,
    examined_end: usize,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(text: &'a str, start: usize) -> Self {
        Self {
            text,
            start,
            position: start,
            marked_end: None,
            examined_end: start,
        }
    }

    /// The character under the cursor, `None` at end of input.
    pub fn lookahead(&mut self) -> Option<char> {
        match self.text[self.position..].chars().next() {
            Some(c) => {
                self.examined_end = self.examined_end.max(self.position + c.len_utf8());
                Some(c)
            }
            None => {
                self.examined_end = self.examined_end.max(self.text.len() + 1);
                None
            }
        }
    }

    /// Consume the character under the cursor.
    pub fn advance(&mut self) -> Option<char> {
        let c = self.lookahead()?;
        self.position += c.len_utf8();
        Some(c)
    }

    /// Fix the token end at the current position; later advances only peek.
    pub fn mark_end(&mut self) {
        self.marked_end = Some(self.position);
    }

    pub fn is_at_end(&mut self) -> bool {
        self.lookahead().is_none()
    }

    pub fn position(&self) -> TextSize {
        TextSize::new(self.position as u32)
    }

    pub fn start(&self) -> TextSize {
        TextSize::new(self.start as u32)
    }

    /// Text consumed so far
    pub fn consumed(&self) -> &'a str {
        &self.text[self.start..self.position]
    }

    pub(crate) fn token_end(&self) -> usize {
        self.marked_end.unwrap_or(self.position)
    }

    pub(crate) fn examined_end(&self) -> usize {
        self.examined_end
    }
}
