//! Lexer.
//!
//! Tokenizes source text against a [`Language`]'s lexical rules. The lexer is
//! context sensitive: the parser passes the lex mode of its current state and
//! only terminals valid in that mode (plus extras) are considered. When none
//! of them matches, every rule is tried so error recovery sees a real token,
//! and if even that fails a one-character `ERROR` token is produced. Lexing
//! therefore never fails.
//!
//! Each token records how far the lexer looked past its start
//! (`examined_end`); the incremental reparser uses that extent to decide
//! which tokens an edit invalidated.

mod external;
pub(crate) mod matcher;

pub use external::{ExternalScanner, ScanCursor};

use crate::base::{LexModeId, Symbol, TextRange, TextSize, TokenSet};
use crate::table::Language;

/// A lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub symbol: Symbol,
    pub range: TextRange,
    /// Exclusive end of the bytes that influenced this token
    pub examined_end: TextSize,
    /// Mode the token was lexed in
    pub lex_mode: LexModeId,
}

impl Token {
    pub fn len(&self) -> TextSize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn is_end(&self) -> bool {
        self.symbol.is_end()
    }

    pub fn is_error(&self) -> bool {
        self.symbol.is_error()
    }

    /// Bytes examined past the token end
    pub fn lookahead_bytes(&self) -> TextSize {
        self.examined_end - self.range.end()
    }
}

/// A lexer over one source text.
#[derive(Debug, Clone, Copy)]
pub struct Lexer<'a> {
    language: &'a Language,
    text: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(language: &'a Language, text: &'a str) -> Self {
        Self { language, text }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Lex one token at `position` using the terminals valid in `mode`.
    ///
    /// At end of input this returns the zero-width `end` token.
    pub fn next_token(&self, position: TextSize, mode: LexModeId) -> Token {
        let valid = self.language.valid_terminals(mode);
        self.lex(position, mode, valid)
    }

    /// All tokens of the text, lexed with every rule enabled.
    ///
    /// Meant for debugging grammars; parsing always lexes in context.
    pub fn tokens(&self) -> Tokens<'a> {
        Tokens {
            lexer: *self,
            position: TextSize::new(0),
            done: false,
        }
    }

    fn lex(&self, position: TextSize, mode: LexModeId, valid: &TokenSet) -> Token {
        let start = usize::from(position);
        let mut examined = start;

        if let Some(token) = self.scan_external(start, mode, valid, &mut examined) {
            return token;
        }

        if start >= self.text.len() {
            return Token {
                symbol: Symbol::END,
                range: TextRange::empty(position),
                examined_end: to_size(examined.max(self.text.len() + 1)),
                lex_mode: mode,
            };
        }

        let scan = self
            .language
            .matcher()
            .scan(self.text, start, |symbol| valid.contains(symbol));
        examined = examined.max(scan.examined_end);

        if let Some((symbol, end)) = scan.valid.or(scan.any) {
            if scan.valid.is_none() {
                tracing::trace!(
                    position = start,
                    symbol = self.language.symbol_name(symbol),
                    "lexed outside the valid set"
                );
            }
            return self.token(symbol, start, end, examined, mode);
        }

        // Nothing matches: one character, so the parser always advances.
        let width = self.text[start..].chars().next().map_or(1, char::len_utf8);
        tracing::trace!(position = start, "unrecognized character");
        self.token(Symbol::ERROR, start, start + width, examined.max(start + width), mode)
    }

    fn scan_external(
        &self,
        start: usize,
        mode: LexModeId,
        valid: &TokenSet,
        examined: &mut usize,
    ) -> Option<Token> {
        let scanner = self.language.external_scanner()?;
        let externals = self.language.external_symbols();
        let valid_externals: Vec<bool> = externals.iter().map(|&s| valid.contains(s)).collect();
        if !valid_externals.contains(&true) {
            return None;
        }

        let mut cursor = ScanCursor::new(self.text, start);
        let found = scanner.scan(&mut cursor, &valid_externals);
        *examined = (*examined).max(cursor.examined_end());

        let index = found.filter(|&i| valid_externals.get(i).copied().unwrap_or(false))?;
        let end = cursor.token_end();
        Some(self.token(externals[index], start, end, (*examined).max(end), mode))
    }

    fn token(&self, symbol: Symbol, start: usize, end: usize, examined: usize, mode: LexModeId) -> Token {
        Token {
            symbol,
            range: TextRange::new(to_size(start), to_size(end)),
            examined_end: to_size(examined),
            lex_mode: mode,
        }
    }
}

fn to_size(offset: usize) -> TextSize {
    TextSize::new(offset as u32)
}

/// Iterator returned by [`Lexer::tokens`]. Stops before the `end` token.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    lexer: Lexer<'a>,
    position: TextSize,
    done: bool,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.lexer.next_token(self.position, LexModeId::ANY);
        if token.is_end() || token.is_empty() {
            self.done = true;
            return None;
        }
        self.position = token.range.end();
        Some(token)
    }
}
