//! Errors raised while loading a grammar table.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors that can occur when turning a [`GrammarTable`](super::GrammarTable)
/// into a usable [`Language`](super::Language).
///
/// All of these are fatal and are reported before any text is parsed.
#[derive(Debug, Error)]
pub enum LanguageError {
    /// The table was produced for a different engine format version.
    #[error("Incompatible grammar table version {found} (engine supports {supported})")]
    VersionMismatch { found: u32, supported: u32 },

    /// Table dimensions or indices are inconsistent.
    #[error("Malformed grammar table: {0}")]
    Malformed(String),

    /// A lexical rule could not be compiled into the token automaton.
    #[error("Invalid token pattern for `{symbol}`: {message}")]
    InvalidPattern { symbol: SmolStr, message: String },

    /// The serialized table could not be decoded.
    #[cfg(feature = "serde")]
    #[error("Table decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LanguageError {
    /// Create a malformed-table error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Create an invalid-pattern error.
    pub fn invalid_pattern(symbol: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            symbol: symbol.into(),
            message: message.into(),
        }
    }
}
