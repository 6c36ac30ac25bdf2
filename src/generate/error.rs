//! Errors raised while compiling a grammar into a table.

use crate::table::LanguageError;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("Grammar `{0}` has no rules")]
    Empty(SmolStr),

    #[error("Undefined symbol `{name}` referenced from `{rule}`")]
    UndefinedSymbol { name: SmolStr, rule: SmolStr },

    #[error("Start rule `{0}` must not be a token")]
    TokenStartRule(SmolStr),

    #[error("Extra `{0}` must be a token")]
    InvalidExtra(SmolStr),

    #[error("Anchor `{0}` must be a token")]
    InvalidAnchor(SmolStr),

    #[error("Conflict set names `{0}`, which is not a rule")]
    InvalidConflict(SmolStr),

    #[error("Invalid pattern in `{rule}`: {message}")]
    InvalidPattern { rule: SmolStr, message: String },

    #[error("Grammar has {0} symbols, more than a table can address")]
    TooManySymbols(usize),

    #[error(transparent)]
    Language(#[from] LanguageError),
}

impl GrammarError {
    pub fn undefined(name: impl Into<SmolStr>, rule: impl Into<SmolStr>) -> Self {
        Self::UndefinedSymbol {
            name: name.into(),
            rule: rule.into(),
        }
    }

    pub fn invalid_pattern(rule: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            rule: rule.into(),
            message: message.into(),
        }
    }
}
