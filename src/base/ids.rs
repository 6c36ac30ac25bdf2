//! Index newtypes into a grammar table.
//!
//! All ids are plain indices; they only carry meaning relative to the
//! [`GrammarTable`](crate::table::GrammarTable) that issued them.

use std::fmt;

/// A grammar symbol (terminal or non-terminal).
///
/// Terminals occupy `0..terminal_count`, non-terminals follow. Two ids are
/// reserved: [`Symbol::END`] for end of input and [`Symbol::ERROR`] for
/// error nodes and unrecognized characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct Symbol(pub u16);

impl Symbol {
    /// End of input
    pub const END: Symbol = Symbol(0);
    /// Error nodes and unrecognized characters
    pub const ERROR: Symbol = Symbol(u16::MAX);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_end(self) -> bool {
        self == Self::END
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            write!(f, "ERROR")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// A parse state (row of the action table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct StateId(pub u32);

impl StateId {
    /// The state every parse starts in
    pub const START: StateId = StateId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A production rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct RuleId(pub u32);

impl RuleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A field name attached to a rule child (`name`, `body`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct FieldId(pub u16);

impl FieldId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A lexer mode: the set of terminals valid in some group of parse states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct LexModeId(pub u16);

impl LexModeId {
    /// Every lexical rule at once; used by the debugging token iterator
    pub const ANY: LexModeId = LexModeId(u16::MAX);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
