//! Grammar tables.
//!
//! A [`GrammarTable`] is the immutable, grammar-derived description the engine
//! runs on: symbols, rules, a flat action table indexed by
//! `(state, terminal)`, a flat goto table indexed by `(state, non-terminal)`,
//! and the lexical rules. Tables are produced ahead of time (see
//! [`generate`](crate::generate)) and validated into a [`Language`] before use.
//!
//! ## Layout
//!
//! ```text
//! symbols:  [ end | terminals ... | non-terminals ... ]      ERROR = 0xFFFF (implicit)
//! actions:  state * terminal_count      -> ActionSlot -> &[ParseAction]
//! gotos:    state * nonterminal_count   -> Option<StateId>
//! ```

mod error;
#[cfg(feature = "serde")]
mod json;
mod language;

pub use error::LanguageError;
pub use language::Language;

use crate::base::{FieldId, LexModeId, RuleId, StateId, Symbol};
use smol_str::SmolStr;

/// Table format version understood by this engine.
///
/// Bump whenever the layout of [`GrammarTable`] changes.
pub const TABLE_FORMAT_VERSION: u32 = 1;

/// A single parse action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParseAction {
    /// Push the lookahead and move to a state
    Shift(StateId),
    /// Pop the rule's children and push the rule's left-hand side
    Reduce(RuleId),
    /// The start symbol is complete
    Accept,
}

/// Operator associativity used to break equal-precedence conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Assoc {
    #[default]
    None,
    Left,
    Right,
}

/// Metadata for one grammar symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolInfo {
    pub name: SmolStr,
    /// Named symbols come from named rules; anonymous ones are literal tokens
    pub named: bool,
    /// Hidden symbols (`_name`, generated helpers) are spliced out of the public tree view
    pub hidden: bool,
    pub terminal: bool,
}

/// A production rule.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleInfo {
    pub lhs: Symbol,
    pub child_count: u16,
    pub precedence: i32,
    pub assoc: Assoc,
    /// Field name per structural (non-extra) child, `child_count` entries
    pub fields: Vec<Option<FieldId>>,
}

/// How a terminal is recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenPattern {
    /// Exact text
    Literal(SmolStr),
    /// Regular expression (regex-syntax flavour, no look-around)
    Regex(SmolStr),
}

/// A lexical rule. Rules are listed in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LexRule {
    pub symbol: Symbol,
    pub pattern: TokenPattern,
}

/// Range into [`GrammarTable::actions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionSlot {
    pub start: u32,
    pub len: u16,
}

/// The compiled, immutable grammar description.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GrammarTable {
    pub version: u32,
    pub name: SmolStr,
    pub symbols: Vec<SymbolInfo>,
    pub terminal_count: u16,
    pub fields: Vec<SmolStr>,
    pub rules: Vec<RuleInfo>,
    pub state_count: u32,
    pub action_slots: Vec<ActionSlot>,
    pub actions: Vec<ParseAction>,
    pub gotos: Vec<Option<StateId>>,
    pub lex_rules: Vec<LexRule>,
    /// Valid terminals per lex mode, sorted
    pub lex_modes: Vec<Vec<Symbol>>,
    pub state_lex_modes: Vec<LexModeId>,
    pub extras: Vec<Symbol>,
    pub anchors: Vec<Symbol>,
    pub external_symbols: Vec<Symbol>,
    pub start_symbol: Symbol,
}

impl GrammarTable {
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn nonterminal_count(&self) -> usize {
        self.symbols.len() - self.terminal_count as usize
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.0 < self.terminal_count
    }

    /// Actions for `(state, terminal)`; empty means syntax error.
    pub fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
        if !self.is_terminal(symbol) || state.0 >= self.state_count {
            return &[];
        }
        let slot = self.action_slots[state.index() * self.terminal_count as usize + symbol.index()];
        let start = slot.start as usize;
        &self.actions[start..start + slot.len as usize]
    }

    /// Goto target for `(state, non-terminal)`.
    pub fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        if symbol.is_error() || self.is_terminal(symbol) || symbol.index() >= self.symbols.len() {
            return None;
        }
        let column = symbol.index() - self.terminal_count as usize;
        self.gotos
            .get(state.index() * self.nonterminal_count() + column)
            .copied()
            .flatten()
    }

    /// Check dimensions and index ranges. The version is checked separately.
    pub(crate) fn validate(&self) -> Result<(), LanguageError> {
        let symbol_count = self.symbols.len();
        if symbol_count >= Symbol::ERROR.index() {
            return Err(LanguageError::malformed(format!("too many symbols ({symbol_count})")));
        }
        let terminals = self.terminal_count as usize;
        if terminals == 0 || terminals > symbol_count {
            return Err(LanguageError::malformed("terminal count out of range"));
        }
        if self.symbols.iter().enumerate().any(|(i, s)| s.terminal != (i < terminals)) {
            return Err(LanguageError::malformed("terminal flags disagree with terminal count"));
        }
        let states = self.state_count as usize;
        if states == 0 {
            return Err(LanguageError::malformed("table has no states"));
        }
        if self.action_slots.len() != states * terminals {
            return Err(LanguageError::malformed(format!(
                "expected {} action slots, found {}",
                states * terminals,
                self.action_slots.len()
            )));
        }
        if self.gotos.len() != states * (symbol_count - terminals) {
            return Err(LanguageError::malformed(format!(
                "expected {} goto entries, found {}",
                states * (symbol_count - terminals),
                self.gotos.len()
            )));
        }
        for slot in &self.action_slots {
            if slot.start as usize + slot.len as usize > self.actions.len() {
                return Err(LanguageError::malformed("action slot out of range"));
            }
        }
        for action in &self.actions {
            match *action {
                ParseAction::Shift(state) if state.index() >= states => {
                    return Err(LanguageError::malformed(format!("shift to unknown state {}", state.0)));
                }
                ParseAction::Reduce(rule) if rule.index() >= self.rules.len() => {
                    return Err(LanguageError::malformed(format!("reduce by unknown rule {}", rule.0)));
                }
                _ => {}
            }
        }
        for target in self.gotos.iter().flatten() {
            if target.index() >= states {
                return Err(LanguageError::malformed(format!("goto unknown state {}", target.0)));
            }
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if self.is_terminal(rule.lhs) || rule.lhs.index() >= symbol_count {
                return Err(LanguageError::malformed(format!("rule {index} has a terminal left-hand side")));
            }
            if rule.fields.len() != rule.child_count as usize {
                return Err(LanguageError::malformed(format!("rule {index} field map has wrong length")));
            }
            if rule.fields.iter().flatten().any(|f| f.index() >= self.fields.len()) {
                return Err(LanguageError::malformed(format!("rule {index} names an unknown field")));
            }
        }
        if self.state_lex_modes.len() != states {
            return Err(LanguageError::malformed("one lex mode per state expected"));
        }
        if self.state_lex_modes.iter().any(|m| m.index() >= self.lex_modes.len()) {
            return Err(LanguageError::malformed("state refers to unknown lex mode"));
        }
        let terminal_lists = self
            .lex_modes
            .iter()
            .flatten()
            .chain(self.extras.iter())
            .chain(self.anchors.iter())
            .chain(self.external_symbols.iter())
            .chain(self.lex_rules.iter().map(|r| &r.symbol));
        for &symbol in terminal_lists {
            if !self.is_terminal(symbol) {
                return Err(LanguageError::malformed(format!("{symbol} is not a terminal")));
            }
        }
        if self.is_terminal(self.start_symbol) || self.start_symbol.index() >= symbol_count {
            return Err(LanguageError::malformed("start symbol must be a non-terminal"));
        }
        Ok(())
    }
}
