//! Validated, ready-to-run grammar.

use super::{GrammarTable, LanguageError, ParseAction, RuleInfo, SymbolInfo, TABLE_FORMAT_VERSION};
use crate::base::{FieldId, LexModeId, RuleId, StateId, Symbol, TokenSet};
use crate::lexer::ExternalScanner;
use crate::lexer::matcher::TokenMatcher;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

/// A grammar table together with its compiled token automaton.
///
/// Built once with [`Language::new`] and shared read-only, typically as
/// `Arc<Language>`, across any number of concurrent parses.
pub struct Language {
    table: GrammarTable,
    matcher: TokenMatcher,
    /// Valid terminals per lex mode, extras included
    mode_sets: Vec<TokenSet>,
    all_terminals: TokenSet,
    extras: TokenSet,
    anchors: TokenSet,
    symbol_ids: FxHashMap<(SmolStr, bool), Symbol>,
    field_ids: FxHashMap<SmolStr, FieldId>,
    external_scanner: Option<Arc<dyn ExternalScanner>>,
}

impl Language {
    /// Validate a table and compile its lexical rules.
    ///
    /// The format version is checked before anything else.
    pub fn new(table: GrammarTable) -> Result<Self, LanguageError> {
        if table.version != TABLE_FORMAT_VERSION {
            return Err(LanguageError::VersionMismatch {
                found: table.version,
                supported: TABLE_FORMAT_VERSION,
            });
        }
        table.validate()?;

        let matcher = TokenMatcher::new(&table.lex_rules, |symbol| {
            table.symbols[symbol.index()].name.clone()
        })?;

        let terminals = table.terminal_count as usize;
        let extras: TokenSet = table.extras.iter().copied().collect();
        let mode_sets = table
            .lex_modes
            .iter()
            .map(|mode| {
                let mut set = TokenSet::with_capacity(terminals);
                set.union_with(&extras);
                for &symbol in mode {
                    set.insert(symbol);
                }
                set
            })
            .collect();
        let all_terminals: TokenSet = (0..terminals as u16).map(Symbol).collect();
        let mut anchors: TokenSet = table.anchors.iter().copied().collect();
        anchors.insert(Symbol::END);

        let mut symbol_ids = FxHashMap::default();
        for (index, info) in table.symbols.iter().enumerate() {
            symbol_ids
                .entry((info.name.clone(), info.named))
                .or_insert(Symbol(index as u16));
        }
        let field_ids = table
            .fields
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), FieldId(index as u16)))
            .collect();

        tracing::debug!(
            name = %table.name,
            symbols = table.symbols.len(),
            states = table.state_count,
            rules = table.rules.len(),
            "loaded grammar table"
        );

        Ok(Self {
            table,
            matcher,
            mode_sets,
            all_terminals,
            extras,
            anchors,
            symbol_ids,
            field_ids,
            external_scanner: None,
        })
    }

    /// Attach the scanner for this grammar's external symbols.
    pub fn with_external_scanner(mut self, scanner: impl ExternalScanner + 'static) -> Self {
        self.external_scanner = Some(Arc::new(scanner));
        self
    }

    pub fn table(&self) -> &GrammarTable {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn symbol_count(&self) -> usize {
        self.table.symbols.len()
    }

    pub fn state_count(&self) -> usize {
        self.table.state_count as usize
    }

    pub fn start_symbol(&self) -> Symbol {
        self.table.start_symbol
    }

    pub fn symbol_info(&self, symbol: Symbol) -> Option<&SymbolInfo> {
        self.table.symbols.get(symbol.index())
    }

    /// Name of a symbol; `"ERROR"` for the error symbol.
    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        if symbol.is_error() {
            return "ERROR";
        }
        self.symbol_info(symbol).map_or("", |info| info.name.as_str())
    }

    /// Look a symbol up by name. Anonymous symbols are named by their text.
    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        if named && name == "ERROR" {
            return Some(Symbol::ERROR);
        }
        self.symbol_ids.get(&(SmolStr::new(name), named)).copied()
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        !symbol.is_error() && self.table.is_terminal(symbol)
    }

    pub fn is_named(&self, symbol: Symbol) -> bool {
        symbol.is_error() || self.symbol_info(symbol).is_some_and(|info| info.named)
    }

    pub fn is_hidden(&self, symbol: Symbol) -> bool {
        !symbol.is_error() && self.symbol_info(symbol).is_some_and(|info| info.hidden)
    }

    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.extras.contains(symbol)
    }

    pub fn is_anchor(&self, symbol: Symbol) -> bool {
        self.anchors.contains(symbol)
    }

    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        self.table.fields.get(field.index()).map(SmolStr::as_str)
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.field_ids.get(name).copied()
    }

    pub fn rule(&self, rule: RuleId) -> &RuleInfo {
        &self.table.rules[rule.index()]
    }

    pub fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
        if symbol.is_error() {
            return &[];
        }
        self.table.actions(state, symbol)
    }

    pub fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        self.table.goto(state, symbol)
    }

    pub fn lex_mode(&self, state: StateId) -> LexModeId {
        self.table.state_lex_modes[state.index()]
    }

    /// Terminals the lexer may produce in a mode, extras included.
    pub fn valid_terminals(&self, mode: LexModeId) -> &TokenSet {
        self.mode_sets.get(mode.index()).unwrap_or(&self.all_terminals)
    }

    /// Terminals the parser could shift in a state, extras excluded.
    pub fn expected_terminals(&self, state: StateId) -> impl Iterator<Item = Symbol> + '_ {
        self.table.lex_modes[self.lex_mode(state).index()].iter().copied()
    }

    pub fn external_symbols(&self) -> &[Symbol] {
        &self.table.external_symbols
    }

    pub(crate) fn external_scanner(&self) -> Option<&dyn ExternalScanner> {
        self.external_scanner.as_deref()
    }

    pub(crate) fn matcher(&self) -> &TokenMatcher {
        &self.matcher
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.table.name)
            .field("symbols", &self.table.symbols.len())
            .field("states", &self.table.state_count)
            .field("external_scanner", &self.external_scanner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{Grammar, lit, seq};

    fn ab_table() -> GrammarTable {
        Grammar::new("ab")
            .rule("S", seq([lit("a"), lit("b")]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_version_mismatch_is_rejected_first() {
        let mut table = ab_table();
        table.version = TABLE_FORMAT_VERSION + 1;
        // also break the dimensions: the version must be reported first
        table.gotos.clear();
        let err = Language::new(table).unwrap_err();
        assert!(matches!(
            err,
            LanguageError::VersionMismatch { found, supported }
                if found == TABLE_FORMAT_VERSION + 1 && supported == TABLE_FORMAT_VERSION
        ));
    }

    #[test]
    fn test_malformed_dimensions() {
        let mut table = ab_table();
        table.action_slots.pop();
        assert!(matches!(Language::new(table), Err(LanguageError::Malformed(_))));
    }

    #[test]
    fn test_shift_target_out_of_range() {
        let mut table = ab_table();
        let states = table.state_count;
        table.actions.push(ParseAction::Shift(StateId(states + 3)));
        assert!(matches!(Language::new(table), Err(LanguageError::Malformed(_))));
    }

    #[test]
    fn test_symbol_lookup() {
        let language = Language::new(ab_table()).unwrap();
        let a = language.symbol_for_name("a", false).unwrap();
        assert!(language.is_terminal(a));
        assert!(!language.is_named(a));
        let s = language.symbol_for_name("S", true).unwrap();
        assert_eq!(language.start_symbol(), s);
        assert_eq!(language.symbol_name(Symbol::ERROR), "ERROR");
        assert!(language.is_anchor(Symbol::END));
        assert_eq!(language.symbol_for_name("ERROR", true), Some(Symbol::ERROR));
    }

    #[test]
    fn test_language_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Language>();
    }
}
