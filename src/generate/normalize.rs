//! Grammar flattening.
//!
//! Turns the rule expressions of a [`Grammar`] into numbered symbols, lexical
//! rules and flat productions:
//!
//! - named lexical rules become named terminals, inline literals and patterns
//!   become anonymous ones;
//! - `choice`/`optional` are expanded into alternative productions;
//! - `repeat`/`repeat1` introduce hidden left-recursive helper rules;
//! - `field` and `prec` annotate the steps and productions they wrap (the
//!   innermost `prec` wins).
//!
//! Terminals are numbered so that lexical rules made of a single literal
//! come before pattern rules, each group in declaration order. The lexer
//! breaks ties in that order.

use super::GrammarError;
use super::dsl::Rule;
use super::grammar::Grammar;
use crate::base::{FieldId, Symbol};
use crate::table::{Assoc, LexRule, SymbolInfo, TokenPattern};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::{SmolStr, format_smolstr};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Production {
    pub lhs: Symbol,
    pub rhs: Vec<Symbol>,
    pub fields: Vec<Option<FieldId>>,
    pub precedence: i32,
    pub assoc: Assoc,
}

/// A grammar reduced to numbered symbols and flat productions.
#[derive(Debug)]
pub(crate) struct Normalized {
    pub name: SmolStr,
    pub symbols: Vec<SymbolInfo>,
    pub terminal_count: u16,
    pub lex_rules: Vec<LexRule>,
    pub fields: Vec<SmolStr>,
    pub productions: Vec<Production>,
    pub start: Symbol,
    pub extras: Vec<Symbol>,
    pub anchors: Vec<Symbol>,
    pub externals: Vec<Symbol>,
    /// Declared conflict sets, as non-terminals
    pub conflicts: Vec<FxHashSet<Symbol>>,
    /// For each symbol, the named rule it was generated for
    pub origins: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TerminalKey {
    Literal(SmolStr),
    Pattern(SmolStr),
    Named(SmolStr),
}

struct TerminalDef {
    info: SymbolInfo,
    pattern: Option<TokenPattern>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Alt {
    steps: Vec<(Symbol, Option<FieldId>)>,
    prec: Option<(i32, Assoc)>,
}

impl Alt {
    fn single(symbol: Symbol) -> Self {
        Self {
            steps: vec![(symbol, None)],
            prec: None,
        }
    }
}

pub(crate) fn normalize(grammar: &Grammar) -> Result<Normalized, GrammarError> {
    let Some((start_name, _)) = grammar.rules.first() else {
        return Err(GrammarError::Empty(grammar.name.clone()));
    };
    if is_token_rule(&grammar.rules[start_name]) {
        return Err(GrammarError::TokenStartRule(start_name.clone()));
    }

    let mut normalizer = Normalizer::new(grammar);
    normalizer.collect_terminals()?;
    normalizer.declare_nonterminals()?;
    normalizer.expand_rules()?;
    normalizer.finish(start_name)
}

/// Named rules that lex as a single terminal
fn is_token_rule(rule: &Rule) -> bool {
    matches!(rule, Rule::Literal(_)) || (rule.is_lexical() && rule.has_pattern())
}

struct Normalizer<'g> {
    grammar: &'g Grammar,
    /// literal text -> name of the named rule that is exactly that literal
    named_literals: FxHashMap<SmolStr, SmolStr>,
    literal_group: IndexMap<TerminalKey, TerminalDef>,
    pattern_group: IndexMap<TerminalKey, TerminalDef>,
    terminal_ids: FxHashMap<TerminalKey, Symbol>,
    nonterminal_ids: FxHashMap<SmolStr, Symbol>,
    symbols: Vec<SymbolInfo>,
    origins: Vec<Symbol>,
    lex_rules: Vec<LexRule>,
    externals: Vec<Symbol>,
    terminal_count: u16,
    fields: IndexSet<SmolStr>,
    productions: IndexSet<Production>,
    repeat_count: usize,
}

impl<'g> Normalizer<'g> {
    fn new(grammar: &'g Grammar) -> Self {
        let named_literals = grammar
            .rules
            .iter()
            .filter_map(|(name, rule)| match rule {
                Rule::Literal(text) => Some((text.clone(), name.clone())),
                _ => None,
            })
            .collect();
        Self {
            grammar,
            named_literals,
            literal_group: IndexMap::new(),
            pattern_group: IndexMap::new(),
            terminal_ids: FxHashMap::default(),
            nonterminal_ids: FxHashMap::default(),
            symbols: Vec::new(),
            origins: Vec::new(),
            lex_rules: Vec::new(),
            externals: Vec::new(),
            terminal_count: 0,
            fields: IndexSet::new(),
            productions: IndexSet::new(),
            repeat_count: 0,
        }
    }

    // ========================================================================
    // Terminals
    // ========================================================================

    fn collect_terminals(&mut self) -> Result<(), GrammarError> {
        let grammar = self.grammar;
        for (name, rule) in &grammar.rules {
            if grammar.externals.contains(name) {
                continue;
            }
            if !is_token_rule(rule) {
                self.collect_inline(rule, name)?;
                continue;
            }
            let info = SymbolInfo {
                name: name.clone(),
                named: true,
                hidden: name.starts_with('_'),
                terminal: true,
            };
            let key = TerminalKey::Named(name.clone());
            if let Rule::Literal(text) = rule {
                let pattern = Some(TokenPattern::Literal(text.clone()));
                self.literal_group.insert(key, TerminalDef { info, pattern });
            } else {
                let regex = rule.to_regex();
                check_pattern(&regex, name)?;
                let pattern = Some(TokenPattern::Regex(SmolStr::new(regex)));
                self.pattern_group.insert(key, TerminalDef { info, pattern });
            }
        }
        for extra in &grammar.extras {
            self.collect_inline(extra, &grammar.name)?;
        }
        for anchor in &grammar.anchors {
            self.collect_inline(anchor, &grammar.name)?;
        }

        self.symbols.push(SymbolInfo {
            name: SmolStr::new_static("end"),
            named: false,
            hidden: true,
            terminal: true,
        });
        let groups = std::mem::take(&mut self.literal_group)
            .into_iter()
            .chain(std::mem::take(&mut self.pattern_group));
        for (key, def) in groups {
            let symbol = self.next_symbol()?;
            self.symbols.push(def.info);
            if let Some(pattern) = def.pattern {
                self.lex_rules.push(LexRule { symbol, pattern });
            }
            self.terminal_ids.insert(key, symbol);
        }
        for name in &grammar.externals {
            let symbol = self.next_symbol()?;
            self.symbols.push(SymbolInfo {
                name: name.clone(),
                named: true,
                hidden: name.starts_with('_'),
                terminal: true,
            });
            self.terminal_ids.insert(TerminalKey::Named(name.clone()), symbol);
            self.externals.push(symbol);
        }
        self.terminal_count = self.symbols.len() as u16;
        self.origins = (0..self.terminal_count).map(Symbol).collect();
        Ok(())
    }

    fn collect_inline(&mut self, rule: &Rule, owner: &SmolStr) -> Result<(), GrammarError> {
        match rule {
            Rule::Literal(text) => {
                if !self.named_literals.contains_key(text) {
                    self.literal_group
                        .entry(TerminalKey::Literal(text.clone()))
                        .or_insert_with(|| TerminalDef {
                            info: SymbolInfo {
                                name: text.clone(),
                                named: false,
                                hidden: false,
                                terminal: true,
                            },
                            pattern: Some(TokenPattern::Literal(text.clone())),
                        });
                }
            }
            Rule::Pattern(source) => {
                if !self.pattern_group.contains_key(&TerminalKey::Pattern(source.clone())) {
                    check_pattern(source, owner)?;
                    self.pattern_group.insert(
                        TerminalKey::Pattern(source.clone()),
                        TerminalDef {
                            info: SymbolInfo {
                                name: source.clone(),
                                named: false,
                                hidden: true,
                                terminal: true,
                            },
                            pattern: Some(TokenPattern::Regex(source.clone())),
                        },
                    );
                }
            }
            Rule::Seq(rules) | Rule::Choice(rules) => {
                for rule in rules {
                    self.collect_inline(rule, owner)?;
                }
            }
            Rule::Repeat(rule) | Rule::Repeat1(rule) | Rule::Field(_, rule) => {
                self.collect_inline(rule, owner)?;
            }
            Rule::Prec { rule, .. } => self.collect_inline(rule, owner)?,
            Rule::Blank | Rule::Symbol(_) => {}
        }
        Ok(())
    }

    fn next_symbol(&self) -> Result<Symbol, GrammarError> {
        let next = self.symbols.len();
        if next >= Symbol::ERROR.index() {
            return Err(GrammarError::TooManySymbols(next + 1));
        }
        Ok(Symbol(next as u16))
    }

    // ========================================================================
    // Productions
    // ========================================================================

    fn declare_nonterminals(&mut self) -> Result<(), GrammarError> {
        for (name, rule) in &self.grammar.rules {
            if is_token_rule(rule) || self.grammar.externals.contains(name) {
                continue;
            }
            let symbol = self.next_symbol()?;
            self.symbols.push(SymbolInfo {
                name: name.clone(),
                named: true,
                hidden: name.starts_with('_'),
                terminal: false,
            });
            self.origins.push(symbol);
            self.nonterminal_ids.insert(name.clone(), symbol);
        }
        Ok(())
    }

    fn expand_rules(&mut self) -> Result<(), GrammarError> {
        let grammar = self.grammar;
        for (name, rule) in &grammar.rules {
            let Some(&lhs) = self.nonterminal_ids.get(name) else {
                continue;
            };
            for alt in self.expand(rule, lhs, name)? {
                self.push_production(lhs, alt);
            }
        }
        Ok(())
    }

    fn push_production(&mut self, lhs: Symbol, alt: Alt) {
        let (rhs, fields) = alt.steps.into_iter().unzip();
        let (precedence, assoc) = alt.prec.unwrap_or((0, Assoc::None));
        self.productions.insert(Production {
            lhs,
            rhs,
            fields,
            precedence,
            assoc,
        });
    }

    fn expand(&mut self, rule: &Rule, owner: Symbol, owner_name: &SmolStr) -> Result<Vec<Alt>, GrammarError> {
        Ok(match rule {
            Rule::Blank => vec![Alt::default()],
            Rule::Literal(text) => vec![Alt::single(self.literal_symbol(text))],
            Rule::Pattern(source) => {
                vec![Alt::single(self.terminal_ids[&TerminalKey::Pattern(source.clone())])]
            }
            Rule::Symbol(name) => vec![Alt::single(self.resolve(name, owner_name)?)],
            Rule::Seq(rules) => {
                let mut alts = vec![Alt::default()];
                for rule in rules {
                    let parts = self.expand(rule, owner, owner_name)?;
                    let mut joined = Vec::with_capacity(alts.len() * parts.len());
                    for head in &alts {
                        for tail in &parts {
                            let mut steps = head.steps.clone();
                            steps.extend(tail.steps.iter().copied());
                            joined.push(Alt {
                                steps,
                                prec: head.prec.or(tail.prec),
                            });
                        }
                    }
                    alts = joined;
                }
                alts
            }
            Rule::Choice(rules) => {
                let mut alts = Vec::new();
                for rule in rules {
                    for alt in self.expand(rule, owner, owner_name)? {
                        if !alts.contains(&alt) {
                            alts.push(alt);
                        }
                    }
                }
                alts
            }
            Rule::Repeat(rule) => match self.repeat_helper(rule, owner, owner_name)? {
                Some(helper) => vec![Alt::default(), Alt::single(helper)],
                None => vec![Alt::default()],
            },
            Rule::Repeat1(rule) => match self.repeat_helper(rule, owner, owner_name)? {
                Some(helper) => vec![Alt::single(helper)],
                None => vec![Alt::default()],
            },
            Rule::Field(name, rule) => {
                let (index, _) = self.fields.insert_full(name.clone());
                let field = FieldId(index as u16);
                let mut alts = self.expand(rule, owner, owner_name)?;
                for alt in &mut alts {
                    for step in &mut alt.steps {
                        step.1.get_or_insert(field);
                    }
                }
                alts
            }
            Rule::Prec { value, assoc, rule } => {
                let mut alts = self.expand(rule, owner, owner_name)?;
                for alt in &mut alts {
                    alt.prec.get_or_insert((*value, *assoc));
                }
                alts
            }
        })
    }

    /// `helper -> helper item | item`, for every non-empty alternative of `item`.
    fn repeat_helper(
        &mut self,
        item: &Rule,
        owner: Symbol,
        owner_name: &SmolStr,
    ) -> Result<Option<Symbol>, GrammarError> {
        let alts: Vec<Alt> = self
            .expand(item, owner, owner_name)?
            .into_iter()
            .filter(|alt| !alt.steps.is_empty())
            .collect();
        if alts.is_empty() {
            return Ok(None);
        }
        self.repeat_count += 1;
        let helper = self.next_symbol()?;
        self.symbols.push(SymbolInfo {
            name: format_smolstr!("{owner_name}_repeat{}", self.repeat_count),
            named: false,
            hidden: true,
            terminal: false,
        });
        self.origins.push(self.origins[owner.index()]);

        for alt in alts {
            let mut steps = Vec::with_capacity(alt.steps.len() + 1);
            steps.push((helper, None));
            steps.extend(alt.steps.iter().copied());
            self.push_production(helper, Alt { steps, prec: alt.prec });
            self.push_production(helper, alt);
        }
        Ok(Some(helper))
    }

    fn literal_symbol(&self, text: &SmolStr) -> Symbol {
        match self.named_literals.get(text) {
            Some(name) => self.terminal_ids[&TerminalKey::Named(name.clone())],
            None => self.terminal_ids[&TerminalKey::Literal(text.clone())],
        }
    }

    fn resolve(&self, name: &SmolStr, from: &SmolStr) -> Result<Symbol, GrammarError> {
        self.nonterminal_ids
            .get(name)
            .or_else(|| self.terminal_ids.get(&TerminalKey::Named(name.clone())))
            .copied()
            .ok_or_else(|| GrammarError::undefined(name.clone(), from.clone()))
    }

    fn resolve_token(&self, rule: &Rule) -> Option<Symbol> {
        match rule {
            Rule::Literal(text) => Some(self.literal_symbol(text)),
            Rule::Pattern(source) => self.terminal_ids.get(&TerminalKey::Pattern(source.clone())).copied(),
            Rule::Symbol(name) => self.terminal_ids.get(&TerminalKey::Named(name.clone())).copied(),
            _ => None,
        }
    }

    // ========================================================================
    // Assembly
    // ========================================================================

    fn finish(self, start_name: &SmolStr) -> Result<Normalized, GrammarError> {
        let grammar = self.grammar;
        let describe = |rule: &Rule| match rule {
            Rule::Symbol(name) | Rule::Literal(name) | Rule::Pattern(name) => name.clone(),
            other => format_smolstr!("{other:?}"),
        };

        let mut extras = Vec::new();
        for rule in &grammar.extras {
            let symbol = self
                .resolve_token(rule)
                .ok_or_else(|| GrammarError::InvalidExtra(describe(rule)))?;
            extras.push(symbol);
        }
        let mut anchors = Vec::new();
        for rule in &grammar.anchors {
            let symbol = self
                .resolve_token(rule)
                .ok_or_else(|| GrammarError::InvalidAnchor(describe(rule)))?;
            anchors.push(symbol);
        }
        let mut conflicts = Vec::new();
        for set in &grammar.conflicts {
            let mut symbols = FxHashSet::default();
            for name in set {
                let symbol = self
                    .nonterminal_ids
                    .get(name)
                    .ok_or_else(|| GrammarError::InvalidConflict(name.clone()))?;
                symbols.insert(*symbol);
            }
            conflicts.push(symbols);
        }

        Ok(Normalized {
            name: grammar.name.clone(),
            start: self.nonterminal_ids[start_name],
            symbols: self.symbols,
            terminal_count: self.terminal_count,
            lex_rules: self.lex_rules,
            fields: self.fields.into_iter().collect(),
            productions: self.productions.into_iter().collect(),
            extras,
            anchors,
            externals: self.externals,
            conflicts,
            origins: self.origins,
        })
    }
}

fn check_pattern(source: &str, rule: &SmolStr) -> Result<(), GrammarError> {
    regex_syntax::Parser::new()
        .parse(source)
        .map(|_| ())
        .map_err(|e| GrammarError::invalid_pattern(rule.clone(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::dsl::*;

    fn names(normalized: &Normalized) -> Vec<&str> {
        normalized.symbols.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_literals_come_before_patterns() {
        let grammar = Grammar::new("t")
            .rule("start", seq([sym("identifier"), lit("="), sym("number")]))
            .rule("identifier", pattern("[a-z]+"))
            .rule("number", pattern("[0-9]+"))
            .rule("nil", lit("nil"));
        let normalized = normalize(&grammar).unwrap();
        assert_eq!(names(&normalized), vec!["end", "=", "nil", "identifier", "number", "start"]);
        assert_eq!(normalized.terminal_count, 5);
        assert_eq!(normalized.lex_rules.len(), 4);
        assert!(normalized.symbols[2].named, "named literal rule stays named");
    }

    #[test]
    fn test_anonymous_literal_resolves_to_named_literal_rule() {
        let grammar = Grammar::new("t")
            .rule("start", choice([lit("nil"), sym("nil")]))
            .rule("nil", lit("nil"));
        let normalized = normalize(&grammar).unwrap();
        let nil = Symbol(1);
        assert_eq!(normalized.symbols[1].name, "nil");
        assert!(normalized.productions.iter().all(|p| p.rhs == vec![nil]));
        assert_eq!(normalized.productions.len(), 1, "duplicate alternatives collapse");
    }

    #[test]
    fn test_optional_and_fields_expand() {
        let grammar = Grammar::new("t").rule(
            "decl",
            seq([lit("var"), field("name", pattern("[a-z]+")), optional(seq([lit("="), field("value", lit("1"))]))]),
        );
        let normalized = normalize(&grammar).unwrap();
        assert_eq!(normalized.productions.len(), 2);
        let long = normalized.productions.iter().find(|p| p.rhs.len() == 4).unwrap();
        assert_eq!(long.fields, vec![None, Some(FieldId(0)), None, Some(FieldId(1))]);
        assert_eq!(normalized.fields, vec![SmolStr::new("name"), SmolStr::new("value")]);
    }

    #[test]
    fn test_repeat_introduces_hidden_helper() {
        let grammar = Grammar::new("t").rule("list", repeat(lit("a")));
        let normalized = normalize(&grammar).unwrap();
        let helper = normalized
            .symbols
            .iter()
            .position(|s| s.name == "list_repeat1")
            .unwrap();
        assert!(normalized.symbols[helper].hidden);
        assert_eq!(normalized.origins[helper], normalized.start);
        let helper = Symbol(helper as u16);
        let lhs_helper: Vec<_> = normalized.productions.iter().filter(|p| p.lhs == helper).collect();
        assert_eq!(lhs_helper.len(), 2);
        assert!(lhs_helper.iter().any(|p| p.rhs.first() == Some(&helper)));
    }

    #[test]
    fn test_innermost_prec_wins() {
        let grammar = Grammar::new("t").rule(
            "e",
            prec_left(1, choice([prec_right(5, lit("a")), lit("b")])),
        );
        let normalized = normalize(&grammar).unwrap();
        let precs: Vec<_> = normalized
            .productions
            .iter()
            .map(|p| (p.precedence, p.assoc))
            .collect();
        assert_eq!(precs, vec![(5, Assoc::Right), (1, Assoc::Left)]);
    }

    #[test]
    fn test_undefined_symbol() {
        let grammar = Grammar::new("t").rule("start", sym("missing"));
        let err = normalize(&grammar).unwrap_err();
        assert!(matches!(err, GrammarError::UndefinedSymbol { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_empty_and_token_start() {
        assert!(matches!(normalize(&Grammar::new("t")), Err(GrammarError::Empty(_))));
        let grammar = Grammar::new("t").rule("word", pattern("[a-z]+"));
        assert!(matches!(normalize(&grammar), Err(GrammarError::TokenStartRule(_))));
    }

    #[test]
    fn test_extra_must_be_token() {
        let grammar = Grammar::new("t")
            .rule("start", lit("a"))
            .rule("other", seq([lit("b"), lit("c")]))
            .extra(sym("other"));
        // a single-literal start rule is a token
        assert!(matches!(normalize(&grammar), Err(GrammarError::TokenStartRule(_))));

        let grammar = Grammar::new("t")
            .rule("start", seq([lit("a")]))
            .rule("other", seq([lit("b"), lit("c")]))
            .extra(sym("other"));
        assert!(matches!(normalize(&grammar), Err(GrammarError::InvalidExtra(_))));
    }

    #[test]
    fn test_too_many_rules() {
        let grammar = (0..u16::MAX).fold(Grammar::new("t"), |grammar, i| {
            grammar.rule(&format!("r{i}"), seq([sym("r0"), lit("a")]))
        });
        assert!(matches!(normalize(&grammar), Err(GrammarError::TooManySymbols(_))));
    }

    #[test]
    fn test_invalid_inline_pattern() {
        let grammar = Grammar::new("t").rule("start", seq([lit("x"), field("f", pattern("[a-"))]));
        assert!(matches!(
            normalize(&grammar),
            Err(GrammarError::InvalidPattern { ref rule, .. }) if rule == "start"
        ));
    }
}
