//! LALR(1) table construction.
//!
//! States are built as LR(1) item sets whose cores are merged as soon as
//! they are discovered: when a merge grows the lookaheads of an existing
//! state, that state is queued again and its successors re-propagated. The
//! fixpoint is the LALR(1) automaton.
//!
//! Conflicts are resolved statically by precedence, then by the reduce
//! rule's associativity, then by rule order. Only ties between rules the
//! grammar declared as conflicting are kept as multi-action cells, ordered
//! by preference, for the parser to fork on.

use super::normalize::Normalized;
use crate::base::{LexModeId, RuleId, StateId, Symbol, TokenSet};
use crate::table::{ActionSlot, Assoc, GrammarTable, ParseAction, RuleInfo, TABLE_FORMAT_VERSION};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Item {
    production: u32,
    dot: u16,
}

#[derive(Debug)]
struct State {
    kernel: Vec<Item>,
    lookaheads: Vec<TokenSet>,
    transitions: BTreeMap<Symbol, usize>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    action: ParseAction,
    precedence: i32,
    assoc: Assoc,
    /// Earliest production involved; lower wins ties
    order: usize,
    is_shift: bool,
}

pub(crate) fn build_table(grammar: &Normalized) -> GrammarTable {
    let mut builder = TableBuilder::new(grammar);
    builder.compute_first_sets();
    let states = builder.build_states();
    builder.assemble(&states)
}

struct TableBuilder<'a> {
    grammar: &'a Normalized,
    terminal_count: usize,
    /// Index of the implicit `start' -> start` production
    augmented: u32,
    augmented_rhs: [Symbol; 1],
    by_lhs: Vec<Vec<u32>>,
    first: Vec<TokenSet>,
    nullable: Vec<bool>,
}

impl<'a> TableBuilder<'a> {
    fn new(grammar: &'a Normalized) -> Self {
        let terminal_count = grammar.terminal_count as usize;
        let nonterminals = grammar.symbols.len() - terminal_count;
        let mut by_lhs = vec![Vec::new(); nonterminals];
        for (index, production) in grammar.productions.iter().enumerate() {
            by_lhs[production.lhs.index() - terminal_count].push(index as u32);
        }
        Self {
            grammar,
            terminal_count,
            augmented: grammar.productions.len() as u32,
            augmented_rhs: [grammar.start],
            by_lhs,
            first: vec![TokenSet::with_capacity(terminal_count); nonterminals],
            nullable: vec![false; nonterminals],
        }
    }

    fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.terminal_count
    }

    fn column(&self, symbol: Symbol) -> usize {
        symbol.index() - self.terminal_count
    }

    fn rhs(&self, production: u32) -> &[Symbol] {
        if production == self.augmented {
            &self.augmented_rhs
        } else {
            &self.grammar.productions[production as usize].rhs
        }
    }

    fn precedence(&self, production: u32) -> (i32, Assoc) {
        self.grammar
            .productions
            .get(production as usize)
            .map_or((0, Assoc::None), |p| (p.precedence, p.assoc))
    }

    // ========================================================================
    // FIRST sets
    // ========================================================================

    fn compute_first_sets(&mut self) {
        loop {
            let mut changed = false;
            for production in &self.grammar.productions {
                let lhs = self.column(production.lhs);
                let (first, nullable) = self.first_of(&production.rhs);
                if nullable && !self.nullable[lhs] {
                    self.nullable[lhs] = true;
                    changed = true;
                }
                changed |= self.first[lhs].union_with(&first);
            }
            if !changed {
                break;
            }
        }
    }

    /// FIRST of a symbol sequence, and whether the whole sequence is nullable
    fn first_of(&self, symbols: &[Symbol]) -> (TokenSet, bool) {
        let mut set = TokenSet::with_capacity(self.terminal_count);
        for &symbol in symbols {
            if self.is_terminal(symbol) {
                set.insert(symbol);
                return (set, false);
            }
            let column = self.column(symbol);
            set.union_with(&self.first[column]);
            if !self.nullable[column] {
                return (set, false);
            }
        }
        (set, true)
    }

    // ========================================================================
    // Item sets
    // ========================================================================

    fn closure(&self, kernel: impl IntoIterator<Item = (Item, TokenSet)>) -> IndexMap<Item, TokenSet> {
        let mut items: IndexMap<Item, TokenSet> = kernel.into_iter().collect();
        let mut work: Vec<usize> = (0..items.len()).collect();
        while let Some(index) = work.pop() {
            let Some((&item, lookahead)) = items.get_index(index) else {
                continue;
            };
            let rhs = self.rhs(item.production);
            let dot = item.dot as usize;
            let Some(&next) = rhs.get(dot) else {
                continue;
            };
            if self.is_terminal(next) {
                continue;
            }
            let (mut follow, nullable) = self.first_of(&rhs[dot + 1..]);
            if nullable {
                follow.union_with(lookahead);
            }
            for &production in &self.by_lhs[self.column(next)] {
                let item = Item { production, dot: 0 };
                match items.get_index_of(&item) {
                    Some(existing) => {
                        let grew = items
                            .get_index_mut(existing)
                            .is_some_and(|(_, set)| set.union_with(&follow));
                        if grew {
                            work.push(existing);
                        }
                    }
                    None => {
                        let (inserted, _) = items.insert_full(item, follow.clone());
                        work.push(inserted);
                    }
                }
            }
        }
        items
    }

    fn kernel_of(state: &State) -> impl Iterator<Item = (Item, TokenSet)> + '_ {
        state.kernel.iter().copied().zip(state.lookaheads.iter().cloned())
    }

    fn build_states(&self) -> Vec<State> {
        let start = Item {
            production: self.augmented,
            dot: 0,
        };
        let mut states = vec![State {
            kernel: vec![start],
            lookaheads: vec![[Symbol::END].into_iter().collect()],
            transitions: BTreeMap::new(),
        }];
        let mut by_core: FxHashMap<Vec<Item>, usize> = FxHashMap::default();
        by_core.insert(vec![start], 0);
        let mut queue = VecDeque::from([0]);
        let mut queued = vec![true];

        while let Some(current) = queue.pop_front() {
            queued[current] = false;
            let closure = self.closure(Self::kernel_of(&states[current]));

            let mut successors: BTreeMap<Symbol, BTreeMap<Item, TokenSet>> = BTreeMap::new();
            for (item, lookahead) in &closure {
                if let Some(&next) = self.rhs(item.production).get(item.dot as usize) {
                    let advanced = Item {
                        production: item.production,
                        dot: item.dot + 1,
                    };
                    successors
                        .entry(next)
                        .or_default()
                        .entry(advanced)
                        .or_default()
                        .union_with(lookahead);
                }
            }

            for (symbol, kernel) in successors {
                let core: Vec<Item> = kernel.keys().copied().collect();
                let known = by_core.get(&core).copied();
                let target = match known {
                    Some(existing) => {
                        let mut grew = false;
                        for (slot, lookahead) in states[existing].lookaheads.iter_mut().zip(kernel.values()) {
                            grew |= slot.union_with(lookahead);
                        }
                        if grew && !queued[existing] {
                            queued[existing] = true;
                            queue.push_back(existing);
                        }
                        existing
                    }
                    None => {
                        let created = states.len();
                        states.push(State {
                            kernel: core.clone(),
                            lookaheads: kernel.into_values().collect(),
                            transitions: BTreeMap::new(),
                        });
                        by_core.insert(core, created);
                        queue.push_back(created);
                        queued.push(true);
                        created
                    }
                };
                states[current].transitions.insert(symbol, target);
            }
        }
        states
    }

    // ========================================================================
    // Actions
    // ========================================================================

    fn assemble(&self, states: &[State]) -> GrammarTable {
        let grammar = self.grammar;
        let nonterminals = grammar.symbols.len() - self.terminal_count;
        let mut action_slots = Vec::with_capacity(states.len() * self.terminal_count);
        let mut actions = Vec::new();
        let mut action_lists: FxHashMap<Vec<ParseAction>, u32> = FxHashMap::default();
        let mut gotos = vec![None; states.len() * nonterminals];
        let mut lex_modes: Vec<Vec<Symbol>> = Vec::new();
        let mut lex_mode_ids: FxHashMap<Vec<Symbol>, LexModeId> = FxHashMap::default();
        let mut state_lex_modes = Vec::with_capacity(states.len());

        for (index, state) in states.iter().enumerate() {
            let cells = self.state_actions(index, state);

            let mut row = vec![ActionSlot::default(); self.terminal_count];
            let mut valid = Vec::new();
            for (symbol, list) in cells {
                if !symbol.is_end() {
                    valid.push(symbol);
                }
                let start = *action_lists.entry(list.clone()).or_insert_with(|| {
                    let start = actions.len() as u32;
                    actions.extend_from_slice(&list);
                    start
                });
                row[symbol.index()] = ActionSlot {
                    start,
                    len: list.len() as u16,
                };
            }
            action_slots.extend(row);

            for (&symbol, &target) in &state.transitions {
                if !self.is_terminal(symbol) {
                    gotos[index * nonterminals + self.column(symbol)] = Some(StateId(target as u32));
                }
            }

            let mode = *lex_mode_ids.entry(valid.clone()).or_insert_with(|| {
                lex_modes.push(valid);
                LexModeId((lex_modes.len() - 1) as u16)
            });
            state_lex_modes.push(mode);
        }

        let rules = grammar
            .productions
            .iter()
            .map(|p| RuleInfo {
                lhs: p.lhs,
                child_count: p.rhs.len() as u16,
                precedence: p.precedence,
                assoc: p.assoc,
                fields: p.fields.clone(),
            })
            .collect();

        GrammarTable {
            version: TABLE_FORMAT_VERSION,
            name: grammar.name.clone(),
            symbols: grammar.symbols.clone(),
            terminal_count: grammar.terminal_count,
            fields: grammar.fields.clone(),
            rules,
            state_count: states.len() as u32,
            action_slots,
            actions,
            gotos,
            lex_rules: grammar.lex_rules.clone(),
            lex_modes,
            state_lex_modes,
            extras: grammar.extras.clone(),
            anchors: grammar.anchors.clone(),
            external_symbols: grammar.externals.clone(),
            start_symbol: grammar.start,
        }
    }

    /// Resolved action lists of one state, by terminal.
    fn state_actions(&self, index: usize, state: &State) -> BTreeMap<Symbol, Vec<ParseAction>> {
        let closure = self.closure(Self::kernel_of(state));
        let mut candidates: BTreeMap<Symbol, Vec<Candidate>> = BTreeMap::new();
        let mut shift_items: BTreeMap<Symbol, Vec<Item>> = BTreeMap::new();

        for (item, lookahead) in &closure {
            match self.rhs(item.production).get(item.dot as usize) {
                Some(&next) if self.is_terminal(next) => {
                    shift_items.entry(next).or_default().push(*item);
                }
                Some(_) => {}
                None if item.production == self.augmented => {
                    if lookahead.contains(Symbol::END) {
                        candidates.entry(Symbol::END).or_default().push(Candidate {
                            action: ParseAction::Accept,
                            precedence: 0,
                            assoc: Assoc::None,
                            order: 0,
                            is_shift: true,
                        });
                    }
                }
                None => {
                    let (precedence, assoc) = self.precedence(item.production);
                    for symbol in lookahead.iter() {
                        candidates.entry(symbol).or_default().push(Candidate {
                            action: ParseAction::Reduce(RuleId(item.production)),
                            precedence,
                            assoc,
                            order: item.production as usize,
                            is_shift: false,
                        });
                    }
                }
            }
        }

        for (symbol, items) in &shift_items {
            let Some(&target) = state.transitions.get(symbol) else {
                continue;
            };
            let precedence = items
                .iter()
                .map(|item| self.precedence(item.production).0)
                .max()
                .unwrap_or(0);
            let order = items.iter().map(|item| item.production as usize).min().unwrap_or(0);
            candidates.entry(*symbol).or_default().push(Candidate {
                action: ParseAction::Shift(StateId(target as u32)),
                precedence,
                assoc: Assoc::None,
                order,
                is_shift: true,
            });
        }

        candidates
            .into_iter()
            .map(|(symbol, cell)| {
                let shifts = shift_items.get(&symbol).map_or(&[][..], Vec::as_slice);
                (symbol, self.resolve(index, symbol, cell, shifts))
            })
            .collect()
    }

    fn resolve(&self, state: usize, symbol: Symbol, cell: Vec<Candidate>, shift_items: &[Item]) -> Vec<ParseAction> {
        if cell.len() == 1 {
            return vec![cell[0].action];
        }

        let mut winner = cell[0];
        for candidate in &cell[1..] {
            if compare(candidate, &winner) == Ordering::Less {
                winner = *candidate;
            }
        }
        let mut tied: Vec<Candidate> = cell
            .iter()
            .copied()
            .filter(|c| c.action != winner.action && decisive(&winner, c).is_none())
            .collect();
        if tied.is_empty() {
            tracing::trace!(state, symbol = %self.name(symbol), "conflict resolved by precedence");
            return vec![winner.action];
        }
        tied.sort_by_key(|c| c.order);

        let involved = self.involved_rules(&cell, shift_items);
        let declared = self
            .grammar
            .conflicts
            .iter()
            .any(|set| involved.iter().all(|rule| set.contains(rule)));
        let rules: Vec<&str> = involved.iter().map(|&rule| self.name(rule)).collect();
        if declared {
            tracing::debug!(state, symbol = %self.name(symbol), ?rules, "keeping declared conflict");
            std::iter::once(winner.action)
                .chain(tied.iter().map(|c| c.action))
                .collect()
        } else {
            tracing::warn!(
                state,
                symbol = %self.name(symbol),
                ?rules,
                "undeclared conflict resolved by rule order"
            );
            vec![winner.action]
        }
    }

    /// Named rules taking part in a conflict
    fn involved_rules(&self, cell: &[Candidate], shift_items: &[Item]) -> Vec<Symbol> {
        let mut rules = FxHashSet::default();
        for candidate in cell {
            if let ParseAction::Reduce(rule) = candidate.action {
                let lhs = self.grammar.productions[rule.index()].lhs;
                rules.insert(self.grammar.origins[lhs.index()]);
            }
        }
        for item in shift_items {
            if item.dot > 0 && item.production != self.augmented {
                let lhs = self.grammar.productions[item.production as usize].lhs;
                rules.insert(self.grammar.origins[lhs.index()]);
            }
        }
        let mut rules: Vec<Symbol> = rules.into_iter().collect();
        rules.sort();
        rules
    }

    fn name(&self, symbol: Symbol) -> &str {
        self.grammar
            .symbols
            .get(symbol.index())
            .map_or("?", |info| info.name.as_str())
    }
}

/// `Less` when `a` is preferred.
fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    decisive(a, b).unwrap_or_else(|| a.order.cmp(&b.order).then(b.is_shift.cmp(&a.is_shift)))
}

/// Preference decided by precedence or associativity, `None` on a real tie.
fn decisive(a: &Candidate, b: &Candidate) -> Option<Ordering> {
    if a.precedence != b.precedence {
        return Some(b.precedence.cmp(&a.precedence));
    }
    match (a.is_shift, b.is_shift) {
        (true, false) => match b.assoc {
            Assoc::Left => Some(Ordering::Greater),
            Assoc::Right => Some(Ordering::Less),
            Assoc::None => None,
        },
        (false, true) => match a.assoc {
            Assoc::Left => Some(Ordering::Less),
            Assoc::Right => Some(Ordering::Greater),
            Assoc::None => None,
        },
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{Grammar, choice, lit, prec_left, prec_right, seq, sym};

    fn symbol(table: &GrammarTable, name: &str) -> Symbol {
        let index = table.symbols.iter().position(|s| s.name == name).unwrap();
        Symbol(index as u16)
    }

    /// Deterministic LR driver taking the preferred action; returns the
    /// precedence of every reduced rule in order.
    fn reductions(table: &GrammarTable, input: &[&str]) -> Vec<i32> {
        let mut tokens: Vec<Symbol> = input.iter().map(|t| symbol(table, t)).collect();
        tokens.push(Symbol::END);
        let mut stack = vec![StateId::START];
        let mut reduced = Vec::new();
        let mut position = 0;
        loop {
            let state = *stack.last().unwrap();
            match table.actions(state, tokens[position])[0] {
                ParseAction::Shift(next) => {
                    stack.push(next);
                    position += 1;
                }
                ParseAction::Reduce(rule) => {
                    let info = &table.rules[rule.index()];
                    stack.truncate(stack.len() - info.child_count as usize);
                    let below = *stack.last().unwrap();
                    stack.push(table.goto(below, info.lhs).unwrap());
                    reduced.push(info.precedence);
                }
                ParseAction::Accept => return reduced,
            }
        }
    }

    #[test]
    fn test_sequence_table() {
        let table = Grammar::new("t").rule("s", seq([lit("a"), lit("b")])).build().unwrap();
        let a = symbol(&table, "a");
        let b = symbol(&table, "b");
        assert!(matches!(table.actions(StateId::START, a), [ParseAction::Shift(_)]));
        assert!(table.actions(StateId::START, b).is_empty());
        assert!(table.actions(StateId::START, Symbol::END).is_empty());

        let mode = table.state_lex_modes[StateId::START.index()];
        assert_eq!(table.lex_modes[mode.index()], vec![a]);

        let after_s = table.goto(StateId::START, table.start_symbol).unwrap();
        assert_eq!(table.actions(after_s, Symbol::END), &[ParseAction::Accept]);
        assert_eq!(reductions(&table, &["a", "b"]), vec![0]);
    }

    #[test]
    fn test_precedence_and_associativity() {
        let table = Grammar::new("t")
            .rule(
                "e",
                choice([
                    prec_left(1, seq([sym("e"), lit("+"), sym("e")])),
                    prec_left(2, seq([sym("e"), lit("*"), sym("e")])),
                    lit("n"),
                ]),
            )
            .build()
            .unwrap();
        assert!(table.action_slots.iter().all(|slot| slot.len <= 1));
        assert_eq!(reductions(&table, &["n", "+", "n", "*", "n"]), vec![0, 0, 0, 2, 1]);
        assert_eq!(reductions(&table, &["n", "*", "n", "+", "n"]), vec![0, 0, 2, 0, 1]);
        assert_eq!(reductions(&table, &["n", "+", "n", "+", "n"]), vec![0, 0, 1, 0, 1]);
    }

    #[test]
    fn test_right_associativity_prefers_shift() {
        let table = Grammar::new("t")
            .rule(
                "stmt",
                prec_right(
                    0,
                    choice([
                        seq([lit("if"), sym("stmt"), lit("else"), sym("stmt")]),
                        seq([lit("if"), sym("stmt")]),
                        lit("x"),
                    ]),
                ),
            )
            .build()
            .unwrap();
        let else_ = symbol(&table, "else");
        let cells: Vec<_> = (0..table.state_count)
            .map(|s| table.actions(StateId(s), else_))
            .filter(|actions| actions.iter().any(|a| matches!(a, ParseAction::Shift(_))))
            .collect();
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|actions| actions.len() == 1));
    }

    #[rstest::rstest]
    #[case::declared(true, 2)]
    #[case::undeclared(false, 1)]
    fn test_reduce_reduce_conflict(#[case] declared: bool, #[case] expected: usize) {
        let mut grammar = Grammar::new("t")
            .rule("s", choice([sym("a"), sym("b")]))
            .rule("a", seq([lit("x")]))
            .rule("b", seq([lit("x")]));
        if declared {
            grammar = grammar.conflict(["a", "b"]);
        }
        let table = grammar.build().unwrap();
        let x = symbol(&table, "x");
        let ParseAction::Shift(after_x) = table.actions(StateId::START, x)[0] else {
            panic!("expected shift");
        };
        let actions = table.actions(after_x, Symbol::END);
        assert_eq!(actions.len(), expected);
        let a = symbol(&table, "a");
        assert!(
            matches!(actions[0], ParseAction::Reduce(rule) if table.rules[rule.index()].lhs == a),
            "earliest rule is preferred"
        );
    }
}
