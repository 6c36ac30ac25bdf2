//! Multi-pattern token automaton.
//!
//! All lexical rules of a grammar are compiled into one anchored dense DFA
//! reporting every pattern that matches. The DFA is stepped one byte at a
//! time so the lexer learns, in a single pass, the longest match of every
//! rule and how far it looked before the automaton died. That extent can
//! overshoot the strict minimum by a byte, never undershoot it.

use crate::base::Symbol;
use crate::table::{LanguageError, LexRule, TokenPattern};
use regex_automata::dfa::{Automaton, StartKind, dense};
use regex_automata::{Anchored, Input, MatchKind};
use smol_str::SmolStr;

/// Result of running the automaton from one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scan {
    /// Longest match among the valid symbols: `(symbol, end)`
    pub valid: Option<(Symbol, usize)>,
    /// Longest match among all symbols
    pub any: Option<(Symbol, usize)>,
    /// Exclusive end of the bytes examined; `len + 1` when end of input was seen
    pub examined_end: usize,
}

pub(crate) struct TokenMatcher {
    dfa: Option<dense::DFA<Vec<u32>>>,
    /// Pattern index to terminal
    symbols: Vec<Symbol>,
}

impl TokenMatcher {
    pub(crate) fn new(
        rules: &[LexRule],
        symbol_name: impl Fn(Symbol) -> SmolStr,
    ) -> Result<Self, LanguageError> {
        let mut patterns = Vec::with_capacity(rules.len());
        for rule in rules {
            let pattern = match &rule.pattern {
                TokenPattern::Literal(text) if text.is_empty() => {
                    return Err(LanguageError::invalid_pattern(
                        symbol_name(rule.symbol),
                        "empty literal",
                    ));
                }
                TokenPattern::Literal(text) => regex_syntax::escape(text),
                TokenPattern::Regex(source) => {
                    regex_syntax::Parser::new()
                        .parse(source)
                        .map_err(|e| LanguageError::invalid_pattern(symbol_name(rule.symbol), e.to_string()))?;
                    source.to_string()
                }
            };
            patterns.push(pattern);
        }

        let dfa = if patterns.is_empty() {
            None
        } else {
            let config = dense::Config::new()
                .match_kind(MatchKind::All)
                .start_kind(StartKind::Anchored);
            let dfa = dense::Builder::new()
                .configure(config)
                .build_many(&patterns)
                .map_err(|e| LanguageError::invalid_pattern("<lexer>", e.to_string()))?;
            Some(dfa)
        };

        Ok(Self {
            dfa,
            symbols: rules.iter().map(|r| r.symbol).collect(),
        })
    }

    /// Run every rule from `start`.
    ///
    /// Empty matches are ignored. Ties on length go to the rule listed first.
    pub(crate) fn scan(&self, text: &str, start: usize, is_valid: impl Fn(Symbol) -> bool) -> Scan {
        let mut scan = Scan {
            valid: None,
            any: None,
            examined_end: start,
        };
        let Some(dfa) = &self.dfa else {
            return scan;
        };
        let input = Input::new(text).range(start..).anchored(Anchored::Yes);
        let Ok(mut state) = dfa.start_state_forward(&input) else {
            return scan;
        };

        let bytes = text.as_bytes();
        let mut at = start;
        loop {
            if at < bytes.len() {
                state = dfa.next_state(state, bytes[at]);
                scan.examined_end = at + 1;
            } else {
                state = dfa.next_eoi_state(state);
                scan.examined_end = bytes.len() + 1;
            }

            // Matches are reported one byte late: they end at `at`.
            if dfa.is_match_state(state) && at > start {
                let mut best_here: Option<usize> = None;
                let mut best_valid_here: Option<usize> = None;
                for index in 0..dfa.match_len(state) {
                    let pattern = dfa.match_pattern(state, index).as_usize();
                    best_here = Some(best_here.map_or(pattern, |p| p.min(pattern)));
                    if is_valid(self.symbols[pattern]) {
                        best_valid_here = Some(best_valid_here.map_or(pattern, |p| p.min(pattern)));
                    }
                }
                // Later ends are always longer, so the latest match wins.
                if let Some(pattern) = best_here {
                    scan.any = Some((self.symbols[pattern], at));
                }
                if let Some(pattern) = best_valid_here {
                    scan.valid = Some((self.symbols[pattern], at));
                }
            }

            if at >= bytes.len() || dfa.is_dead_state(state) || dfa.is_quit_state(state) {
                break;
            }
            at += 1;
        }
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(patterns: &[TokenPattern]) -> Vec<LexRule> {
        patterns
            .iter()
            .enumerate()
            .map(|(i, p)| LexRule {
                symbol: Symbol(i as u16 + 1),
                pattern: p.clone(),
            })
            .collect()
    }

    fn matcher(patterns: &[TokenPattern]) -> TokenMatcher {
        TokenMatcher::new(&rules(patterns), |s| SmolStr::new(s.to_string())).unwrap()
    }

    #[test]
    fn test_longest_match_wins() {
        let m = matcher(&[
            TokenPattern::Literal("if".into()),
            TokenPattern::Regex("[a-z]+".into()),
        ]);
        let scan = m.scan("iffy x", 0, |_| true);
        assert_eq!(scan.valid, Some((Symbol(2), 4)));
        // the match is reported after the space, the dead state after the `x`
        assert_eq!(scan.examined_end, 6);
    }

    #[test]
    fn test_tie_goes_to_first_rule() {
        let m = matcher(&[
            TokenPattern::Literal("if".into()),
            TokenPattern::Regex("[a-z]+".into()),
        ]);
        let scan = m.scan("if x", 0, |_| true);
        assert_eq!(scan.valid, Some((Symbol(1), 2)));
    }

    #[test]
    fn test_valid_set_restricts_but_any_is_kept() {
        let m = matcher(&[
            TokenPattern::Literal("if".into()),
            TokenPattern::Regex("[a-z]+".into()),
        ]);
        let scan = m.scan("if", 0, |s| s == Symbol(2));
        assert_eq!(scan.valid, Some((Symbol(2), 2)));
        assert_eq!(scan.any, Some((Symbol(1), 2)));
        assert_eq!(scan.examined_end, 3, "end of input counts as examined");
    }

    #[test]
    fn test_no_match() {
        let m = matcher(&[TokenPattern::Literal("a".into())]);
        let scan = m.scan("ba", 0, |_| true);
        assert_eq!(scan.valid, None);
        assert_eq!(scan.any, None);
        assert_eq!(scan.examined_end, 1);
    }

    #[test]
    fn test_scan_from_offset() {
        let m = matcher(&[TokenPattern::Regex(r"\d+".into())]);
        let scan = m.scan("ab123;", 2, |_| true);
        assert_eq!(scan.valid, Some((Symbol(1), 5)));
        assert_eq!(scan.examined_end, 7);
    }

    #[test]
    fn test_invalid_pattern_names_symbol() {
        let err = TokenMatcher::new(
            &rules(&[TokenPattern::Regex("(unclosed".into())]),
            |_| SmolStr::new("broken"),
        )
        .err()
        .unwrap();
        assert!(matches!(err, LanguageError::InvalidPattern { ref symbol, .. } if symbol == "broken"));
    }
}
