//! Dense symbol sets.

use crate::base::Symbol;

/// A growable bitset of symbols.
///
/// Used for lookahead sets during table construction and for the
/// per-lex-mode valid-terminal masks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TokenSet {
    words: Vec<u64>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(symbols: usize) -> Self {
        Self {
            words: vec![0; symbols.div_ceil(64)],
        }
    }

    /// Insert a symbol. Returns `true` if it was not present.
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        let (word, bit) = Self::slot(symbol);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_set = self.words[word] & bit != 0;
        self.words[word] |= bit;
        !was_set
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        let (word, bit) = Self::slot(symbol);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// Add every symbol of `other`. Returns `true` if anything changed.
    pub fn union_with(&mut self, other: &TokenSet) -> bool {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Symbols in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            (0..64u32)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| Symbol((index * 64) as u16 + bit as u16))
        })
    }

    fn slot(symbol: Symbol) -> (usize, u64) {
        (symbol.index() / 64, 1u64 << (symbol.index() % 64))
    }
}

impl FromIterator<Symbol> for TokenSet {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for symbol in iter {
            set.insert(symbol);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_iterate() {
        let mut set = TokenSet::with_capacity(10);
        assert!(set.insert(Symbol(3)));
        assert!(!set.insert(Symbol(3)));
        set.insert(Symbol(130));
        set.insert(Symbol(0));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Symbol(0), Symbol(3), Symbol(130)]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(Symbol(130)));
        assert!(!set.contains(Symbol(131)));
    }

    #[test]
    fn test_union_reports_change() {
        let mut a: TokenSet = [Symbol(1), Symbol(2)].into_iter().collect();
        let b: TokenSet = [Symbol(2)].into_iter().collect();
        assert!(!a.union_with(&b));
        let c: TokenSet = [Symbol(70)].into_iter().collect();
        assert!(a.union_with(&c));
        assert!(a.contains(Symbol(70)));
        assert!(!TokenSet::new().contains(Symbol(5)));
        assert!(TokenSet::with_capacity(100).is_empty());
    }
}
