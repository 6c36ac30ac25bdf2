//! Grammar definition and parse table generation.
//!
//! Grammars are written with the rule combinators in this module and
//! compiled with [`Grammar::build`] into a [`GrammarTable`](crate::table::GrammarTable):
//! symbols are numbered and rule expressions flattened into productions, then
//! an LALR(1) automaton is built. Conflicts between rules listed together in
//! [`Grammar::conflict`] are kept in the table and explored by the GLR parser.

mod dsl;
mod error;
mod grammar;
mod lr;
mod normalize;

pub use dsl::{
    Rule, blank, choice, comma_sep, comma_sep1, field, lit, optional, pattern, prec, prec_left, prec_right, repeat,
    repeat1, seq, sym,
};
pub use error::GrammarError;
pub use grammar::Grammar;
