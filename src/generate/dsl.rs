//! Rule combinators.
//!
//! ```ignore
//! use mufiz_syntax::generate::*;
//!
//! let addition = prec_left(6, seq([
//!     field("left", sym("_expression")),
//!     lit("+"),
//!     field("right", sym("_expression")),
//! ]));
//! ```

use crate::table::Assoc;
use smol_str::SmolStr;

/// A grammar rule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Matches the empty string
    Blank,
    /// Exact text; becomes an anonymous terminal
    Literal(SmolStr),
    /// Regular expression; inline patterns become hidden anonymous terminals
    Pattern(SmolStr),
    /// Reference to another named rule or external symbol
    Symbol(SmolStr),
    Seq(Vec<Rule>),
    Choice(Vec<Rule>),
    /// Zero or more
    Repeat(Box<Rule>),
    /// One or more
    Repeat1(Box<Rule>),
    Field(SmolStr, Box<Rule>),
    Prec {
        value: i32,
        assoc: Assoc,
        rule: Box<Rule>,
    },
}

impl Rule {
    /// Whether the rule only describes characters (no symbol references).
    pub(crate) fn is_lexical(&self) -> bool {
        match self {
            Rule::Blank | Rule::Literal(_) | Rule::Pattern(_) => true,
            Rule::Symbol(_) | Rule::Field(..) => false,
            Rule::Seq(rules) | Rule::Choice(rules) => rules.iter().all(Rule::is_lexical),
            Rule::Repeat(rule) | Rule::Repeat1(rule) => rule.is_lexical(),
            Rule::Prec { rule, .. } => rule.is_lexical(),
        }
    }

    pub(crate) fn has_pattern(&self) -> bool {
        match self {
            Rule::Pattern(_) => true,
            Rule::Blank | Rule::Literal(_) | Rule::Symbol(_) => false,
            Rule::Seq(rules) | Rule::Choice(rules) => rules.iter().any(Rule::has_pattern),
            Rule::Repeat(rule) | Rule::Repeat1(rule) | Rule::Field(_, rule) => rule.has_pattern(),
            Rule::Prec { rule, .. } => rule.has_pattern(),
        }
    }

    /// Render a lexical rule as one regular expression.
    pub(crate) fn to_regex(&self) -> String {
        match self {
            Rule::Blank => String::new(),
            Rule::Literal(text) => regex_syntax::escape(text),
            Rule::Pattern(source) => format!("(?:{source})"),
            Rule::Seq(rules) => rules.iter().map(Rule::to_regex).collect(),
            Rule::Choice(rules) => {
                let alternatives: Vec<_> = rules.iter().map(Rule::to_regex).collect();
                format!("(?:{})", alternatives.join("|"))
            }
            Rule::Repeat(rule) => format!("(?:{})*", rule.to_regex()),
            Rule::Repeat1(rule) => format!("(?:{})+", rule.to_regex()),
            Rule::Prec { rule, .. } | Rule::Field(_, rule) => rule.to_regex(),
            Rule::Symbol(_) => String::new(),
        }
    }
}

pub fn blank() -> Rule {
    Rule::Blank
}

pub fn lit(text: &str) -> Rule {
    Rule::Literal(SmolStr::new(text))
}

pub fn pattern(source: &str) -> Rule {
    Rule::Pattern(SmolStr::new(source))
}

pub fn sym(name: &str) -> Rule {
    Rule::Symbol(SmolStr::new(name))
}

pub fn seq(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Seq(rules.into_iter().collect())
}

pub fn choice(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Choice(rules.into_iter().collect())
}

pub fn optional(rule: Rule) -> Rule {
    Rule::Choice(vec![rule, Rule::Blank])
}

pub fn repeat(rule: Rule) -> Rule {
    Rule::Repeat(Box::new(rule))
}

pub fn repeat1(rule: Rule) -> Rule {
    Rule::Repeat1(Box::new(rule))
}

pub fn field(name: &str, rule: Rule) -> Rule {
    Rule::Field(SmolStr::new(name), Box::new(rule))
}

pub fn prec(value: i32, rule: Rule) -> Rule {
    Rule::Prec {
        value,
        assoc: Assoc::None,
        rule: Box::new(rule),
    }
}

pub fn prec_left(value: i32, rule: Rule) -> Rule {
    Rule::Prec {
        value,
        assoc: Assoc::Left,
        rule: Box::new(rule),
    }
}

pub fn prec_right(value: i32, rule: Rule) -> Rule {
    Rule::Prec {
        value,
        assoc: Assoc::Right,
        rule: Box::new(rule),
    }
}

/// `rule (',' rule)*`
pub fn comma_sep1(rule: Rule) -> Rule {
    seq([rule.clone(), repeat(seq([lit(","), rule]))])
}

/// `(rule (',' rule)*)?`
pub fn comma_sep(rule: Rule) -> Rule {
    optional(comma_sep1(rule))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_classification() {
        assert!(seq([lit("\""), repeat(pattern("[^\"]")), lit("\"")]).is_lexical());
        assert!(!seq([lit("("), sym("expr")]).is_lexical());
        assert!(!field("x", lit("a")).is_lexical());
        assert!(choice([lit("a"), pattern("b+")]).has_pattern());
        assert!(!choice([lit("a"), lit("b")]).has_pattern());
    }

    #[test]
    fn test_to_regex_escapes_literals() {
        let rule = seq([lit("a+"), optional(pattern(r"\d"))]);
        assert_eq!(rule.to_regex(), r"a\+(?:(?:\d)|)");
    }
}
