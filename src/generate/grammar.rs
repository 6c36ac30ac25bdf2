//! Grammar builder.

use super::GrammarError;
use super::dsl::Rule;
use super::lr;
use super::normalize::normalize;
use crate::table::{GrammarTable, Language};
use indexmap::IndexMap;
use smol_str::SmolStr;

/// A grammar description, compiled into a [`GrammarTable`] with
/// [`Grammar::build`].
///
/// The first rule added is the start rule. Rule names starting with `_` are
/// hidden: their nodes are spliced into the parent in the public tree view.
///
/// A named rule made only of literals and patterns, with at least one
/// pattern (or a single literal), becomes a named terminal.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) name: SmolStr,
    pub(crate) rules: IndexMap<SmolStr, Rule>,
    pub(crate) extras: Vec<Rule>,
    pub(crate) conflicts: Vec<Vec<SmolStr>>,
    pub(crate) anchors: Vec<Rule>,
    pub(crate) externals: Vec<SmolStr>,
}

impl Grammar {
    pub fn new(name: &str) -> Self {
        Self {
            name: SmolStr::new(name),
            rules: IndexMap::new(),
            extras: Vec::new(),
            conflicts: Vec::new(),
            anchors: Vec::new(),
            externals: Vec::new(),
        }
    }

    /// Add a named rule. Redefining a name replaces the rule in place.
    pub fn rule(mut self, name: &str, rule: Rule) -> Self {
        self.rules.insert(SmolStr::new(name), rule);
        self
    }

    /// Tokens allowed anywhere between other tokens (whitespace, comments).
    pub fn extra(mut self, rule: Rule) -> Self {
        self.extras.push(rule);
        self
    }

    /// Rules whose conflicts are expected and resolved at parse time by forking.
    pub fn conflict<'a>(mut self, rules: impl IntoIterator<Item = &'a str>) -> Self {
        self.conflicts.push(rules.into_iter().map(SmolStr::new).collect());
        self
    }

    /// A token error recovery may resynchronize on.
    pub fn anchor(mut self, rule: Rule) -> Self {
        self.anchors.push(rule);
        self
    }

    /// A terminal recognized by an [`ExternalScanner`](crate::lexer::ExternalScanner).
    pub fn external(mut self, name: &str) -> Self {
        self.externals.push(SmolStr::new(name));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile the grammar into a parse table.
    ///
    /// Conflicts never fail the build: undeclared ones are resolved by
    /// precedence, associativity and rule order, and logged.
    pub fn build(&self) -> Result<GrammarTable, GrammarError> {
        let normalized = normalize(self)?;
        let table = lr::build_table(&normalized);
        tracing::debug!(
            grammar = %self.name,
            states = table.state_count,
            symbols = table.symbols.len(),
            "built parse table"
        );
        Ok(table)
    }

    /// Build the table and load it.
    pub fn compile(&self) -> Result<Language, GrammarError> {
        Ok(Language::new(self.build()?)?)
    }
}
