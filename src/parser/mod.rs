//! GLR stack machine.
//!
//! The parser drives one or more stack versions over the token stream.
//! A table cell with several actions forks the current version; versions
//! advance one token per round, lowest position first, and are merged when
//! they reach identical state stacks. A version whose lookahead has no
//! action is dropped while other versions are alive. When every version has
//! failed, the best one goes through error recovery, so a parse always
//! produces a complete tree.
//!
//! Given an [`EditedTree`], the parser reuses its undamaged tokens and
//! subtrees instead of relexing and rebuilding them.

mod recovery;
mod reuse;
mod stack;

use self::reuse::ReuseCursor;
use self::stack::Stack;
use crate::base::{LexModeId, RuleId, StateId, Symbol, TextRange, TextSize};
use crate::lexer::{Lexer, Token};
use crate::table::{Language, ParseAction};
use crate::tree::builder::{self, Trigger};
use crate::tree::{EditedTree, Node, SyntaxTree};
use std::cmp::Reverse;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Limits applied to every parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Frames a single stack version may hold
    pub max_stack_depth: usize,
    /// Simultaneous stack versions; the lowest-priority ones are pruned
    pub max_versions: usize,
    /// Rounds between cancellation checks
    pub check_interval: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_stack_depth: 10_000,
            max_versions: 6,
            check_interval: 100,
        }
    }
}

/// Snapshot handed to the continuation predicate of [`Parser::parse_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProgress {
    /// Lowest position among the live versions
    pub position: TextSize,
    pub versions: usize,
    pub steps: u64,
}

/// Reasons a parse is abandoned. Malformed input is never one of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("parse stack exceeded {limit} frames")]
    CapacityExceeded { limit: usize },

    #[error("parse cancelled")]
    Cancelled,
}

/// Parses text with one [`Language`].
///
/// A parser holds no per-parse state; one instance can serve any number of
/// parses, from any number of threads.
#[derive(Debug, Clone)]
pub struct Parser {
    language: Arc<Language>,
    options: ParseOptions,
}

impl Parser {
    pub fn new(language: Arc<Language>) -> Self {
        Self {
            language,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn language(&self) -> &Arc<Language> {
        &self.language
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn parse(&self, text: &str) -> Result<SyntaxTree, ParseError> {
        self.parse_with(text, None, |_| true)
    }

    /// Parse `text`, reusing what `edited` still has valid for it.
    ///
    /// `edited` must describe the edits that turned the old text into
    /// `text`; the result is the same tree a fresh parse would build.
    pub fn reparse(&self, text: &str, edited: &EditedTree) -> Result<SyntaxTree, ParseError> {
        self.parse_with(text, Some(edited), |_| true)
    }

    /// Parse with a continuation predicate, checked every
    /// [`check_interval`](ParseOptions::check_interval) rounds. Returning
    /// `false` abandons the parse with [`ParseError::Cancelled`].
    pub fn parse_with<F>(
        &self,
        text: &str,
        previous: Option<&EditedTree>,
        mut proceed: F,
    ) -> Result<SyntaxTree, ParseError>
    where
        F: FnMut(&ParseProgress) -> bool,
    {
        let reuse = previous.and_then(|edited| self.reuse_cursor(text, edited));
        let run = Run::new(&self.language, text, &self.options, reuse);
        let root = run.run(&mut proceed)?;
        Ok(SyntaxTree::new(root, Arc::from(text), self.language.clone()))
    }

    /// Parse until done or until `token` is cancelled.
    pub fn parse_cancellable(
        &self,
        text: &str,
        previous: Option<&EditedTree>,
        token: &CancellationToken,
    ) -> Result<SyntaxTree, ParseError> {
        self.parse_with(text, previous, |_| !token.is_cancelled())
    }

    fn reuse_cursor(&self, text: &str, edited: &EditedTree) -> Option<ReuseCursor> {
        if !Arc::ptr_eq(edited.language(), &self.language) {
            tracing::warn!(
                tree = edited.language().name(),
                parser = self.language.name(),
                "edited tree belongs to another language, parsing from scratch"
            );
            return None;
        }
        if usize::from(edited.root().len()) != text.len() {
            tracing::warn!(
                tree_len = u32::from(edited.root().len()),
                text_len = text.len(),
                "edited tree does not match the text, parsing from scratch"
            );
            return None;
        }
        Some(ReuseCursor::new(edited.root().clone()))
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Normal,
    /// Tokens skipped since the last syntax error, extras included
    Recovering { skipped: Vec<Node> },
}

/// One GLR stack version.
#[derive(Debug, Clone)]
struct Version {
    stack: Stack,
    mode: Mode,
    /// End of everything consumed, skipped tokens included
    position: TextSize,
    error_cost: u32,
    dynamic_precedence: i32,
    /// Creation order; forks get fresh ids
    created: u64,
    /// Lex mode for the tokens after a reused subtree
    lex_override: Option<LexModeId>,
    missing_at: Option<TextSize>,
    anchor_at: Option<TextSize>,
}

type Priority = (u32, Reverse<i32>, u64);

impl Version {
    fn new() -> Self {
        Self {
            stack: Stack::new(),
            mode: Mode::Normal,
            position: TextSize::new(0),
            error_cost: 0,
            dynamic_precedence: 0,
            created: 0,
            lex_override: None,
            missing_at: None,
            anchor_at: None,
        }
    }

    /// Lower is better.
    fn priority(&self) -> Priority {
        (self.error_cost, Reverse(self.dynamic_precedence), self.created)
    }

    fn is_normal(&self) -> bool {
        matches!(self.mode, Mode::Normal)
    }
}

/// The next token, lexed or taken over from the edited tree.
#[derive(Debug, Clone)]
struct Lookahead {
    token: Token,
    reused: Option<Node>,
}

impl Lookahead {
    fn symbol(&self) -> Symbol {
        self.token.symbol
    }

    fn start(&self) -> TextSize {
        self.token.range.start()
    }

    fn end(&self) -> TextSize {
        self.token.range.end()
    }

    fn trigger(&self) -> Trigger {
        Trigger {
            examined_end: self.token.examined_end,
            lex_mode: self.token.lex_mode,
            inserted: false,
        }
    }

    fn node(&self, state: StateId, extra: bool) -> Node {
        match &self.reused {
            Some(node) => node.with_extra(extra),
            None => Node::leaf(&self.token, state, extra),
        }
    }
}

/// State of a single parse.
struct Run<'a> {
    language: &'a Language,
    lexer: Lexer<'a>,
    options: &'a ParseOptions,
    reuse: Option<ReuseCursor>,
    versions: Vec<Version>,
    accepted: Vec<(Node, Priority)>,
    /// Best version dropped for a syntax error, with its lookahead
    failed: Option<(Version, Lookahead)>,
    /// Furthest byte examined while several versions were alive
    ambiguous_until: TextSize,
    last_token: Option<(TextSize, LexModeId, Token)>,
    next_id: u64,
    steps: u64,
}

impl<'a> Run<'a> {
    fn new(
        language: &'a Language,
        text: &'a str,
        options: &'a ParseOptions,
        reuse: Option<ReuseCursor>,
    ) -> Self {
        Self {
            language,
            lexer: Lexer::new(language, text),
            options,
            reuse,
            versions: vec![Version::new()],
            accepted: Vec::new(),
            failed: None,
            ambiguous_until: TextSize::new(0),
            last_token: None,
            next_id: 1,
            steps: 0,
        }
    }

    fn run(mut self, proceed: &mut dyn FnMut(&ParseProgress) -> bool) -> Result<Node, ParseError> {
        let interval = self.options.check_interval.max(1);
        loop {
            self.steps += 1;
            if self.steps % interval == 0 {
                let progress = ParseProgress {
                    position: self.versions.iter().map(|v| v.position).min().unwrap_or_default(),
                    versions: self.versions.len(),
                    steps: self.steps,
                };
                if !proceed(&progress) {
                    tracing::debug!(steps = self.steps, "parse cancelled");
                    return Err(ParseError::Cancelled);
                }
            }

            if self.versions.is_empty() {
                if !self.accepted.is_empty() {
                    break;
                }
                let Some((version, lookahead)) = self.failed.take() else {
                    break;
                };
                self.recover(version, &lookahead)?;
                self.condense();
                continue;
            }

            let index = self
                .versions
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.position)
                .map_or(0, |(index, _)| index);
            let mut version = self.versions.remove(index);
            let ambiguous = !self.versions.is_empty();

            if !ambiguous && version.is_normal() {
                if let Some(reused) = self.reuse_node(&version)? {
                    self.versions.push(reused);
                    continue;
                }
            }

            let lookahead = self.lookahead(&version);
            if ambiguous {
                self.ambiguous_until = self.ambiguous_until.max(lookahead.token.examined_end);
            }
            if !self.language.is_extra(lookahead.symbol()) {
                version.lex_override = None;
            }

            let mut out = Vec::new();
            if version.is_normal() {
                self.advance(version, &lookahead, &mut out)?;
            } else {
                self.advance_recovering(version, &lookahead, &mut out)?;
            }
            self.versions.extend(out);
            self.condense();
        }
        Ok(self.finish())
    }

    fn lookahead(&mut self, version: &Version) -> Lookahead {
        let position = version.position;
        let mode = self.lex_mode(version);
        if let Some(node) = self.reuse.as_mut().and_then(|cursor| cursor.token_at(position, mode)) {
            let token = Token {
                symbol: node.symbol(),
                range: TextRange::at(position, node.len()),
                examined_end: position + node.len() + node.lookahead_bytes(),
                lex_mode: mode,
            };
            tracing::trace!(symbol = self.language.symbol_name(token.symbol), position = u32::from(position), "reused token");
            return Lookahead {
                token,
                reused: Some(node),
            };
        }
        if let Some((at, cached_mode, token)) = self.last_token {
            if at == position && cached_mode == mode {
                return Lookahead { token, reused: None };
            }
        }
        let token = self.lexer.next_token(position, mode);
        self.last_token = Some((position, mode, token));
        Lookahead { token, reused: None }
    }

    fn lex_mode(&self, version: &Version) -> LexModeId {
        version
            .lex_override
            .unwrap_or_else(|| self.language.lex_mode(version.stack.state()))
    }

    /// Apply every action of the lookahead to `version`, forking on
    /// multi-action cells. Versions that shifted go to `out`.
    fn advance(&mut self, version: Version, lookahead: &Lookahead, out: &mut Vec<Version>) -> Result<(), ParseError> {
        let language = self.language;
        let symbol = lookahead.symbol();
        let mut work = vec![version];
        while let Some(version) = work.pop() {
            let actions = language.actions(version.stack.state(), symbol);
            if actions.is_empty() {
                if language.is_extra(symbol) {
                    out.push(self.shift_extra(version, lookahead)?);
                } else {
                    self.fail(version, lookahead);
                }
                continue;
            }
            if actions.len() > 1 {
                // every branch of a fork, the reductions included, is fragile
                self.ambiguous_until = self.ambiguous_until.max(lookahead.token.examined_end);
            }

            for (index, &action) in actions.iter().enumerate() {
                let mut branch = version.clone();
                if index > 0 {
                    branch.created = self.next_id;
                    self.next_id += 1;
                    tracing::debug!(
                        state = version.stack.state().0,
                        symbol = language.symbol_name(symbol),
                        id = branch.created,
                        "forked version"
                    );
                }
                match action {
                    ParseAction::Shift(next) => out.push(self.shift(branch, next, lookahead)?),
                    ParseAction::Reduce(rule) => match self.reduce(branch, rule, lookahead.trigger())? {
                        Some(reduced) => work.push(reduced),
                        None => tracing::debug!(rule = rule.0, "reduction does not fit the stack"),
                    },
                    ParseAction::Accept => self.accept(branch),
                }
            }
        }
        Ok(())
    }

    fn shift(&self, mut version: Version, next: StateId, lookahead: &Lookahead) -> Result<Version, ParseError> {
        self.check_depth(version.stack.depth() + 1)?;
        tracing::trace!(
            symbol = self.language.symbol_name(lookahead.symbol()),
            state = next.0,
            "shift"
        );
        let node = lookahead.node(version.stack.state(), false);
        version.stack = version.stack.push(next, node);
        version.position = lookahead.end();
        Ok(version)
    }

    fn shift_extra(&self, mut version: Version, lookahead: &Lookahead) -> Result<Version, ParseError> {
        self.check_depth(version.stack.depth() + 1)?;
        let node = lookahead.node(version.stack.state(), true);
        version.stack = version.stack.push_extra(node);
        version.position = lookahead.end();
        Ok(version)
    }

    /// Reduce by `rule`. `None` when the stack cannot hold the rule, which
    /// only a malformed table causes.
    fn reduce(&self, mut version: Version, rule: RuleId, trigger: Trigger) -> Result<Option<Version>, ParseError> {
        let language = self.language;
        let info = language.rule(rule);
        let Some(popped) = version.stack.pop_children(usize::from(info.child_count)) else {
            return Ok(None);
        };
        let state = popped.rest.state();
        let Some(next) = language.goto(state, info.lhs) else {
            return Ok(None);
        };
        self.check_depth(popped.rest.depth() + 1 + popped.trailing.len())?;

        let start = popped.rest.position();
        let node = builder::reduce(rule, info, popped.children, start, state, trigger, self.ambiguous_until);
        tracing::trace!(
            symbol = language.symbol_name(info.lhs),
            start = u32::from(start),
            len = u32::from(node.len()),
            "reduce"
        );
        let mut stack = popped.rest.push(next, node);
        for extra in popped.trailing {
            stack = stack.push_extra(extra);
        }
        version.stack = stack;
        version.dynamic_precedence += info.precedence;
        Ok(Some(version))
    }

    fn accept(&mut self, version: Version) {
        let mut leading = version.stack.nodes();
        let root = match leading.iter().position(|node| !node.is_extra()) {
            Some(index) if leading[index + 1..].iter().all(Node::is_extra) => {
                let mut rest = leading.split_off(index);
                let trailing = rest.split_off(1);
                builder::root(&rest[0], leading, trailing)
            }
            _ => builder::error(leading, TextSize::new(0), StateId::START, false),
        };
        tracing::debug!(
            cost = version.error_cost,
            dynamic_precedence = version.dynamic_precedence,
            id = version.created,
            "accepted"
        );
        self.accepted.push((root, version.priority()));
    }

    fn fail(&mut self, version: Version, lookahead: &Lookahead) {
        tracing::trace!(
            symbol = self.language.symbol_name(lookahead.symbol()),
            position = u32::from(lookahead.start()),
            id = version.created,
            "no action"
        );
        let rank = |v: &Version| (Reverse(v.position), v.priority());
        let better = match &self.failed {
            Some((best, _)) => rank(&version) < rank(best),
            None => true,
        };
        if better {
            self.failed = Some((version, lookahead.clone()));
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        let limit = self.options.max_stack_depth;
        if depth > limit {
            tracing::debug!(limit, "stack depth exceeded");
            return Err(ParseError::CapacityExceeded { limit });
        }
        Ok(())
    }

    /// Merge versions with identical state stacks, then prune to the
    /// version limit.
    fn condense(&mut self) {
        let mut kept: Vec<Version> = Vec::with_capacity(self.versions.len());
        for version in self.versions.drain(..) {
            let twin = kept.iter().position(|other| {
                version.is_normal()
                    && other.is_normal()
                    && other.position == version.position
                    && other.lex_override == version.lex_override
                    && other.stack.same_states(&version.stack)
            });
            match twin {
                Some(index) => {
                    tracing::debug!(
                        kept = kept[index].created.min(version.created),
                        position = u32::from(version.position),
                        "merged versions"
                    );
                    if version.priority() < kept[index].priority() {
                        kept[index] = version;
                    }
                }
                None => kept.push(version),
            }
        }

        let limit = self.options.max_versions.max(1);
        if kept.len() > limit {
            kept.sort_by_key(Version::priority);
            tracing::debug!(pruned = kept.len() - limit, "pruned versions");
            kept.truncate(limit);
        }
        self.versions = kept;
    }

    fn finish(self) -> Node {
        let best = self
            .accepted
            .into_iter()
            .min_by_key(|(_, priority)| *priority)
            .map(|(root, _)| root);
        match best {
            Some(root) => root,
            None => {
                // Every version vanished, which only a malformed table allows.
                let text = self.lexer.text();
                let token = Token {
                    symbol: Symbol::ERROR,
                    range: TextRange::up_to(TextSize::new(text.len() as u32)),
                    examined_end: TextSize::new(text.len() as u32 + 1),
                    lex_mode: LexModeId::ANY,
                };
                Node::leaf(&token, StateId::START, false)
            }
        }
    }
}

#[cfg(test)]
mod tests;
