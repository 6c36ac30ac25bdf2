//! Error recovery.
//!
//! Runs once every version has failed on a lookahead. In order, recovery
//! tries to:
//!
//! 1. insert one zero-width missing terminal that makes the lookahead
//!    acceptable;
//! 2. if the lookahead is an anchor, pop frames until a state accepts it,
//!    wrapping the popped subtrees into an `ERROR` extra;
//! 3. skip the lookahead, entering the recovering mode.
//!
//! While recovering, tokens are skipped until one is acceptable again (the
//! skipped tokens become one `ERROR` extra) or an anchor allows a resync.
//! At the end of input everything left is wrapped into an `ERROR` root.
//! Each position is tried for insertion and resync at most once, so
//! recovery always terminates.

use super::stack::Stack;
use super::{Lookahead, Mode, ParseError, Run, Version};
use crate::base::{StateId, Symbol, TextSize};
use crate::table::ParseAction;
use crate::tree::builder::{self, Trigger};
use crate::tree::{MISSING_COST, Node, RECOVERY_COST, SKIPPED_TOKEN_COST};

/// Bound on reductions tried while simulating a single symbol
const SIMULATION_LIMIT: usize = 1024;

impl Run<'_> {
    pub(super) fn recover(&mut self, version: Version, lookahead: &Lookahead) -> Result<(), ParseError> {
        let mut out = Vec::new();
        if !version.is_normal() {
            self.advance_recovering(version, lookahead, &mut out)?;
            self.versions.extend(out);
            return Ok(());
        }

        let start = lookahead.start();
        tracing::debug!(
            symbol = self.language.symbol_name(lookahead.symbol()),
            position = u32::from(start),
            "syntax error"
        );

        if version.missing_at != Some(start) {
            let (base, trailing) = version.stack.split_trailing_extras();
            if let Some(repaired) = self.insert_missing(&version, base, trailing, lookahead)? {
                self.advance(repaired, lookahead, &mut out)?;
                self.versions.extend(out);
                return Ok(());
            }
        }

        if self.language.is_anchor(lookahead.symbol()) && version.anchor_at != Some(start) {
            if let Some(resynced) = self.pop_to_anchor(&version, Vec::new(), lookahead) {
                self.advance(resynced, lookahead, &mut out)?;
                self.versions.extend(out);
                return Ok(());
            }
        }

        if lookahead.symbol().is_end() {
            self.accept_error(version, Vec::new());
            return Ok(());
        }

        let skipping = self.skip(version, lookahead, Vec::new());
        self.versions.push(skipping);
        Ok(())
    }

    pub(super) fn advance_recovering(
        &mut self,
        mut version: Version,
        lookahead: &Lookahead,
        out: &mut Vec<Version>,
    ) -> Result<(), ParseError> {
        let Mode::Recovering { skipped } = std::mem::replace(&mut version.mode, Mode::Normal) else {
            return self.advance(version, lookahead, out);
        };
        let symbol = lookahead.symbol();
        let language = self.language;

        if !language.is_extra(symbol) && self.simulate(&version.stack, &[symbol]) {
            let (stack, trailing) = flush(&version.stack, skipped);
            let mut resumed = version;
            resumed.stack = push_extras(stack, trailing);
            resumed.error_cost += RECOVERY_COST;
            tracing::debug!(position = u32::from(lookahead.start()), "resumed after skipping");
            return self.advance(resumed, lookahead, out);
        }

        if language.is_anchor(symbol) {
            let start = lookahead.start();
            if version.anchor_at != Some(start) {
                if let Some(resynced) = self.pop_to_anchor(&version, skipped.clone(), lookahead) {
                    return self.advance(resynced, lookahead, out);
                }
            }
            if version.missing_at != Some(start) {
                let (base, trailing) = flush(&version.stack, skipped.clone());
                let mut flushed = version.clone();
                flushed.error_cost += RECOVERY_COST;
                if let Some(repaired) = self.insert_missing(&flushed, base, trailing, lookahead)? {
                    return self.advance(repaired, lookahead, out);
                }
            }
        }

        if symbol.is_end() {
            self.accept_error(version, skipped);
            return Ok(());
        }
        out.push(self.skip(version, lookahead, skipped));
        Ok(())
    }

    /// Insert the first expected terminal after which the lookahead is
    /// acceptable. The missing token goes on `base`, before `trailing`.
    fn insert_missing(
        &self,
        version: &Version,
        base: Stack,
        trailing: Vec<Node>,
        lookahead: &Lookahead,
    ) -> Result<Option<Version>, ParseError> {
        let language = self.language;
        let symbol = lookahead.symbol();
        let Some(missing) = language
            .expected_terminals(base.state())
            .filter(|terminal| !terminal.is_end())
            .find(|&terminal| self.simulate(&base, &[terminal, symbol]))
        else {
            return Ok(None);
        };

        let mut repaired = Version {
            stack: base,
            mode: Mode::Normal,
            ..version.clone()
        };
        let trigger = Trigger {
            inserted: true,
            ..lookahead.trigger()
        };
        loop {
            match language.actions(repaired.stack.state(), missing).first() {
                Some(&ParseAction::Reduce(rule)) => match self.reduce(repaired, rule, trigger)? {
                    Some(reduced) => repaired = reduced,
                    None => return Ok(None),
                },
                Some(&ParseAction::Shift(next)) => {
                    self.check_depth(repaired.stack.depth() + 1 + trailing.len())?;
                    let node = Node::missing(missing, repaired.stack.state(), lookahead.token.lex_mode);
                    repaired.stack = push_extras(repaired.stack.push(next, node), trailing);
                    break;
                }
                _ => return Ok(None),
            }
        }

        tracing::debug!(
            symbol = language.symbol_name(missing),
            position = u32::from(lookahead.start()),
            "inserted missing token"
        );
        repaired.missing_at = Some(lookahead.start());
        repaired.error_cost += MISSING_COST;
        Ok(Some(repaired))
    }

    /// Pop frames until the top state accepts the anchor lookahead. Popped
    /// subtrees and `skipped` become one `ERROR` extra.
    fn pop_to_anchor(&self, version: &Version, skipped: Vec<Node>, lookahead: &Lookahead) -> Option<Version> {
        let symbol = lookahead.symbol();
        let (mut stack, body, trailing) = if skipped.is_empty() {
            let (stack, trailing) = version.stack.split_trailing_extras();
            (stack, Vec::new(), trailing)
        } else {
            let (body, trailing) = split_extras(skipped);
            (version.stack.clone(), body, trailing)
        };

        let mut popped = Vec::new();
        loop {
            let (node, below) = stack.pop()?;
            popped.push(node);
            stack = below;
            if self.simulate(&stack, &[symbol]) {
                break;
            }
        }
        popped.reverse();
        let frames = popped.len();
        popped.extend(body);

        let error = builder::error(popped, stack.position(), stack.state(), true);
        tracing::debug!(
            symbol = self.language.symbol_name(symbol),
            frames,
            start = u32::from(stack.position()),
            len = u32::from(error.len()),
            "resynchronized on anchor"
        );
        Some(Version {
            stack: push_extras(stack.push_extra(error), trailing),
            mode: Mode::Normal,
            error_cost: version.error_cost + RECOVERY_COST,
            anchor_at: Some(lookahead.start()),
            ..version.clone()
        })
    }

    fn skip(&self, mut version: Version, lookahead: &Lookahead, mut skipped: Vec<Node>) -> Version {
        let extra = self.language.is_extra(lookahead.symbol());
        if !extra {
            version.error_cost += SKIPPED_TOKEN_COST + u32::from(lookahead.token.len());
            tracing::trace!(
                symbol = self.language.symbol_name(lookahead.symbol()),
                position = u32::from(lookahead.start()),
                "skipped token"
            );
        }
        skipped.push(lookahead.node(version.stack.state(), extra));
        version.position = lookahead.end();
        version.mode = Mode::Recovering { skipped };
        version
    }

    /// Wrap the whole stack and the skipped tokens into an `ERROR` root.
    fn accept_error(&mut self, mut version: Version, skipped: Vec<Node>) {
        let mut children = version.stack.nodes();
        children.extend(skipped);
        let root = builder::error(children, TextSize::new(0), StateId::START, false);
        version.error_cost += RECOVERY_COST;
        tracing::debug!(len = u32::from(root.len()), "wrapped input into an error root");
        self.accepted.push((root, version.priority()));
    }

    /// Whether `symbols` can be consumed in order from `stack`, following the
    /// preferred action of each cell. Builds no nodes.
    pub(super) fn simulate(&self, stack: &Stack, symbols: &[Symbol]) -> bool {
        let language = self.language;
        let mut cursor = stack.states();
        for &symbol in symbols {
            let mut reductions = 0;
            loop {
                match language.actions(cursor.state(), symbol).first() {
                    Some(&ParseAction::Shift(next)) => {
                        cursor.push(next);
                        break;
                    }
                    Some(&ParseAction::Reduce(rule)) => {
                        reductions += 1;
                        if reductions > SIMULATION_LIMIT {
                            return false;
                        }
                        let info = language.rule(rule);
                        if !cursor.pop(usize::from(info.child_count)) {
                            return false;
                        }
                        match language.goto(cursor.state(), info.lhs) {
                            Some(next) => cursor.push(next),
                            None => return false,
                        }
                    }
                    Some(ParseAction::Accept) => return true,
                    None => return false,
                }
            }
        }
        true
    }
}

/// Push skipped tokens as one `ERROR` extra. Returns the new stack and the
/// extras that trailed the last skipped token, still to be pushed.
fn flush(stack: &Stack, skipped: Vec<Node>) -> (Stack, Vec<Node>) {
    let (body, trailing) = split_extras(skipped);
    if body.is_empty() {
        return (push_extras(stack.clone(), trailing), Vec::new());
    }
    let error = builder::error(body, stack.position(), stack.state(), true);
    (stack.push_extra(error), trailing)
}

/// Split trailing extras off a token list.
fn split_extras(mut nodes: Vec<Node>) -> (Vec<Node>, Vec<Node>) {
    let split = nodes.iter().rposition(|node| !node.is_extra()).map_or(0, |index| index + 1);
    let trailing = nodes.split_off(split);
    (nodes, trailing)
}

fn push_extras(mut stack: Stack, extras: Vec<Node>) -> Stack {
    for extra in extras {
        stack = stack.push_extra(extra);
    }
    stack
}
