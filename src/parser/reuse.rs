//! Walking an edited tree for reusable subtrees.

use super::{ParseError, Run, Version};
use crate::base::{LexModeId, TextSize};
use crate::table::ParseAction;
use crate::tree::Node;
use crate::tree::builder::Trigger;

impl Run<'_> {
    /// Push an undamaged subtree of the edited tree starting at the
    /// version's position, if one was built on the state the version reaches
    /// after the reductions its first token triggers.
    pub(super) fn reuse_node(&mut self, version: &Version) -> Result<Option<Version>, ParseError> {
        let language = self.language;
        let Some(cursor) = self.reuse.as_mut() else {
            return Ok(None);
        };
        let position = version.position;
        let candidates: Vec<Node> = cursor
            .nodes_at(position)
            .into_iter()
            .filter(|node| node.rule().is_some() && !node.is_fragile() && !node.has_error() && !node.is_damaged())
            .collect();
        let Some(first) = candidates.first().and_then(Node::first_leaf).cloned() else {
            return Ok(None);
        };
        let mode = self.lex_mode(version);
        if first.lex_mode() != mode || first.is_extra() || first.is_empty() {
            return Ok(None);
        }

        let trigger = Trigger {
            examined_end: position + first.len() + first.lookahead_bytes(),
            lex_mode: mode,
            inserted: false,
        };
        let mut prepared = version.clone();
        while let [ParseAction::Reduce(rule)] = language.actions(prepared.stack.state(), first.symbol()) {
            match self.reduce(prepared, *rule, trigger)? {
                Some(reduced) => prepared = reduced,
                None => return Ok(None),
            }
        }

        let state = prepared.stack.state();
        for node in candidates {
            if node.parse_state() != state {
                continue;
            }
            let Some(next) = language.goto(state, node.symbol()) else {
                continue;
            };
            self.check_depth(prepared.stack.depth() + 1)?;
            tracing::debug!(
                symbol = language.symbol_name(node.symbol()),
                start = u32::from(position),
                len = u32::from(node.len()),
                "reused subtree"
            );
            prepared.position += node.len();
            prepared.lex_override = Some(node.lex_mode());
            prepared.dynamic_precedence += node.dynamic_precedence();
            prepared.stack = prepared.stack.push(next, node);
            return Ok(Some(prepared));
        }
        Ok(None)
    }
}

/// Cursor over the nodes of an [`EditedTree`](crate::tree::EditedTree), in
/// the coordinates of the new text.
///
/// Queries are expected at non-decreasing positions; the cursor keeps the
/// path to the last position and resumes from there. A query behind the
/// previous one restarts from the root.
pub(crate) struct ReuseCursor {
    root: Node,
    /// Nodes containing the last queried position, outermost first
    path: Vec<(Node, TextSize)>,
    last: TextSize,
}

impl ReuseCursor {
    pub(crate) fn new(root: Node) -> Self {
        Self {
            root,
            path: Vec::new(),
            last: TextSize::new(0),
        }
    }

    /// Non-empty nodes starting exactly at `position`, outermost first.
    pub(crate) fn nodes_at(&mut self, position: TextSize) -> Vec<Node> {
        if position < self.last {
            self.path.clear();
        }
        self.last = position;

        while let Some((node, start)) = self.path.last() {
            if *start <= position && position < *start + node.len() {
                break;
            }
            self.path.pop();
        }
        if self.path.is_empty() {
            if position >= self.root.len() {
                return Vec::new();
            }
            self.path.push((self.root.clone(), TextSize::new(0)));
        }

        loop {
            let Some((node, start)) = self.path.last() else {
                break;
            };
            let mut offset = *start;
            let mut next = None;
            for child in node.children() {
                let end = offset + child.len();
                if offset > position {
                    break;
                }
                if !child.is_empty() && position < end {
                    next = Some((child.clone(), offset));
                    break;
                }
                offset = end;
            }
            match next {
                Some(entry) => self.path.push(entry),
                None => break,
            }
        }

        // starts only grow along the path, so the matches are a suffix
        let matching = self.path.iter().rev().take_while(|(_, start)| *start == position).count();
        self.path[self.path.len() - matching..]
            .iter()
            .map(|(node, _)| node.clone())
            .collect()
    }

    /// An undamaged token starting at `position` that was lexed in `mode`.
    pub(crate) fn token_at(&mut self, position: TextSize, mode: LexModeId) -> Option<Node> {
        let leaf = self.nodes_at(position).pop()?;
        let reusable =
            leaf.is_token() && !leaf.is_damaged() && !leaf.has_error() && !leaf.is_empty() && leaf.lex_mode() == mode;
        reusable.then_some(leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{RuleId, StateId, Symbol, TextRange};
    use crate::lexer::Token;
    use crate::tree::builder::{self, Trigger};
    use crate::table::{Assoc, RuleInfo};

    fn leaf(start: u32, end: u32) -> Node {
        let token = Token {
            symbol: Symbol(1),
            range: TextRange::new(start.into(), end.into()),
            examined_end: (end + 1).into(),
            lex_mode: LexModeId(3),
        };
        Node::leaf(&token, StateId::START, false)
    }

    fn branch(children: Vec<Node>, start: u32) -> Node {
        let info = RuleInfo {
            lhs: Symbol(9),
            child_count: children.len() as u16,
            precedence: 0,
            assoc: Assoc::None,
            fields: vec![None; children.len()],
        };
        let trigger = Trigger {
            examined_end: TextSize::new(0),
            lex_mode: LexModeId(3),
            inserted: false,
        };
        builder::reduce(RuleId(0), &info, children, start.into(), StateId::START, trigger, TextSize::new(0))
    }

    #[test]
    fn test_nodes_at_lists_outermost_first() {
        // ((a b) c)
        let inner = branch(vec![leaf(0, 1), leaf(1, 3)], 0);
        let root = branch(vec![inner.clone(), leaf(3, 4)], 0);
        let mut cursor = ReuseCursor::new(root.clone());

        let at_zero = cursor.nodes_at(TextSize::new(0));
        assert_eq!(at_zero.len(), 3);
        assert!(at_zero[0].ptr_eq(&root));
        assert!(at_zero[1].ptr_eq(&inner));

        assert_eq!(cursor.nodes_at(TextSize::new(2)).len(), 0, "inside a token");
        let at_three = cursor.nodes_at(TextSize::new(3));
        assert_eq!(at_three.len(), 1);
        assert!(cursor.nodes_at(TextSize::new(4)).is_empty());
        // going back restarts from the root
        assert_eq!(cursor.nodes_at(TextSize::new(1)).len(), 1);
    }

    #[test]
    fn test_zero_width_nodes_are_skipped() {
        let empty = branch(Vec::new(), 0);
        let root = branch(vec![empty, leaf(0, 2)], 0);
        let mut cursor = ReuseCursor::new(root);
        let nodes = cursor.nodes_at(TextSize::new(0));
        assert_eq!(nodes.len(), 2);
        assert!(nodes[1].is_token());
    }

    #[test]
    fn test_token_at_checks_lex_mode() {
        let root = branch(vec![leaf(0, 1), leaf(1, 2)], 0);
        let mut cursor = ReuseCursor::new(root);
        assert!(cursor.token_at(TextSize::new(1), LexModeId(3)).is_some());
        assert!(cursor.token_at(TextSize::new(1), LexModeId(4)).is_none());
    }
}
