//! Node construction for reductions, error recovery and accept.

use super::node::{Node, NodeData, NodeFlags, RECOVERY_COST};
use crate::base::{LexModeId, RuleId, StateId, Symbol, TextSize};
use crate::table::RuleInfo;

/// The lookahead that triggered a reduction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trigger {
    /// Absolute end of the bytes examined to lex the lookahead
    pub examined_end: TextSize,
    pub lex_mode: LexModeId,
    /// Reducing for a missing token rather than for the lexed lookahead
    pub inserted: bool,
}

/// Bytes examined past the end of a node starting at `start` and made of
/// `children`, given bytes the caller also examined up to `examined_end`.
fn lookahead_of(start: TextSize, len: TextSize, children: &[Node], examined_end: TextSize) -> TextSize {
    let mut offset = start;
    let mut furthest = examined_end;
    for child in children {
        furthest = furthest.max(offset + child.len() + child.lookahead_bytes());
        offset += child.len();
    }
    furthest.checked_sub(start + len).unwrap_or_default()
}

/// Build the node for `rule` over `children`, which start at `start`.
///
/// `ambiguous_until` is the furthest byte examined while several stack
/// versions were alive; a node starting before it is fragile. So is a node
/// reduced for an inserted token, which the lookahead alone would not build.
pub(crate) fn reduce(
    rule: RuleId,
    info: &RuleInfo,
    children: Vec<Node>,
    start: TextSize,
    state: StateId,
    trigger: Trigger,
    ambiguous_until: TextSize,
) -> Node {
    let len: TextSize = children.iter().map(Node::len).sum();
    let has_error = children.iter().any(Node::has_error);
    let dynamic_precedence = info.precedence + children.iter().map(Node::dynamic_precedence).sum::<i32>();
    Node::new(NodeData {
        symbol: info.lhs,
        len,
        lookahead: lookahead_of(start, len, &children, trigger.examined_end),
        parse_state: state,
        lex_mode: trigger.lex_mode,
        rule: Some(rule),
        flags: NodeFlags {
            has_error,
            fragile: has_error || trigger.inserted || start < ambiguous_until,
            ..NodeFlags::default()
        },
        error_cost: children.iter().map(Node::error_cost).sum(),
        dynamic_precedence,
        children,
    })
}

/// Wrap popped or skipped subtrees into an `ERROR` node.
pub(crate) fn error(children: Vec<Node>, start: TextSize, state: StateId, extra: bool) -> Node {
    let len: TextSize = children.iter().map(Node::len).sum();
    let lex_mode = children.last().map_or(LexModeId::ANY, Node::lex_mode);
    Node::new(NodeData {
        symbol: Symbol::ERROR,
        len,
        lookahead: lookahead_of(start, len, &children, start + len),
        parse_state: state,
        lex_mode,
        rule: None,
        flags: NodeFlags {
            extra,
            has_error: true,
            fragile: true,
            ..NodeFlags::default()
        },
        error_cost: RECOVERY_COST + children.iter().map(Node::error_cost).sum::<u32>(),
        dynamic_precedence: 0,
        children,
    })
}

/// Fold the extras around the accepted start node into it, so the root
/// spans the whole text. Without extras the node itself is the root.
pub(crate) fn root(node: &Node, leading: Vec<Node>, trailing: Vec<Node>) -> Node {
    if leading.is_empty() && trailing.is_empty() {
        return node.clone();
    }
    let mut data = NodeData::clone(node.data());
    let leading_len: TextSize = leading.iter().map(Node::len).sum();
    let trailing_len: TextSize = trailing.iter().map(Node::len).sum();
    let has_error = node.has_error() || leading.iter().chain(&trailing).any(Node::has_error);
    let extra_cost: u32 = leading.iter().chain(&trailing).map(Node::error_cost).sum();

    let mut children = leading;
    children.extend(data.children.iter().cloned());
    children.extend(trailing);
    let trailing_lookahead = children.last().map_or(TextSize::new(0), Node::lookahead_bytes);

    data.len = leading_len + data.len + trailing_len;
    data.lookahead = if trailing_len > TextSize::new(0) {
        trailing_lookahead
    } else {
        data.lookahead
    };
    data.flags.has_error = has_error;
    data.flags.fragile |= has_error;
    data.error_cost += extra_cost;
    data.children = children;
    Node::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::TextRange;
    use crate::lexer::Token;
    use crate::table::Assoc;

    fn leaf(symbol: u16, start: u32, end: u32, examined: u32) -> Node {
        let token = Token {
            symbol: Symbol(symbol),
            range: TextRange::new(start.into(), end.into()),
            examined_end: examined.into(),
            lex_mode: LexModeId(1),
        };
        Node::leaf(&token, StateId::START, false)
    }

    fn ts(n: u32) -> TextSize {
        TextSize::new(n)
    }

    fn info(child_count: u16, precedence: i32) -> RuleInfo {
        RuleInfo {
            lhs: Symbol(5),
            child_count,
            precedence,
            assoc: Assoc::None,
            fields: vec![None; child_count as usize],
        }
    }

    fn trigger(examined_end: u32) -> Trigger {
        Trigger {
            examined_end: examined_end.into(),
            lex_mode: LexModeId(2),
            inserted: false,
        }
    }

    #[test]
    fn test_reduce_sums_lengths_and_extents() {
        let children = vec![leaf(1, 2, 4, 7), leaf(2, 4, 5, 6)];
        let node = reduce(RuleId(0), &info(2, 3), children, ts(2), StateId(4), trigger(6), ts(0));
        assert_eq!(node.len(), TextSize::new(3));
        // first child looked up to byte 7
        assert_eq!(node.lookahead_bytes(), TextSize::new(2));
        assert_eq!(node.parse_state(), StateId(4));
        assert_eq!(node.lex_mode(), LexModeId(2));
        assert_eq!(node.dynamic_precedence(), 3);
        assert!(!node.is_fragile());
    }

    #[test]
    fn test_trigger_extends_lookahead() {
        let node = reduce(RuleId(0), &info(1, 0), vec![leaf(1, 0, 1, 2)], ts(0), StateId(0), trigger(9), ts(0));
        assert_eq!(node.lookahead_bytes(), TextSize::new(8));
    }

    #[test]
    fn test_empty_reduction_and_fragility() {
        let node = reduce(RuleId(1), &info(0, 0), Vec::new(), ts(3), StateId(0), trigger(4), ts(5));
        assert!(node.is_empty());
        assert!(node.is_fragile(), "built before the end of an ambiguous region");
        assert_eq!(node.lookahead_bytes(), TextSize::new(1));
    }

    #[test]
    fn test_reduction_for_inserted_token_is_fragile() {
        let inserted = Trigger {
            inserted: true,
            ..trigger(2)
        };
        let node = reduce(RuleId(0), &info(1, 0), vec![leaf(1, 0, 1, 2)], ts(0), StateId(0), inserted, ts(0));
        assert!(node.is_fragile());
        assert!(!node.has_error());
    }

    #[test]
    fn test_error_node_propagates() {
        let error = error(vec![leaf(1, 0, 1, 2)], ts(0), StateId(0), true);
        assert!(error.is_error_node() && error.is_extra() && error.has_error());
        let parent = reduce(RuleId(0), &info(0, 0), vec![error], ts(0), StateId(0), trigger(1), ts(0));
        assert!(parent.has_error() && parent.is_fragile());
        assert!(parent.error_cost() >= RECOVERY_COST);
    }

    #[test]
    fn test_root_folds_extras() {
        let body = reduce(RuleId(0), &info(1, 0), vec![leaf(1, 1, 2, 3)], ts(1), StateId(0), trigger(3), ts(0));
        assert!(root(&body, Vec::new(), Vec::new()).ptr_eq(&body));

        let space = leaf(3, 0, 1, 1).with_extra(true);
        let folded = root(&body, vec![space], vec![leaf(3, 2, 4, 5).with_extra(true)]);
        assert_eq!(folded.len(), TextSize::new(4));
        assert_eq!(folded.children().len(), 3);
        assert_eq!(folded.symbol(), body.symbol());
        assert_eq!(folded.lookahead_bytes(), TextSize::new(1));
    }
}
