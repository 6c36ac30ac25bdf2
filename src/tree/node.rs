//! Immutable, reference-counted syntax nodes.

use crate::base::{LexModeId, RuleId, StateId, Symbol, TextSize};
use crate::lexer::Token;
use std::fmt;
use std::sync::Arc;

/// Cost of a token inserted by error recovery
pub(crate) const MISSING_COST: u32 = 110;
/// Cost of a token skipped by error recovery, plus one per byte
pub(crate) const SKIPPED_TOKEN_COST: u32 = 100;
/// Cost of wrapping subtrees into an `ERROR` node
pub(crate) const RECOVERY_COST: u32 = 500;

/// A node of the concrete syntax tree.
///
/// Nodes store lengths, not offsets, so an unchanged subtree can be shared
/// between a tree and every tree reparsed from it. Cloning is cheap.
#[derive(Clone)]
pub struct Node(pub(crate) Arc<NodeData>);

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub symbol: Symbol,
    pub len: TextSize,
    /// Bytes past the end the lexer examined while producing this node
    pub lookahead: TextSize,
    /// State below the node when it was pushed
    pub parse_state: StateId,
    /// Mode of the token that followed (or, for leaves, produced) the node
    pub lex_mode: LexModeId,
    pub rule: Option<RuleId>,
    pub flags: NodeFlags,
    pub error_cost: u32,
    pub dynamic_precedence: i32,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NodeFlags {
    pub extra: bool,
    pub missing: bool,
    pub has_error: bool,
    pub fragile: bool,
    pub damaged: bool,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Node(Arc::new(data))
    }

    /// A leaf for a lexed token.
    pub(crate) fn leaf(token: &Token, state: StateId, extra: bool) -> Self {
        let error = token.symbol.is_error();
        Node::new(NodeData {
            symbol: token.symbol,
            len: token.len(),
            lookahead: token.lookahead_bytes(),
            parse_state: state,
            lex_mode: token.lex_mode,
            rule: None,
            flags: NodeFlags {
                extra,
                has_error: error,
                ..NodeFlags::default()
            },
            error_cost: if error {
                SKIPPED_TOKEN_COST + u32::from(token.len())
            } else {
                0
            },
            dynamic_precedence: 0,
            children: Vec::new(),
        })
    }

    /// A zero-width token inserted by error recovery.
    pub(crate) fn missing(symbol: Symbol, state: StateId, lex_mode: LexModeId) -> Self {
        Node::new(NodeData {
            symbol,
            len: TextSize::new(0),
            lookahead: TextSize::new(0),
            parse_state: state,
            lex_mode,
            rule: None,
            flags: NodeFlags {
                missing: true,
                has_error: true,
                ..NodeFlags::default()
            },
            error_cost: MISSING_COST,
            dynamic_precedence: 0,
            children: Vec::new(),
        })
    }

    pub(crate) fn data(&self) -> &NodeData {
        &self.0
    }

    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    pub fn len(&self) -> TextSize {
        self.0.len
    }

    pub fn is_empty(&self) -> bool {
        self.0.len == TextSize::new(0)
    }

    /// Bytes past the node end that influenced it
    pub fn lookahead_bytes(&self) -> TextSize {
        self.0.lookahead
    }

    pub fn parse_state(&self) -> StateId {
        self.0.parse_state
    }

    pub fn lex_mode(&self) -> LexModeId {
        self.0.lex_mode
    }

    /// The rule that produced the node; `None` for tokens and `ERROR` nodes.
    pub fn rule(&self) -> Option<RuleId> {
        self.0.rule
    }

    pub fn children(&self) -> &[Node] {
        &self.0.children
    }

    /// Tokens, missing tokens included.
    pub fn is_token(&self) -> bool {
        self.0.rule.is_none() && self.0.children.is_empty() && !self.is_error_node()
    }

    /// An `ERROR` node wrapping skipped or popped subtrees (not an
    /// unrecognized-character token).
    pub fn is_error_node(&self) -> bool {
        self.0.symbol.is_error() && !self.0.children.is_empty()
    }

    pub fn is_error(&self) -> bool {
        self.0.symbol.is_error()
    }

    pub fn is_extra(&self) -> bool {
        self.0.flags.extra
    }

    pub fn is_missing(&self) -> bool {
        self.0.flags.missing
    }

    pub fn has_error(&self) -> bool {
        self.0.flags.has_error
    }

    pub fn is_fragile(&self) -> bool {
        self.0.flags.fragile
    }

    pub fn is_damaged(&self) -> bool {
        self.0.flags.damaged
    }

    pub fn error_cost(&self) -> u32 {
        self.0.error_cost
    }

    pub fn dynamic_precedence(&self) -> i32 {
        self.0.dynamic_precedence
    }

    /// Whether both handles point to the same allocation.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The first token of the subtree, skipping empty reductions.
    pub fn first_leaf(&self) -> Option<&Node> {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if node.is_token() {
                return Some(node);
            }
            pending.extend(node.children().iter().rev());
        }
        None
    }

    /// Same node with the `extra` flag set as requested; shares when unchanged.
    pub(crate) fn with_extra(&self, extra: bool) -> Node {
        if self.is_extra() == extra {
            return self.clone();
        }
        let mut data = NodeData::clone(&self.0);
        data.flags.extra = extra;
        Node::new(data)
    }

    /// Number of nodes in the subtree
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children());
        }
        count
    }
}

// Repetitions nest one level per item, so trees can be as deep as a file is
// long. Release unshared children iteratively.
impl Drop for NodeData {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(Node(data)) = pending.pop() {
            if let Ok(mut data) = Arc::try_unwrap(data) {
                pending.append(&mut data.children);
            }
        }
    }
}

/// Structural equality: symbols, lengths, `extra`/`missing` flags and
/// children. Parse metadata (states, lookahead, fragility, damage) is ignored.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((left, right)) = pending.pop() {
            if left.ptr_eq(right) {
                continue;
            }
            let (a, b) = (&*left.0, &*right.0);
            let same = a.symbol == b.symbol
                && a.len == b.len
                && a.flags.extra == b.flags.extra
                && a.flags.missing == b.flags.missing
                && a.children.len() == b.children.len();
            if !same {
                return false;
            }
            pending.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Eq for Node {}

/// `symbol@len` with flags, children in brackets: `#5@3[#1@1, #2@2 extra]`.
impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Step<'n> {
            Open(&'n Node, bool),
            Close,
        }
        let mut pending = vec![Step::Open(self, true)];
        while let Some(step) = pending.pop() {
            let Step::Open(node, first) = step else {
                f.write_str("]")?;
                continue;
            };
            if !first {
                f.write_str(", ")?;
            }
            let data = &*node.0;
            write!(f, "{}@{}", data.symbol, u32::from(data.len))?;
            if data.flags.extra {
                f.write_str(" extra")?;
            }
            if data.flags.missing {
                f.write_str(" missing")?;
            }
            if !data.children.is_empty() {
                f.write_str("[")?;
                pending.push(Step::Close);
                for (index, child) in data.children.iter().enumerate().rev() {
                    pending.push(Step::Open(child, index == 0));
                }
            }
        }
        Ok(())
    }
}
