//! Positioned, read-only navigation over a [`SyntaxTree`].
//!
//! The view hides grammar plumbing: hidden rules (`_name`) and repeat
//! helpers are spliced into their parent, hidden tokens are skipped, and
//! field names declared on a hidden rule's children surface on the visible
//! node that contains them.

use super::node::Node;
use super::SyntaxTree;
use crate::base::{FieldId, Symbol, TextRange, TextSize};
use std::fmt::{self, Write};

/// A node together with its absolute position in a tree.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SyntaxTree,
    node: &'t Node,
    offset: TextSize,
    field: Option<FieldId>,
}

impl<'t> NodeRef<'t> {
    pub(crate) fn root(tree: &'t SyntaxTree) -> Self {
        Self {
            tree,
            node: tree.root(),
            offset: TextSize::new(0),
            field: None,
        }
    }

    pub fn node(&self) -> &'t Node {
        self.node
    }

    pub fn symbol(&self) -> Symbol {
        self.node.symbol()
    }

    /// Rule or token name; `ERROR` for error nodes.
    pub fn kind(&self) -> &'t str {
        self.tree.language().symbol_name(self.node.symbol())
    }

    /// Named nodes come from named rules. Unrecognized characters are
    /// anonymous, `ERROR` nodes are named.
    pub fn is_named(&self) -> bool {
        if self.node.is_error() {
            return self.node.is_error_node();
        }
        self.tree.language().is_named(self.node.symbol())
    }

    pub fn is_extra(&self) -> bool {
        self.node.is_extra()
    }

    pub fn is_missing(&self) -> bool {
        self.node.is_missing()
    }

    pub fn is_error(&self) -> bool {
        self.node.is_error()
    }

    pub fn has_error(&self) -> bool {
        self.node.has_error()
    }

    pub fn range(&self) -> TextRange {
        TextRange::at(self.offset, self.node.len())
    }

    pub fn start(&self) -> TextSize {
        self.offset
    }

    pub fn end(&self) -> TextSize {
        self.offset + self.node.len()
    }

    pub fn text(&self) -> &'t str {
        &self.tree.text()[self.range()]
    }

    /// Field this node fills in its parent, if any.
    pub fn field_name(&self) -> Option<&'t str> {
        self.field.and_then(|f| self.tree.language().field_name(f))
    }

    /// Visible children, anonymous tokens included.
    pub fn children(&self) -> Vec<NodeRef<'t>> {
        let mut out = Vec::new();
        self.collect_children(self.node, self.offset, None, &mut out);
        out
    }

    pub fn named_children(&self) -> Vec<NodeRef<'t>> {
        self.children().into_iter().filter(NodeRef::is_named).collect()
    }

    pub fn child(&self, index: usize) -> Option<NodeRef<'t>> {
        self.children().into_iter().nth(index)
    }

    pub fn named_child(&self, index: usize) -> Option<NodeRef<'t>> {
        self.named_children().into_iter().nth(index)
    }

    pub fn child_by_field_name(&self, name: &str) -> Option<NodeRef<'t>> {
        self.children_by_field_name(name).into_iter().next()
    }

    pub fn children_by_field_name(&self, name: &str) -> Vec<NodeRef<'t>> {
        let Some(field) = self.tree.language().field_id(name) else {
            return Vec::new();
        };
        self.children().into_iter().filter(|c| c.field == Some(field)).collect()
    }

    /// Innermost visible node covering `range`.
    pub fn descendant_for_range(&self, range: TextRange) -> NodeRef<'t> {
        let mut current = *self;
        'descend: loop {
            for child in current.children() {
                if child.range().contains_range(range) && !child.range().is_empty() {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    fn collect_children(
        &self,
        node: &'t Node,
        offset: TextSize,
        inherited: Option<FieldId>,
        out: &mut Vec<NodeRef<'t>>,
    ) {
        let language = self.tree.language();
        // hidden nodes being spliced, innermost last
        let mut levels = vec![Splice::new(node, offset, inherited)];
        while let Some(level) = levels.last_mut() {
            let parent: &'t Node = level.node;
            let Some(child) = parent.children().get(level.index) else {
                levels.pop();
                continue;
            };
            level.index += 1;
            let start = level.offset;
            level.offset += child.len();
            let own = if child.is_extra() {
                None
            } else {
                let rule = parent.rule().map(|r| language.rule(r));
                let field = rule.and_then(|r| r.fields.get(level.structural).copied().flatten());
                level.structural += 1;
                field
            };
            let field = own.or(level.inherited);

            if !child.is_error() && language.is_hidden(child.symbol()) {
                if !child.is_token() {
                    levels.push(Splice::new(child, start, field));
                }
                continue;
            }
            out.push(NodeRef {
                tree: self.tree,
                node: child,
                offset: start,
                field,
            });
        }
    }

    /// S-expression of the named structure, with field labels:
    /// `(assignment left: (identifier) right: (number))`.
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out, true);
        out
    }

    fn write_sexp(&self, out: &mut String, top: bool) {
        enum Step<'v> {
            Open(NodeRef<'v>, bool),
            Close,
        }
        let mut pending = vec![Step::Open(*self, top)];
        while let Some(step) = pending.pop() {
            let Step::Open(node, top) = step else {
                out.push(')');
                continue;
            };
            let visible = node.is_named() || node.is_missing();
            if visible {
                if !top {
                    out.push(' ');
                }
                if let Some(field) = node.field_name().filter(|_| !top) {
                    let _ = write!(out, "{field}: ");
                }
                if node.is_missing() {
                    if node.is_named() {
                        let _ = write!(out, "(MISSING {})", node.kind());
                    } else {
                        let _ = write!(out, "(MISSING \"{}\")", node.kind().escape_default());
                    }
                    continue;
                }
                let _ = write!(out, "({}", node.kind());
                pending.push(Step::Close);
            }
            let children_top = top && !visible;
            pending.extend(node.children().into_iter().rev().map(|child| Step::Open(child, children_top)));
        }
    }
}

/// A node whose children are being listed in place of the node itself.
struct Splice<'t> {
    node: &'t Node,
    index: usize,
    offset: TextSize,
    structural: usize,
    inherited: Option<FieldId>,
}

impl<'t> Splice<'t> {
    fn new(node: &'t Node, offset: TextSize, inherited: Option<FieldId>) -> Self {
        Self {
            node,
            index: 0,
            offset,
            structural: 0,
            inherited,
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.node.ptr_eq(other.node) && self.offset == other.offset
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.kind(), self.range())
    }
}

/// Ranges of `ERROR` nodes and missing tokens, merged where they overlap or
/// touch, in text order.
pub(crate) fn error_ranges(root: &Node) -> Vec<TextRange> {
    let mut ranges = Vec::new();
    collect_errors(root, TextSize::new(0), &mut ranges);

    let mut merged: Vec<TextRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start() <= last.end() => *last = last.cover(range),
            _ => merged.push(range),
        }
    }
    merged
}

fn collect_errors(root: &Node, offset: TextSize, out: &mut Vec<TextRange>) {
    let mut pending = vec![(root, offset)];
    while let Some((node, offset)) = pending.pop() {
        if !node.has_error() {
            continue;
        }
        if node.is_error() || node.is_missing() {
            out.push(TextRange::at(offset, node.len()));
            continue;
        }
        let mut children = Vec::with_capacity(node.children().len());
        let mut child_offset = offset;
        for child in node.children() {
            children.push((child, child_offset));
            child_offset += child.len();
        }
        pending.extend(children.into_iter().rev());
    }
}
