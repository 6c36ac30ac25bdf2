//! Applying text edits to a tree.

use super::node::{Node, NodeData};
use super::SyntaxTree;
use crate::base::{InputEdit, TextSize};
use crate::table::Language;
use std::sync::Arc;

/// A tree whose nodes were adjusted to an edited text, ready for
/// [`Parser::reparse`](crate::parser::Parser::reparse).
///
/// Nodes whose examined bytes intersect an edit are copied, resized and
/// marked damaged; every other node is shared with the original tree.
#[derive(Clone)]
pub struct EditedTree {
    root: Node,
    language: Arc<Language>,
    edits: Vec<InputEdit>,
}

impl EditedTree {
    pub(crate) fn new(tree: &SyntaxTree, edit: &InputEdit) -> Self {
        Self {
            root: tree.root().clone(),
            language: tree.language().clone(),
            edits: Vec::new(),
        }
        .edit(edit)
    }

    /// Apply a further edit, expressed in the coordinates of the text after
    /// the edits applied so far.
    pub fn edit(mut self, edit: &InputEdit) -> Self {
        self.root = edit_node(&self.root, TextSize::new(0), edit);
        self.edits.push(*edit);
        self
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn language(&self) -> &Arc<Language> {
        &self.language
    }

    pub fn edits(&self) -> &[InputEdit] {
        &self.edits
    }
}

impl std::fmt::Debug for EditedTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditedTree")
            .field("edits", &self.edits)
            .field("root", &self.root)
            .finish()
    }
}

enum Step<'n> {
    Visit(&'n Node, TextSize),
    /// Rebuild a damaged node from its edited children, the last results
    Rebuild(&'n Node, TextSize),
}

fn edit_node(root: &Node, start: TextSize, edit: &InputEdit) -> Node {
    let mut pending = vec![Step::Visit(root, start)];
    let mut results: Vec<Node> = Vec::new();
    while let Some(step) = pending.pop() {
        match step {
            Step::Visit(node, start) => {
                let end = start + node.len();
                let resized = new_len(start, end, edit) != node.len();
                if !resized && !edit.touches(start, end + node.lookahead_bytes()) {
                    results.push(node.clone());
                    continue;
                }
                pending.push(Step::Rebuild(node, start));
                let mut offsets = Vec::with_capacity(node.children().len());
                let mut offset = start;
                for child in node.children() {
                    offsets.push(offset);
                    offset += child.len();
                }
                for (child, offset) in node.children().iter().zip(offsets).rev() {
                    pending.push(Step::Visit(child, offset));
                }
            }
            Step::Rebuild(node, start) => {
                let mut data = NodeData::clone(node.data());
                data.len = new_len(start, start + node.len(), edit);
                data.flags.damaged = true;
                data.children = results.split_off(results.len() - node.children().len());
                results.push(Node::new(data));
            }
        }
    }
    results.pop().unwrap_or_else(|| root.clone())
}

fn new_len(start: TextSize, end: TextSize, edit: &InputEdit) -> TextSize {
    edit.map_offset(end) - edit.map_offset(start)
}
