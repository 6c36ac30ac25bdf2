//! Concrete syntax trees.
//!
//! A [`SyntaxTree`] owns its root [`Node`], the source text and the
//! [`Language`] it was parsed with. Nodes store lengths rather than offsets
//! and are shared through `Arc`, so trees produced by incremental reparsing
//! share every reused subtree with the tree they came from.
//!
//! - [`NodeRef`] - positioned navigation (kinds, ranges, fields, S-expressions)
//! - [`EditedTree`] - a tree adjusted to text edits, input to reparsing
//! - [`CstNode`] - lossless `rowan` export

pub(crate) mod builder;
mod cst;
mod edit;
mod node;
mod view;

pub use cst::{CstElement, CstLanguage, CstNode, CstToken};
pub use edit::EditedTree;
pub use node::Node;
pub(crate) use node::{MISSING_COST, RECOVERY_COST, SKIPPED_TOKEN_COST};
pub use view::NodeRef;

use crate::base::{InputEdit, TextRange, TextSize};
use crate::table::Language;
use rowan::GreenNode;
use std::fmt;
use std::sync::Arc;

/// The result of a parse. Immutable; cheap to clone.
#[derive(Clone)]
pub struct SyntaxTree {
    root: Node,
    text: Arc<str>,
    language: Arc<Language>,
}

impl SyntaxTree {
    pub(crate) fn new(root: Node, text: Arc<str>, language: Arc<Language>) -> Self {
        debug_assert_eq!(usize::from(root.len()), text.len());
        Self { root, text, language }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_node(&self) -> NodeRef<'_> {
        NodeRef::root(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &Arc<Language> {
        &self.language
    }

    pub fn len(&self) -> TextSize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.root.has_error()
    }

    /// Maximal regions covered by `ERROR` nodes and missing tokens.
    pub fn error_ranges(&self) -> Vec<TextRange> {
        view::error_ranges(&self.root)
    }

    /// Adjust the tree to an edit of its text, for a later reparse.
    ///
    /// The tree itself is untouched; chain further edits on the result.
    pub fn edit(&self, edit: &InputEdit) -> EditedTree {
        EditedTree::new(self, edit)
    }

    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    pub fn to_green(&self) -> GreenNode {
        cst::build_green(&self.root, &self.text, &self.language)
    }

    pub fn to_cst(&self) -> CstNode {
        CstNode::new_root(self.to_green())
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("language", &self.language.name())
            .field("len", &self.len())
            .field("sexp", &self.to_sexp())
            .finish()
    }
}
