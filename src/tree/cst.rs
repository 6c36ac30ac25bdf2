//! Lossless export to `rowan` green trees.
//!
//! Every node becomes a rowan node and every token a rowan token, hidden
//! rules and extras included, so the exported tree round-trips the source
//! text. Repeat helpers are the exception: their items go straight into the
//! repeating node, so a long repetition stays flat. Kinds are the engine's
//! [`Symbol`]s.

use super::node::Node;
use crate::base::Symbol;
use crate::table::Language;
use rowan::{GreenNode, GreenNodeBuilder};

/// `rowan` language tag for exported trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CstLanguage {}

impl rowan::Language for CstLanguage {
    type Kind = Symbol;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        Symbol(raw.0)
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        rowan::SyntaxKind(kind.0)
    }
}

pub type CstNode = rowan::SyntaxNode<CstLanguage>;
pub type CstToken = rowan::SyntaxToken<CstLanguage>;
pub type CstElement = rowan::SyntaxElement<CstLanguage>;

pub(crate) fn build_green(root: &Node, text: &str, language: &Language) -> GreenNode {
    enum Step<'n> {
        Enter(&'n Node, usize),
        Exit,
    }
    let mut builder = GreenNodeBuilder::new();
    let kind = rowan::SyntaxKind(root.symbol().0);
    builder.start_node(kind);
    if root.is_token() {
        builder.token(kind, &text[..usize::from(root.len())]);
    } else {
        let mut pending = Vec::new();
        push_children(&mut pending, root, 0, Step::Enter);
        while let Some(step) = pending.pop() {
            let Step::Enter(node, offset) = step else {
                builder.finish_node();
                continue;
            };
            let kind = rowan::SyntaxKind(node.symbol().0);
            if node.is_token() {
                builder.token(kind, &text[offset..offset + usize::from(node.len())]);
                continue;
            }
            if !is_repeat_helper(node, language) {
                builder.start_node(kind);
                pending.push(Step::Exit);
            }
            push_children(&mut pending, node, offset, Step::Enter);
        }
    }
    builder.finish_node();
    builder.finish()
}

fn is_repeat_helper(node: &Node, language: &Language) -> bool {
    !node.is_error() && language.is_hidden(node.symbol()) && !language.is_named(node.symbol())
}

/// Queue `node`'s children so they pop in text order.
fn push_children<'n, T>(pending: &mut Vec<T>, node: &'n Node, offset: usize, step: impl Fn(&'n Node, usize) -> T) {
    let mut offsets = Vec::with_capacity(node.children().len());
    let mut child_offset = offset;
    for child in node.children() {
        offsets.push(child_offset);
        child_offset += usize::from(child.len());
    }
    pending.extend(node.children().iter().zip(offsets).rev().map(|(child, offset)| step(child, offset)));
}
