//! Persistent parse stacks.
//!
//! A stack is a linked list of immutable frames; pushing allocates one frame
//! and shares everything below it, so forking a GLR version is a pointer
//! copy and forks share their common prefix.

use crate::base::{StateId, TextSize};
use crate::tree::Node;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Frame {
    state: StateId,
    /// `None` only for the bottom frame
    node: Option<Node>,
    /// End offset of everything up to and including this frame
    position: TextSize,
    depth: usize,
    below: Option<Arc<Frame>>,
}

impl Frame {
    fn is_extra(&self) -> bool {
        self.node.as_ref().is_some_and(Node::is_extra)
    }
}

// Unlink iteratively; deep stacks would otherwise recurse once per frame.
impl Drop for Frame {
    fn drop(&mut self) {
        let mut below = self.below.take();
        while let Some(frame) = below {
            match Arc::try_unwrap(frame) {
                Ok(mut frame) => below = frame.below.take(),
                Err(_) => break,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Stack {
    top: Arc<Frame>,
}

/// Children popped for a reduction.
pub(crate) struct Popped {
    pub children: Vec<Node>,
    /// Extras that were above the last child, in text order
    pub trailing: Vec<Node>,
    pub rest: Stack,
}

impl Stack {
    pub(crate) fn new() -> Self {
        Self {
            top: Arc::new(Frame {
                state: StateId::START,
                node: None,
                position: TextSize::new(0),
                depth: 0,
                below: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> StateId {
        self.top.state
    }

    pub(crate) fn position(&self) -> TextSize {
        self.top.position
    }

    /// Frames above the bottom one
    pub(crate) fn depth(&self) -> usize {
        self.top.depth
    }

    pub(crate) fn push(&self, state: StateId, node: Node) -> Stack {
        Stack {
            top: Arc::new(Frame {
                state,
                position: self.top.position + node.len(),
                node: Some(node),
                depth: self.top.depth + 1,
                below: Some(self.top.clone()),
            }),
        }
    }

    /// Push an extra; the state does not change.
    pub(crate) fn push_extra(&self, node: Node) -> Stack {
        self.push(self.state(), node)
    }

    /// Pop the top frame; `None` at the bottom.
    pub(crate) fn pop(&self) -> Option<(Node, Stack)> {
        let node = self.top.node.clone()?;
        let below = self.top.below.clone()?;
        Some((node, Stack { top: below }))
    }

    /// Pop `count` non-extra frames and the extras between them.
    ///
    /// Returns `None` when the stack is too shallow, which only a malformed
    /// table can cause.
    pub(crate) fn pop_children(&self, count: usize) -> Option<Popped> {
        let mut stack = self.clone();
        let mut trailing = Vec::new();
        while stack.top.is_extra() {
            let (node, below) = stack.pop()?;
            trailing.push(node);
            stack = below;
        }
        let mut children = Vec::with_capacity(count);
        let mut remaining = count;
        while remaining > 0 {
            let (node, below) = stack.pop()?;
            if !node.is_extra() {
                remaining -= 1;
            }
            children.push(node);
            stack = below;
        }
        children.reverse();
        trailing.reverse();
        Some(Popped {
            children,
            trailing,
            rest: stack,
        })
    }

    /// Split the extras on top of the stack off, in text order.
    pub(crate) fn split_trailing_extras(&self) -> (Stack, Vec<Node>) {
        let mut stack = self.clone();
        let mut trailing = Vec::new();
        while stack.top.is_extra() {
            let Some((node, below)) = stack.pop() else {
                break;
            };
            trailing.push(node);
            stack = below;
        }
        trailing.reverse();
        (stack, trailing)
    }

    /// All nodes from bottom to top
    pub(crate) fn nodes(&self) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(self.depth());
        let mut frame = Some(&self.top);
        while let Some(current) = frame {
            if let Some(node) = &current.node {
                nodes.push(node.clone());
            }
            frame = current.below.as_ref();
        }
        nodes.reverse();
        nodes
    }

    /// Whether both stacks hold the same states, frame by frame.
    pub(crate) fn same_states(&self, other: &Stack) -> bool {
        let (mut a, mut b) = (&self.top, &other.top);
        loop {
            if Arc::ptr_eq(a, b) {
                return true;
            }
            if a.state != b.state || a.depth != b.depth || a.position != b.position {
                return false;
            }
            match (&a.below, &b.below) {
                (Some(x), Some(y)) => {
                    a = x;
                    b = y;
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }

    /// State-only view for simulating actions without building nodes.
    pub(crate) fn states(&self) -> StateCursor<'_> {
        StateCursor {
            base: Some(&self.top),
            pushed: Vec::new(),
        }
    }
}

/// A stack of states layered over a [`Stack`], used to try action
/// sequences during error recovery.
pub(crate) struct StateCursor<'s> {
    base: Option<&'s Arc<Frame>>,
    pushed: Vec<StateId>,
}

impl StateCursor<'_> {
    pub(crate) fn state(&self) -> StateId {
        match (self.pushed.last(), self.base) {
            (Some(&state), _) => state,
            (None, Some(frame)) => frame.state,
            (None, None) => StateId::START,
        }
    }

    pub(crate) fn push(&mut self, state: StateId) {
        self.pushed.push(state);
    }

    /// Pop `count` non-extra frames. Returns `false` if the stack runs out.
    pub(crate) fn pop(&mut self, count: usize) -> bool {
        for _ in 0..count {
            if self.pushed.pop().is_some() {
                continue;
            }
            loop {
                let Some(frame) = self.base else {
                    return false;
                };
                if frame.node.is_none() {
                    return false;
                }
                self.base = frame.below.as_ref();
                if !frame.is_extra() {
                    break;
                }
            }
        }
        true
    }
}
