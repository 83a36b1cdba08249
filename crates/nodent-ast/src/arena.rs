//! NodeArena - storage for syntax tree nodes with a parent-index map.
//!
//! Nodes are addressed by stable `NodeIndex`. Instead of parent back-links
//! inside nodes, the arena keeps a separate `parents` vector; replacing a node
//! "in place" means rebinding the parent's child slot to a new index and
//! updating the map.

use crate::node::{FunctionData, Node, NodeFlags, NodeIndex, NodeKind};
use nodent_common::Span;
use rustc_hash::FxHashSet;

#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    parents: Vec<NodeIndex>,
}

impl NodeArena {
    pub fn new() -> NodeArena {
        NodeArena::default()
    }

    pub fn with_capacity(capacity: usize) -> NodeArena {
        NodeArena {
            nodes: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
        }
    }

    /// Append a node; its children get their parent slot pointed at it.
    pub fn add(&mut self, kind: NodeKind, span: Span, flags: NodeFlags) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len() as u32);
        kind.for_each_child(|child| {
            if let Some(slot) = self.parents.get_mut(child.0 as usize) {
                *slot = idx;
            }
        });
        self.nodes.push(Node { kind, span, flags });
        self.parents.push(NodeIndex::NONE);
        idx
    }

    #[inline]
    pub fn get(&self, idx: NodeIndex) -> Option<&Node> {
        if idx.is_none() {
            return None;
        }
        self.nodes.get(idx.0 as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, idx: NodeIndex) -> Option<&mut Node> {
        if idx.is_none() {
            return None;
        }
        self.nodes.get_mut(idx.0 as usize)
    }

    #[inline]
    pub fn kind(&self, idx: NodeIndex) -> Option<&NodeKind> {
        self.get(idx).map(|n| &n.kind)
    }

    pub fn span(&self, idx: NodeIndex) -> Span {
        self.get(idx).map(|n| n.span).unwrap_or_default()
    }

    pub fn get_function(&self, idx: NodeIndex) -> Option<&FunctionData> {
        match self.kind(idx)? {
            NodeKind::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn identifier_name(&self, idx: NodeIndex) -> Option<&str> {
        match self.kind(idx)? {
            NodeKind::Identifier { name } => Some(name),
            _ => None,
        }
    }

    /// Statements of a `Block` or `Program`; a single statement otherwise.
    pub fn statements_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        match self.kind(idx) {
            Some(NodeKind::Block { statements }) => statements.nodes.clone(),
            Some(NodeKind::Program { body }) => body.nodes.clone(),
            Some(_) => vec![idx],
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, idx: NodeIndex) -> NodeIndex {
        self.parents
            .get(idx.0 as usize)
            .copied()
            .unwrap_or(NodeIndex::NONE)
    }

    /// Replace the contents of `idx` keeping its index (and thus its parent slot).
    pub fn replace_kind(&mut self, idx: NodeIndex, kind: NodeKind) {
        kind.for_each_child(|child| {
            if let Some(slot) = self.parents.get_mut(child.0 as usize) {
                *slot = idx;
            }
        });
        if let Some(node) = self.get_mut(idx) {
            node.kind = kind;
        }
    }

    /// Rebind the slot in `parent` that holds `old` so that it holds `new`.
    /// Returns false when `old` is not a child of `parent`.
    pub fn replace_child(&mut self, parent: NodeIndex, old: NodeIndex, new: NodeIndex) -> bool {
        let mut replaced = false;
        if let Some(node) = self.get_mut(parent) {
            node.kind.for_each_child_slot_mut(|slot| {
                if !replaced && *slot == old {
                    *slot = new;
                    replaced = true;
                }
            });
        }
        if replaced {
            if let Some(slot) = self.parents.get_mut(new.0 as usize) {
                *slot = parent;
            }
            if let Some(slot) = self.parents.get_mut(old.0 as usize) {
                *slot = NodeIndex::NONE;
            }
        }
        replaced
    }

    /// Recompute the parent map for everything reachable from `root`.
    /// Unreachable nodes end up with no parent.
    pub fn rebuild_parents(&mut self, root: NodeIndex) {
        tracing::trace!(root = root.0, nodes = self.nodes.len(), "rebuilding parent map");
        self.parents.iter_mut().for_each(|p| *p = NodeIndex::NONE);
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let Some(node) = self.nodes.get(idx.0 as usize) else {
                continue;
            };
            let children = node.kind.children();
            for child in children {
                if let Some(slot) = self.parents.get_mut(child.0 as usize) {
                    *slot = idx;
                }
                stack.push(child);
            }
        }
    }

    /// Pre-order walk of the subtree rooted at `root`.
    pub fn preorder(&self, root: NodeIndex) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let Some(node) = self.get(idx) else {
                continue;
            };
            order.push(idx);
            let children = node.kind.children();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Check the single-owner invariant: no node reachable from `root` is
    /// referenced from two slots. Returns the first shared index found.
    pub fn check_single_owner(&self, root: NodeIndex) -> Result<(), NodeIndex> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let Some(node) = self.get(idx) else {
                continue;
            };
            if !seen.insert(idx) {
                return Err(idx);
            }
            stack.extend(node.kind.children());
        }
        Ok(())
    }
}
