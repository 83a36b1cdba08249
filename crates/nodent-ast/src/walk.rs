//! Tree walks that stop at function boundaries.
//!
//! A nested function is an independent unit: its awaits and yields belong to
//! it, not to the enclosing body.

use crate::arena::NodeArena;
use crate::node::{NodeIndex, NodeKind};

/// Which suspension forms a walk should look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suspension {
    Await,
    Yield,
    Any,
}

impl Suspension {
    fn matches(self, kind: &NodeKind) -> bool {
        match (self, kind) {
            (Suspension::Await | Suspension::Any, NodeKind::Await { .. }) => true,
            (Suspension::Yield | Suspension::Any, NodeKind::Yield { .. }) => true,
            _ => false,
        }
    }
}

/// True when `idx` contains a suspension point of the given form that is not
/// inside a nested function.
pub fn contains_suspension(arena: &NodeArena, idx: NodeIndex, which: Suspension) -> bool {
    let Some(node) = arena.get(idx) else {
        return false;
    };
    if which.matches(&node.kind) {
        return true;
    }
    if node.kind.is_function() {
        return false;
    }
    let mut found = false;
    node.kind.for_each_child(|child| {
        if !found && contains_suspension(arena, child, which) {
            found = true;
        }
    });
    found
}

/// Suspension points directly owned by the function body `body`, in source order.
pub fn suspension_points(arena: &NodeArena, body: NodeIndex, which: Suspension) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    collect_points(arena, body, which, &mut out);
    out
}

fn collect_points(arena: &NodeArena, idx: NodeIndex, which: Suspension, out: &mut Vec<NodeIndex>) {
    let Some(node) = arena.get(idx) else {
        return;
    };
    if node.kind.is_function() {
        return;
    }
    // Operands are evaluated before the suspension itself.
    node.kind
        .for_each_child(|child| collect_points(arena, child, which, out));
    if which.matches(&node.kind) {
        out.push(idx);
    }
}

/// Every function node under `root` (including `root` itself when it is one),
/// innermost first.
pub fn functions_postorder(arena: &NodeArena, root: NodeIndex) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    collect_functions(arena, root, &mut out);
    out
}

fn collect_functions(arena: &NodeArena, idx: NodeIndex, out: &mut Vec<NodeIndex>) {
    let Some(node) = arena.get(idx) else {
        return;
    };
    node.kind
        .for_each_child(|child| collect_functions(arena, child, out));
    if node.kind.is_function() {
        out.push(idx);
    }
}

/// Pre-order visit of `root`'s subtree that does not descend into nested
/// functions (the function nodes themselves are still visited).
pub fn visit_body(arena: &NodeArena, root: NodeIndex, f: &mut impl FnMut(NodeIndex, &NodeKind)) {
    let Some(node) = arena.get(root) else {
        return;
    };
    f(root, &node.kind);
    if node.kind.is_function() {
        return;
    }
    node.kind.for_each_child(|child| visit_body(arena, child, f));
}

/// Nesting depth of the tree below `root`.
pub fn depth(arena: &NodeArena, root: NodeIndex) -> u32 {
    let Some(node) = arena.get(root) else {
        return 0;
    };
    let mut max = 0;
    node.kind.for_each_child(|child| max = max.max(depth(arena, child)));
    max + 1
}
