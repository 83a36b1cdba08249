//! Expression hoisting.
//!
//! A suspension can only happen between statements, so an expression that
//! contains one is split: everything evaluated before the suspension is
//! spilled into temporaries, the suspension becomes its own work item, and the
//! expression is rewritten to read the temporaries.
//!
//! ```javascript
//! x = f(a, await b) + c;
//! ```
//! Becomes:
//! ```javascript
//! $t_1 = a;
//! $t_2 = await b;     // suspension item
//! x = f($t_1, $t_2) + c;
//! ```
//!
//! Short-circuit and conditional operators turn into `if` statements so the
//! suspension only runs on the branch that evaluates it. A callee is read
//! before its arguments run, so a method whose arguments suspend is called
//! as `$t_2.call($t_1, ...)` on the receiver and function read beforehand.

use crate::lower::{Item, Lowerer};
use nodent_ast::{
    AssignOperator, BinaryOperator, LogicalOperator, NodeFlags, NodeIndex, NodeKind, NodeList,
    Suspension,
};
use nodent_common::Span;
use rustc_hash::FxHashMap;

impl Lowerer<'_> {
    /// Hoist the suspensions out of `idx`; returns the expression to use in
    /// its place once every item pushed to `pre` has run.
    pub(crate) fn flatten(&mut self, idx: NodeIndex, pre: &mut Vec<Item>) -> NodeIndex {
        if idx.is_none() || !self.has_suspension(idx) {
            return idx;
        }
        let Some(kind) = self.arena.kind(idx).cloned() else {
            return idx;
        };
        let span = self.arena.span(idx);
        match kind {
            NodeKind::Await { expression } if self.which != Suspension::Yield => {
                self.hoist_suspension(expression, span, pre)
            }
            NodeKind::Yield { expression, .. } if self.which != Suspension::Await => {
                self.hoist_suspension(expression, span, pre)
            }
            NodeKind::Logical {
                operator,
                left,
                right,
            } if self.has_suspension(right) => {
                let left = self.flatten(left, pre);
                let temp = self.new_temp("t");
                self.span = span;
                let mut b = self.b();
                let target = b.temp(&temp);
                let assign = b.assign(target, left);
                let store = b.expr_stmt(assign);
                let current = b.temp(&temp);
                let test = match operator {
                    LogicalOperator::And => current,
                    LogicalOperator::Or => b.not(current),
                    LogicalOperator::Coalesce => {
                        let null = b.null();
                        b.binary(BinaryOperator::Equal, current, null)
                    }
                };
                let target = b.temp(&temp);
                let assign = b.assign(target, right);
                let evaluate = b.expr_stmt(assign);
                let then_block = b.block(vec![evaluate]);
                let branch = b.if_stmt(test, then_block, NodeIndex::NONE);
                let result = b.temp(&temp);
                pre.push(Item::Sync(store));
                pre.push(Item::Stmt(branch));
                result
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } if self.has_suspension(when_true) || self.has_suspension(when_false) => {
                let condition = self.flatten(condition, pre);
                let temp = self.new_temp("t");
                self.span = span;
                let mut b = self.b();
                let target = b.temp(&temp);
                let assign = b.assign(target, when_true);
                let then_stmt = b.expr_stmt(assign);
                let then_block = b.block(vec![then_stmt]);
                let target = b.temp(&temp);
                let assign = b.assign(target, when_false);
                let else_stmt = b.expr_stmt(assign);
                let else_block = b.block(vec![else_stmt]);
                let branch = b.if_stmt(condition, then_block, else_block);
                let result = b.temp(&temp);
                pre.push(Item::Stmt(branch));
                result
            }
            NodeKind::Assignment {
                operator,
                target,
                value,
            } => self.flatten_assignment(idx, operator, target, value, pre),
            NodeKind::Call { callee, arguments } => {
                let args_suspend = arguments.nodes.iter().any(|&a| self.has_suspension(a));
                let (callee, receiver) = self.flatten_callee(callee, args_suspend, pre);
                let mut arguments = self.flatten_list(&arguments.nodes, pre);
                if let Some(receiver) = receiver {
                    arguments.insert(0, receiver);
                }
                self.arena.replace_kind(
                    idx,
                    NodeKind::Call {
                        callee,
                        arguments: NodeList::new(arguments),
                    },
                );
                idx
            }
            NodeKind::ObjectLiteral { properties } => {
                let entries: Vec<(NodeIndex, String, NodeIndex)> = properties
                    .nodes
                    .iter()
                    .filter_map(|&p| match self.arena.kind(p) {
                        Some(NodeKind::Property { key, value }) => Some((p, key.clone(), *value)),
                        _ => None,
                    })
                    .collect();
                let values: Vec<NodeIndex> = entries.iter().map(|e| e.2).collect();
                let values = self.flatten_list(&values, pre);
                for ((property, key, _), value) in entries.into_iter().zip(values) {
                    self.arena
                        .replace_kind(property, NodeKind::Property { key, value });
                }
                idx
            }
            kind => {
                let children: Vec<NodeIndex> = kind.children().into_iter().collect();
                let flattened = self.flatten_list(&children, pre);
                let replacements: FxHashMap<NodeIndex, NodeIndex> = children
                    .into_iter()
                    .zip(flattened)
                    .filter(|(old, new)| old != new)
                    .collect();
                if !replacements.is_empty() {
                    self.rebind(idx, kind, &replacements);
                }
                idx
            }
        }
    }

    fn hoist_suspension(&mut self, operand: NodeIndex, span: Span, pre: &mut Vec<Item>) -> NodeIndex {
        let operand = self.flatten(operand, pre);
        let temp = self.new_temp("t");
        pre.push(Item::Suspend {
            temp: Some(temp.clone()),
            expr: operand,
            span,
        });
        self.span = span;
        self.b().temp(&temp)
    }

    /// Flatten operands evaluated left to right. Operands before the last
    /// suspending one are spilled so they keep the value they had before the
    /// suspension.
    fn flatten_list(&mut self, operands: &[NodeIndex], pre: &mut Vec<Item>) -> Vec<NodeIndex> {
        let last = operands.iter().rposition(|&c| self.has_suspension(c));
        let mut out = Vec::with_capacity(operands.len());
        for (i, &operand) in operands.iter().enumerate() {
            let flattened = match last {
                Some(last) if i < last => {
                    let value = self.flatten(operand, pre);
                    self.spill(value, pre)
                }
                Some(last) if i == last => self.flatten(operand, pre),
                _ => operand,
            };
            out.push(flattened);
        }
        out
    }

    /// Store `value` in a fresh temporary unless it cannot change.
    fn spill(&mut self, value: NodeIndex, pre: &mut Vec<Item>) -> NodeIndex {
        if self.is_stable(value) {
            return value;
        }
        let name = self.spill_to_name(value, pre);
        self.b().temp(&name)
    }

    fn spill_to_name(&mut self, value: NodeIndex, pre: &mut Vec<Item>) -> String {
        if let Some(node) = self.arena.get(value) {
            if let NodeKind::Identifier { name } = &node.kind {
                if node.flags.contains(NodeFlags::TEMPORARY) {
                    return name.clone();
                }
            }
        }
        let temp = self.new_temp("t");
        let mut b = self.b();
        let target = b.temp(&temp);
        let assign = b.assign(target, value);
        let stmt = b.expr_stmt(assign);
        pre.push(Item::Sync(stmt));
        temp
    }

    /// The callee is evaluated before the arguments. When an argument
    /// suspends, a method is read into a temporary before the suspension and
    /// called through `.call`; the returned receiver goes first in the
    /// argument list.
    fn flatten_callee(
        &mut self,
        callee: NodeIndex,
        args_suspend: bool,
        pre: &mut Vec<Item>,
    ) -> (NodeIndex, Option<NodeIndex>) {
        let span = self.arena.span(callee);
        match self.arena.kind(callee).cloned() {
            Some(NodeKind::PropertyAccess { object, name }) => {
                let object = self.flatten(object, pre);
                if !args_suspend {
                    self.arena
                        .replace_kind(callee, NodeKind::PropertyAccess { object, name });
                    return (callee, None);
                }
                let receiver = self.spill_to_name(object, pre);
                self.span = span;
                let read = {
                    let mut b = self.b();
                    let object = b.temp(&receiver);
                    b.prop(object, name)
                };
                let method = self.spill_to_name(read, pre);
                self.bound_call(&method, &receiver)
            }
            Some(NodeKind::ElementAccess { object, index }) => {
                let index_suspends = self.has_suspension(index);
                let mut object = self.flatten(object, pre);
                if index_suspends || args_suspend {
                    object = self.spill(object, pre);
                }
                let index = self.flatten(index, pre);
                if !args_suspend {
                    self.arena
                        .replace_kind(callee, NodeKind::ElementAccess { object, index });
                    return (callee, None);
                }
                let receiver = self.spill_to_name(object, pre);
                let key = self.spill_to_name(index, pre);
                self.span = span;
                let read = {
                    let mut b = self.b();
                    let object = b.temp(&receiver);
                    let key = b.temp(&key);
                    b.elem(object, key)
                };
                let method = self.spill_to_name(read, pre);
                self.bound_call(&method, &receiver)
            }
            _ => {
                let flattened = self.flatten(callee, pre);
                if args_suspend {
                    (self.spill(flattened, pre), None)
                } else {
                    (flattened, None)
                }
            }
        }
    }

    /// `method.call` plus the receiver to pass as its first argument.
    fn bound_call(&mut self, method: &str, receiver: &str) -> (NodeIndex, Option<NodeIndex>) {
        let mut b = self.b();
        let function = b.temp(method);
        let call = b.prop(function, "call");
        (call, Some(b.temp(receiver)))
    }

    fn flatten_assignment(
        &mut self,
        idx: NodeIndex,
        operator: AssignOperator,
        target: NodeIndex,
        value: NodeIndex,
        pre: &mut Vec<Item>,
    ) -> NodeIndex {
        let value_suspends = self.has_suspension(value);
        let span = self.arena.span(idx);
        let compound = match operator {
            AssignOperator::Compound(op) if value_suspends => Some(op),
            _ => None,
        };

        let (target, old) = match self.arena.kind(target).cloned() {
            Some(NodeKind::PropertyAccess { object, name }) => {
                let object = self.flatten(object, pre);
                if compound.is_some() {
                    let object = self.spill_to_name(object, pre);
                    self.span = span;
                    let read = {
                        let mut b = self.b();
                        let receiver = b.temp(&object);
                        b.prop(receiver, name.clone())
                    };
                    let old = self.spill_to_name(read, pre);
                    let mut b = self.b();
                    let receiver = b.temp(&object);
                    (b.prop(receiver, name), Some(old))
                } else {
                    let object = if value_suspends {
                        self.spill(object, pre)
                    } else {
                        object
                    };
                    self.arena
                        .replace_kind(target, NodeKind::PropertyAccess { object, name });
                    (target, None)
                }
            }
            Some(NodeKind::ElementAccess { object, index }) => {
                let index_suspends = self.has_suspension(index);
                let object = self.flatten(object, pre);
                let object = if index_suspends || value_suspends {
                    self.spill(object, pre)
                } else {
                    object
                };
                let index = self.flatten(index, pre);
                let index = if value_suspends {
                    self.spill(index, pre)
                } else {
                    index
                };
                if compound.is_some() {
                    let object = self.spill_to_name(object, pre);
                    let index = self.spill_to_name(index, pre);
                    self.span = span;
                    let read = {
                        let mut b = self.b();
                        let receiver = b.temp(&object);
                        let key = b.temp(&index);
                        b.elem(receiver, key)
                    };
                    let old = self.spill_to_name(read, pre);
                    let mut b = self.b();
                    let receiver = b.temp(&object);
                    let key = b.temp(&index);
                    (b.elem(receiver, key), Some(old))
                } else {
                    self.arena
                        .replace_kind(target, NodeKind::ElementAccess { object, index });
                    (target, None)
                }
            }
            Some(NodeKind::Identifier { name }) if compound.is_some() => {
                self.span = span;
                let read = self.b().ident(name);
                let old = self.spill_to_name(read, pre);
                (target, Some(old))
            }
            _ => (target, None),
        };

        let value = self.flatten(value, pre);
        let (operator, value) = match (compound, old) {
            (Some(op), Some(old)) => {
                self.span = span;
                let mut b = self.b();
                let previous = b.temp(&old);
                (AssignOperator::Assign, b.binary(op, previous, value))
            }
            _ => (operator, value),
        };
        self.arena.replace_kind(
            idx,
            NodeKind::Assignment {
                operator,
                target,
                value,
            },
        );
        idx
    }
}

#[cfg(test)]
mod tests {
    use crate::lower::{Frame, Jump, Lowerer, SuspendStyle};
    use crate::names::NameGen;
    use nodent_ast::{AstBuilder, BinaryOperator, DebugPrinter, NodeArena, NodeIndex};

    fn lower(arena: &mut NodeArena, statements: Vec<NodeIndex>) -> String {
        let mut names = NameGen::new("$");
        let mut lowerer = Lowerer::new(
            arena,
            &mut names,
            SuspendStyle::Await {
                make_thenable: None,
            },
            "$this",
        );
        let frame = Frame::new("$return", "$error");
        let tail = frame.exit();
        let segment = lowerer.lower_body(statements, &frame, &tail);
        let body = lowerer.segment_body(segment, "$error");
        let block = AstBuilder::new(arena).block(body);
        DebugPrinter::new(arena).print(block)
    }

    #[test]
    fn test_operands_before_await_are_spilled() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let a = b.ident("a");
        let p = b.ident("p");
        let waited = b.await_expr(p);
        let sum = b.binary(BinaryOperator::Add, a, waited);
        let stmt = b.assign_named("x", sum);
        let stmt = b.expr_stmt(stmt);

        let text = lower(&mut arena, vec![stmt]);
        assert!(text.contains("$t_1 = a;"), "{text}");
        assert!(text.contains("p.then(function($await_3)"), "{text}");
        assert!(text.contains("$t_2 = $await_3;"), "{text}");
        assert!(text.contains("x = $t_1 + $t_2;"), "{text}");
    }

    #[test]
    fn test_method_receiver_kept() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let obj = b.ident("obj");
        let p = b.ident("p");
        let waited = b.await_expr(p);
        let call = b.method_call(obj, "m", vec![waited]);
        let stmt = b.expr_stmt(call);

        let text = lower(&mut arena, vec![stmt]);
        assert!(text.contains("$t_1 = obj;"), "{text}");
        assert!(text.contains("$t_2 = $t_1.m;"), "{text}");
        assert!(text.contains("$t_2.call($t_1, $t_3);"), "{text}");
    }

    #[test]
    fn test_named_callee_read_before_suspension() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let p = b.ident("p");
        let waited = b.await_expr(p);
        let call = b.call_named("f", vec![waited]);
        let stmt = b.expr_stmt(call);

        let text = lower(&mut arena, vec![stmt]);
        assert!(text.contains("$t_1 = f;"), "{text}");
        assert!(text.contains("$t_1($t_2);"), "{text}");
    }

    #[test]
    fn test_callee_untouched_without_suspending_arguments() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let p = b.ident("p");
        let waited = b.await_expr(p);
        let call = b.call_named("f", vec![]);
        let obj = b.ident("obj");
        let method = b.method_call(obj, "m", vec![]);
        let sum = b.binary(BinaryOperator::Add, call, method);
        let sum = b.binary(BinaryOperator::Add, sum, waited);
        let stmt = b.expr_stmt(sum);

        let text = lower(&mut arena, vec![stmt]);
        assert!(text.contains("$t_1 = f() + obj.m();"), "{text}");
        assert!(!text.contains(".call("), "{text}");
    }

    #[test]
    fn test_short_circuit_becomes_branch() {
        let mut arena = NodeArena::new();
        let mut b = AstBuilder::new(&mut arena);
        let ok = b.ident("ok");
        let p = b.ident("p");
        let waited = b.await_expr(p);
        let both = b.logical(nodent_ast::LogicalOperator::And, ok, waited);
        let stmt = b.assign_named("r", both);
        let stmt = b.expr_stmt(stmt);

        let text = lower(&mut arena, vec![stmt]);
        assert!(text.contains("$t_1 = ok;"), "{text}");
        assert!(text.contains("if ($t_1)"), "{text}");
        assert!(text.contains("r = $t_1;"), "{text}");
    }
}
