//! Continuation segmentation.
//!
//! Splits a prepared function body at its suspension points into segment
//! functions. Every path through a segment ends in a tail call to another
//! continuation, so control flow is expressed entirely through calls.
//!
//! # Transform Patterns
//!
//! ## Await in a statement sequence
//! ```javascript
//! a(); x = await b(); c(x);
//! ```
//! Becomes:
//! ```javascript
//! a();
//! return $makeThenable(b()).then(function ($await_1) {
//!     x = $await_1;
//!     c(x);
//!     return $return();
//! }, $error);
//! ```
//!
//! ## Loop containing an await
//! ```javascript
//! while (i < 3) { await f(i); i++; }
//! done();
//! ```
//! Becomes a driver `$Loop_2` (see `declare_loop`) that runs the iteration
//! segment until one suspends:
//! ```javascript
//! function $Next_1() { done(); return $return(); }
//! function $Iter_4() {
//!     try {
//!         if (i < 3) {
//!             return $makeThenable(f(i)).then(function ($await_3) {
//!                 i++;
//!                 return $Loop_2();
//!             }, $error);
//!         } else {
//!             return $Next_1();
//!         }
//!     } catch ($boundEx) {
//!         return $error($boundEx);
//!     }
//! }
//! function $Loop_2() { ... }
//! return $Loop_2();
//! ```
//!
//! Segment bodies run inside a guard that routes a synchronous throw to the
//! error continuation in force at that point, which is how `try/catch`
//! around an `await` sees both rejections and throws.

use crate::names::NameGen;
use nodent_ast::walk::{Suspension, contains_suspension, visit_body};
use nodent_ast::{AstBuilder, BinaryOperator, NodeArena, NodeFlags, NodeIndex, NodeKind};
use nodent_common::Span;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Where a `return` delivers its value.
#[derive(Clone, Debug)]
pub(crate) enum ReturnTarget {
    /// `return $return(value)`
    Direct(String),
    /// Store the value, run a `finally` segment, then return through `inner`.
    ViaFinally {
        finally: String,
        value: String,
        inner: Box<ReturnTarget>,
    },
}

/// A control transfer emitted as a tail call.
#[derive(Clone, Debug)]
pub(crate) enum Jump {
    /// `return name()`
    Call(String),
    /// Leave the function with `undefined`.
    Exit(ReturnTarget),
    /// Run a `finally` segment, then take `inner`.
    ViaFinally { finally: String, inner: Box<Jump> },
}

#[derive(Clone, Debug)]
struct LoopTarget {
    label: Option<String>,
    brk: Jump,
    cont: Jump,
}

/// Jump targets in force while lowering a statement list.
#[derive(Clone, Debug)]
pub(crate) struct Frame {
    ret: ReturnTarget,
    err: String,
    loops: Vec<LoopTarget>,
}

impl Frame {
    pub(crate) fn new(return_name: &str, error_name: &str) -> Frame {
        Frame {
            ret: ReturnTarget::Direct(return_name.to_string()),
            err: error_name.to_string(),
            loops: Vec::new(),
        }
    }

    pub(crate) fn exit(&self) -> Jump {
        Jump::Exit(self.ret.clone())
    }

    pub(crate) fn error_name(&self) -> &str {
        &self.err
    }

    fn with_err(&self, err: &str) -> Frame {
        Frame {
            err: err.to_string(),
            ..self.clone()
        }
    }

    fn with_loop(&self, target: LoopTarget) -> Frame {
        let mut frame = self.clone();
        frame.loops.push(target);
        frame
    }

    fn resolve(&self, label: Option<&str>, is_break: bool) -> Option<&Jump> {
        let target = match label {
            None => self.loops.last(),
            Some(label) => self
                .loops
                .iter()
                .rev()
                .find(|t| t.label.as_deref() == Some(label)),
        }?;
        Some(if is_break { &target.brk } else { &target.cont })
    }
}

/// Work item of a statement list being lowered.
#[derive(Clone, Debug)]
pub(crate) enum Item {
    /// Source statement, lowered if it needs it.
    Stmt(NodeIndex),
    /// Already-lowered statement emitted as is.
    Sync(NodeIndex),
    /// Suspend on `expr`; the resumed value is stored in `temp`.
    Suspend {
        temp: Option<String>,
        expr: NodeIndex,
        span: Span,
    },
}

/// Lowered statements plus the segment declarations they call.
#[derive(Debug, Default)]
pub(crate) struct Segment {
    pub decls: Vec<NodeIndex>,
    pub body: Vec<NodeIndex>,
}

#[derive(Clone, Debug)]
pub(crate) enum SuspendStyle {
    /// `return wrap(expr).then(resume, err)`; `make_thenable` is the wrapper.
    Await { make_thenable: Option<String> },
    /// `return $yield(expr, resume, err)`
    Yield { yield_name: String },
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LowerStats {
    pub suspension_points: usize,
    pub segments: usize,
}

pub(crate) struct Lowerer<'a> {
    pub(crate) arena: &'a mut NodeArena,
    pub(crate) names: &'a mut NameGen,
    style: SuspendStyle,
    pub(crate) which: Suspension,
    pub(crate) this_name: String,
    guard_name: String,
    pub(crate) span: Span,
    pub temps: Vec<String>,
    pub stats: LowerStats,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn new(
        arena: &'a mut NodeArena,
        names: &'a mut NameGen,
        style: SuspendStyle,
        this_name: &str,
    ) -> Self {
        let which = match style {
            SuspendStyle::Await { .. } => Suspension::Await,
            SuspendStyle::Yield { .. } => Suspension::Yield,
        };
        let guard_name = names.fixed("boundEx");
        Lowerer {
            arena,
            names,
            style,
            which,
            this_name: this_name.to_string(),
            guard_name,
            span: Span::default(),
            temps: Vec::new(),
            stats: LowerStats::default(),
        }
    }

    pub(crate) fn b(&mut self) -> AstBuilder<'_> {
        AstBuilder::synthesized(self.arena, self.span)
    }

    pub(crate) fn new_temp(&mut self, stem: &str) -> String {
        let name = self.names.next(stem);
        self.temps.push(name.clone());
        name
    }

    pub(crate) fn has_suspension(&self, idx: NodeIndex) -> bool {
        contains_suspension(self.arena, idx, self.which)
    }

    /// Lower a whole function body; `tail` is taken when it falls off the end.
    pub(crate) fn lower_body(
        &mut self,
        statements: Vec<NodeIndex>,
        frame: &Frame,
        tail: &Jump,
    ) -> Segment {
        self.lower_items(statements.into_iter().map(Item::Stmt).collect(), frame, tail)
    }

    /// Helper declarations followed by the guarded statements.
    pub(crate) fn segment_body(&mut self, segment: Segment, err: &str) -> Vec<NodeIndex> {
        let Segment { mut decls, body } = segment;
        if self.is_pure_jump(&body) {
            decls.extend(body);
        } else {
            let guard = self.guard(body, err);
            decls.push(guard);
        }
        decls
    }

    fn guard(&mut self, body: Vec<NodeIndex>, err: &str) -> NodeIndex {
        let guard_name = self.guard_name.clone();
        let mut b = self.b();
        let block = b.block(body);
        let caught = b.ident(&guard_name);
        let call = b.call_named(err, vec![caught]);
        let ret = b.ret(call);
        let handler = b.block(vec![ret]);
        b.try_stmt(block, Some((&guard_name, handler)), NodeIndex::NONE)
    }

    /// `return f(a, b)` where every argument is a name, literal or function
    /// expression: nothing in it can throw before the callee runs.
    fn is_pure_jump(&self, body: &[NodeIndex]) -> bool {
        let [only] = body else {
            return false;
        };
        let Some(NodeKind::Return { expression }) = self.arena.kind(*only) else {
            return false;
        };
        let Some(NodeKind::Call { callee, arguments }) = self.arena.kind(*expression) else {
            return false;
        };
        matches!(self.arena.kind(*callee), Some(NodeKind::Identifier { .. }))
            && arguments.nodes.iter().all(|arg| {
                matches!(
                    self.arena.kind(*arg),
                    Some(NodeKind::Identifier { .. } | NodeKind::Literal(_) | NodeKind::Function(_))
                )
            })
    }

    fn segment_decl(
        &mut self,
        name: &str,
        params: Vec<String>,
        segment: Segment,
        err: &str,
    ) -> NodeIndex {
        let statements = self.segment_body(segment, err);
        self.stats.segments += 1;
        self.b().segment_declaration(name, params, statements)
    }

    // =========================================================================
    // Statement lists
    // =========================================================================

    fn lower_items(&mut self, mut items: VecDeque<Item>, frame: &Frame, tail: &Jump) -> Segment {
        let mut seg = Segment::default();
        while let Some(item) = items.pop_front() {
            match item {
                Item::Sync(stmt) => seg.body.push(stmt),
                Item::Suspend { temp, expr, span } => {
                    let rest = self.lower_items(std::mem::take(&mut items), frame, tail);
                    self.span = span;
                    let stmt = self.suspend(temp, expr, rest, frame);
                    seg.body.push(stmt);
                    return seg;
                }
                Item::Stmt(stmt) => {
                    if matches!(self.arena.kind(stmt), Some(NodeKind::Empty) | None) {
                        continue;
                    }
                    self.span = self.arena.span(stmt);
                    if !self.needs_lowering(stmt) {
                        let terminal = self.is_jump(stmt);
                        let mut native = Vec::new();
                        let stmt = self.rewrite_sync(stmt, frame, &mut native);
                        seg.body.push(stmt);
                        if terminal {
                            return seg;
                        }
                        continue;
                    }
                    if self.lower_statement(stmt, &mut items, frame, tail, &mut seg) {
                        return seg;
                    }
                }
            }
        }
        let jump = self.emit_jump(tail);
        seg.body.extend(jump);
        seg
    }

    fn suspend(
        &mut self,
        temp: Option<String>,
        expr: NodeIndex,
        mut rest: Segment,
        frame: &Frame,
    ) -> NodeIndex {
        self.stats.suspension_points += 1;
        let stem = match self.style {
            SuspendStyle::Await { .. } => "await",
            SuspendStyle::Yield { .. } => "yield",
        };
        let param = self.names.next(stem);
        if let Some(temp) = temp {
            let mut b = self.b();
            let value = b.ident(&param);
            let target = b.ident(&temp);
            let assign = b.assign(target, value);
            let stmt = b.expr_stmt(assign);
            rest.body.insert(0, stmt);
        }
        let body = self.segment_body(rest, &frame.err);
        self.stats.segments += 1;

        let style = self.style.clone();
        let err = frame.err.clone();
        let mut b = self.b();
        let resume = b.segment_function(None, vec![param], body);
        let on_error = b.ident(&err);
        let call = match style {
            SuspendStyle::Await { make_thenable } => {
                let awaited = match make_thenable {
                    Some(name) => b.driver_call(&name, vec![expr]),
                    None => expr,
                };
                b.method_call(awaited, "then", vec![resume, on_error])
            }
            SuspendStyle::Yield { yield_name } => {
                let value = if expr.is_some() { expr } else { b.undefined() };
                b.call_named(&yield_name, vec![value, resume, on_error])
            }
        };
        b.ret(call)
    }

    fn needs_lowering(&self, stmt: NodeIndex) -> bool {
        self.has_suspension(stmt) || has_finally_with_jump(self.arena, stmt)
    }

    fn is_jump(&self, stmt: NodeIndex) -> bool {
        matches!(
            self.arena.kind(stmt),
            Some(
                NodeKind::Return { .. }
                    | NodeKind::Throw { .. }
                    | NodeKind::Break { .. }
                    | NodeKind::Continue { .. }
            )
        )
    }

    /// Rewrite the jumps of a statement that needs no segmentation. `native`
    /// holds the labels of loops entered inside the statement; jumps to those
    /// stay as they are.
    fn rewrite_sync(
        &mut self,
        idx: NodeIndex,
        frame: &Frame,
        native: &mut Vec<Option<String>>,
    ) -> NodeIndex {
        let Some(kind) = self.arena.kind(idx).cloned() else {
            return idx;
        };
        match kind {
            NodeKind::Function(_) => idx,
            NodeKind::Return { expression } => {
                self.span = self.arena.span(idx);
                let ret = frame.ret.clone();
                let stmts = self.emit_return(&ret, expression);
                self.single(stmts)
            }
            NodeKind::Break { ref label } | NodeKind::Continue { ref label } => {
                let is_break = matches!(kind, NodeKind::Break { .. });
                let stays_native = match label {
                    None => !native.is_empty(),
                    Some(label) => native.iter().any(|l| l.as_deref() == Some(label.as_str())),
                };
                if stays_native {
                    return idx;
                }
                match frame.resolve(label.as_deref(), is_break).cloned() {
                    Some(jump) => {
                        self.span = self.arena.span(idx);
                        let stmts = self.emit_jump(&jump);
                        self.single(stmts)
                    }
                    None => idx,
                }
            }
            kind => {
                let pushed = match kind.loop_label() {
                    Some(label) => {
                        native.push(label.map(str::to_string));
                        true
                    }
                    None => false,
                };
                let mut replacements = FxHashMap::default();
                for child in kind.children() {
                    let is_statement = self
                        .arena
                        .kind(child)
                        .is_some_and(|k| k.is_statement() || matches!(k, NodeKind::CatchClause { .. }));
                    if is_statement {
                        let new = self.rewrite_sync(child, frame, native);
                        if new != child {
                            replacements.insert(child, new);
                        }
                    }
                }
                if pushed {
                    native.pop();
                }
                if !replacements.is_empty() {
                    self.rebind(idx, kind, &replacements);
                }
                idx
            }
        }
    }

    pub(crate) fn rebind(
        &mut self,
        idx: NodeIndex,
        mut kind: NodeKind,
        replacements: &FxHashMap<NodeIndex, NodeIndex>,
    ) {
        kind.for_each_child_slot_mut(|slot| {
            if let Some(new) = replacements.get(slot) {
                *slot = *new;
            }
        });
        self.arena.replace_kind(idx, kind);
    }

    fn single(&mut self, mut stmts: Vec<NodeIndex>) -> NodeIndex {
        if stmts.len() == 1 {
            if let Some(only) = stmts.pop() {
                return only;
            }
        }
        self.b().block(stmts)
    }

    fn statements(&self, idx: NodeIndex) -> VecDeque<Item> {
        if idx.is_none() {
            return VecDeque::new();
        }
        self.arena
            .statements_of(idx)
            .into_iter()
            .map(Item::Stmt)
            .collect()
    }

    // =========================================================================
    // Jumps
    // =========================================================================

    fn emit_return(&mut self, target: &ReturnTarget, value: NodeIndex) -> Vec<NodeIndex> {
        match target {
            ReturnTarget::Direct(name) => {
                let mut b = self.b();
                let args = if value.is_some() { vec![value] } else { Vec::new() };
                let call = b.call_named(name, args);
                vec![b.ret(call)]
            }
            ReturnTarget::ViaFinally {
                finally,
                value: slot,
                inner,
            } => {
                let (store, stored) = {
                    let mut b = self.b();
                    let value = if value.is_some() { value } else { b.undefined() };
                    let target = b.temp(slot);
                    let assign = b.assign(target, value);
                    (b.expr_stmt(assign), b.temp(slot))
                };
                let inner_stmts = self.emit_return(inner, stored);
                let mut b = self.b();
                let then = b.function_expr(None, &[], inner_stmts);
                let call = b.call_named(finally, vec![then]);
                vec![store, b.ret(call)]
            }
        }
    }

    pub(crate) fn emit_jump(&mut self, jump: &Jump) -> Vec<NodeIndex> {
        match jump {
            Jump::Call(name) => {
                let mut b = self.b();
                let call = b.call_named(name, Vec::new());
                vec![b.ret(call)]
            }
            Jump::Exit(target) => self.emit_return(target, NodeIndex::NONE),
            Jump::ViaFinally { finally, inner } => {
                let next = match inner.as_ref() {
                    Jump::Call(name) => self.b().ident(name),
                    other => {
                        let stmts = self.emit_jump(other);
                        self.b().function_expr(None, &[], stmts)
                    }
                };
                let mut b = self.b();
                let call = b.call_named(finally, vec![next]);
                vec![b.ret(call)]
            }
        }
    }

    /// Declare `$Next_n` for the remaining items and return the jump to it;
    /// with nothing left the enclosing tail is used directly.
    fn continuation(
        &mut self,
        items: &mut VecDeque<Item>,
        frame: &Frame,
        tail: &Jump,
        seg: &mut Segment,
    ) -> Jump {
        let rest = std::mem::take(items);
        if rest.iter().all(|item| self.is_empty_item(item)) {
            return tail.clone();
        }
        let name = self.names.next("Next");
        let lowered = self.lower_items(rest, frame, tail);
        let decl = self.segment_decl(&name, Vec::new(), lowered, &frame.err);
        seg.decls.push(decl);
        Jump::Call(name)
    }

    fn is_empty_item(&self, item: &Item) -> bool {
        match item {
            Item::Stmt(idx) => matches!(self.arena.kind(*idx), Some(NodeKind::Empty) | None),
            _ => false,
        }
    }

    // =========================================================================
    // Compound statements
    // =========================================================================

    /// Returns true when the statement consumed the rest of the list.
    fn lower_statement(
        &mut self,
        stmt: NodeIndex,
        items: &mut VecDeque<Item>,
        frame: &Frame,
        tail: &Jump,
        seg: &mut Segment,
    ) -> bool {
        let Some(kind) = self.arena.kind(stmt).cloned() else {
            return false;
        };
        match kind {
            NodeKind::Block { statements } => {
                for s in statements.nodes.into_iter().rev() {
                    items.push_front(Item::Stmt(s));
                }
                false
            }
            NodeKind::ExpressionStatement { expression } => {
                let mut pre = Vec::new();
                if let Some((temp, operand)) = self.direct_suspension(expression) {
                    let operand = self.flatten(operand, &mut pre);
                    pre.push(Item::Suspend {
                        temp,
                        expr: operand,
                        span: self.arena.span(expression),
                    });
                } else {
                    let value = self.flatten(expression, &mut pre);
                    if !self.is_stable(value) {
                        let stmt = self.b().expr_stmt(value);
                        pre.push(Item::Sync(stmt));
                    }
                }
                requeue(items, pre);
                false
            }
            NodeKind::Return { expression } => {
                let mut pre = Vec::new();
                let expression = self.flatten(expression, &mut pre);
                self.arena
                    .replace_kind(stmt, NodeKind::Return { expression });
                pre.push(Item::Stmt(stmt));
                requeue(items, pre);
                false
            }
            NodeKind::Throw { expression } => {
                let mut pre = Vec::new();
                let expression = self.flatten(expression, &mut pre);
                self.arena.replace_kind(stmt, NodeKind::Throw { expression });
                pre.push(Item::Stmt(stmt));
                requeue(items, pre);
                false
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.has_suspension(condition) {
                    let mut pre = Vec::new();
                    let condition = self.flatten(condition, &mut pre);
                    self.arena.replace_kind(
                        stmt,
                        NodeKind::If {
                            condition,
                            then_branch,
                            else_branch,
                        },
                    );
                    pre.push(Item::Stmt(stmt));
                    requeue(items, pre);
                    return false;
                }
                self.lower_if(condition, then_branch, else_branch, items, frame, tail, seg);
                true
            }
            NodeKind::While {
                condition,
                body,
                label,
            } => {
                self.lower_while(condition, body, label, items, frame, tail, seg);
                true
            }
            NodeKind::DoWhile {
                body,
                condition,
                label,
            } => {
                self.lower_do_while(body, condition, label, items, frame, tail, seg);
                true
            }
            NodeKind::For {
                initializer,
                condition,
                incrementor,
                body,
                label,
            } => {
                if initializer.is_some() {
                    let init = if self.arena.kind(initializer).is_some_and(NodeKind::is_statement) {
                        initializer
                    } else {
                        self.b().expr_stmt(initializer)
                    };
                    self.arena.replace_kind(
                        stmt,
                        NodeKind::For {
                            initializer: NodeIndex::NONE,
                            condition,
                            incrementor,
                            body,
                            label,
                        },
                    );
                    items.push_front(Item::Stmt(stmt));
                    items.push_front(Item::Stmt(init));
                    return false;
                }
                self.lower_for(condition, incrementor, body, label, items, frame, tail, seg);
                true
            }
            NodeKind::ForIn {
                binding,
                declares_binding,
                object,
                body,
                label,
            } => {
                if self.has_suspension(object) {
                    let mut pre = Vec::new();
                    let object = self.flatten(object, &mut pre);
                    self.arena.replace_kind(
                        stmt,
                        NodeKind::ForIn {
                            binding,
                            declares_binding,
                            object,
                            body,
                            label,
                        },
                    );
                    pre.push(Item::Stmt(stmt));
                    requeue(items, pre);
                    return false;
                }
                let pre = self.snapshot_for_in(&binding, object, body, label);
                requeue(items, pre);
                false
            }
            NodeKind::Try {
                block,
                catch_clause,
                finally_block,
            } => {
                self.lower_try(block, catch_clause, finally_block, items, frame, tail, seg);
                true
            }
            _ => {
                let mut native = Vec::new();
                let stmt = self.rewrite_sync(stmt, frame, &mut native);
                seg.body.push(stmt);
                false
            }
        }
    }

    /// `await x;` and `name = await x;`
    fn direct_suspension(&self, expression: NodeIndex) -> Option<(Option<String>, NodeIndex)> {
        let operand_of = |idx: NodeIndex| match (self.arena.kind(idx)?, self.which) {
            (NodeKind::Await { expression }, Suspension::Await) => Some(*expression),
            (
                NodeKind::Yield {
                    expression,
                    delegate: false,
                },
                Suspension::Yield,
            ) => Some(*expression),
            _ => None,
        };
        if let Some(operand) = operand_of(expression) {
            return Some((None, operand));
        }
        match self.arena.kind(expression)? {
            NodeKind::Assignment {
                operator: nodent_ast::AssignOperator::Assign,
                target,
                value,
            } => {
                let name = self.arena.identifier_name(*target)?;
                operand_of(*value).map(|operand| (Some(name.to_string()), operand))
            }
            _ => None,
        }
    }

    fn lower_if(
        &mut self,
        condition: NodeIndex,
        then_branch: NodeIndex,
        else_branch: NodeIndex,
        items: &mut VecDeque<Item>,
        frame: &Frame,
        tail: &Jump,
        seg: &mut Segment,
    ) {
        let span = self.span;
        let after = self.continuation(items, frame, tail, seg);
        let then_items = self.statements(then_branch);
        let then_seg = self.lower_items(then_items, frame, &after);
        let else_items = self.statements(else_branch);
        let else_seg = self.lower_items(else_items, frame, &after);
        seg.decls.extend(then_seg.decls);
        seg.decls.extend(else_seg.decls);
        self.span = span;
        let mut b = self.b();
        let then_block = b.block(then_seg.body);
        let else_block = b.block(else_seg.body);
        let stmt = b.if_stmt(condition, then_block, else_block);
        seg.body.push(stmt);
    }

    fn lower_while(
        &mut self,
        condition: NodeIndex,
        body: NodeIndex,
        label: Option<String>,
        items: &mut VecDeque<Item>,
        frame: &Frame,
        tail: &Jump,
        seg: &mut Segment,
    ) {
        let span = self.span;
        let after = self.continuation(items, frame, tail, seg);
        let loop_name = self.names.next("Loop");
        let again = Jump::Call(loop_name.clone());
        let inner = frame.with_loop(LoopTarget {
            label,
            brk: after,
            cont: again.clone(),
        });

        self.span = span;
        let test = {
            let mut b = self.b();
            let leave = b.brk(None);
            b.if_stmt(condition, body, leave)
        };
        let lowered = self.lower_items(VecDeque::from([Item::Stmt(test)]), &inner, &again);
        self.declare_loop(&loop_name, lowered, &frame.err, seg);
        let enter = self.emit_jump(&again);
        seg.body.extend(enter);
    }

    fn lower_do_while(
        &mut self,
        body: NodeIndex,
        condition: NodeIndex,
        label: Option<String>,
        items: &mut VecDeque<Item>,
        frame: &Frame,
        tail: &Jump,
        seg: &mut Segment,
    ) {
        let span = self.span;
        let after = self.continuation(items, frame, tail, seg);
        let loop_name = self.names.next("Loop");
        let cond_name = self.names.next("Cond");
        let again = Jump::Call(loop_name.clone());
        let check = Jump::Call(cond_name.clone());

        let body_frame = frame.with_loop(LoopTarget {
            label: label.clone(),
            brk: after.clone(),
            cont: check.clone(),
        });
        let body_items = self.statements(body);
        let lowered = self.lower_items(body_items, &body_frame, &check);
        self.declare_loop(&loop_name, lowered, &frame.err, seg);

        // `if (cond) continue; else break;` against a target whose continue
        // re-enters the body.
        self.span = span;
        let cond_frame = frame.with_loop(LoopTarget {
            label,
            brk: after,
            cont: again.clone(),
        });
        let test = {
            let mut b = self.b();
            let repeat = b.cont(None);
            let leave = b.brk(None);
            b.if_stmt(condition, repeat, leave)
        };
        let lowered = self.lower_items(VecDeque::from([Item::Stmt(test)]), &cond_frame, &again);
        let decl = self.segment_decl(&cond_name, Vec::new(), lowered, &frame.err);
        seg.decls.push(decl);

        let enter = self.emit_jump(&again);
        seg.body.extend(enter);
    }

    fn lower_for(
        &mut self,
        condition: NodeIndex,
        incrementor: NodeIndex,
        body: NodeIndex,
        label: Option<String>,
        items: &mut VecDeque<Item>,
        frame: &Frame,
        tail: &Jump,
        seg: &mut Segment,
    ) {
        let span = self.span;
        let after = self.continuation(items, frame, tail, seg);
        let loop_name = self.names.next("Loop");
        let again = Jump::Call(loop_name.clone());
        let step_name = incrementor.is_some().then(|| self.names.next("Step"));
        let next_iteration = match &step_name {
            Some(step) => Jump::Call(step.clone()),
            None => again.clone(),
        };
        let inner = frame.with_loop(LoopTarget {
            label,
            brk: after,
            cont: next_iteration.clone(),
        });

        self.span = span;
        let body_items = if condition.is_some() {
            let mut b = self.b();
            let leave = b.brk(None);
            VecDeque::from([Item::Stmt(b.if_stmt(condition, body, leave))])
        } else {
            self.statements(body)
        };
        let lowered = self.lower_items(body_items, &inner, &next_iteration);
        self.declare_loop(&loop_name, lowered, &frame.err, seg);

        if let Some(step) = step_name {
            self.span = span;
            let update = self.b().expr_stmt(incrementor);
            let lowered = self.lower_items(VecDeque::from([Item::Stmt(update)]), frame, &again);
            let decl = self.segment_decl(&step, Vec::new(), lowered, &frame.err);
            seg.decls.push(decl);
        }

        let enter = self.emit_jump(&again);
        seg.body.extend(enter);
    }

    /// Declare `name` as the driver of a loop whose iteration is `iteration`:
    ///
    /// ```javascript
    /// function $Loop_1() {
    ///     if ($lp_3 === 1) { $lp_3 = 2; return; }
    ///     var $lr_4;
    ///     do { $lp_3 = 1; $lr_4 = $Iter_2(); } while ($lp_3 === 2);
    ///     $lp_3 = 0;
    ///     return $lr_4;
    /// }
    /// ```
    ///
    /// An iteration that reaches the loop head again without suspending finds
    /// the flag at 1 and unwinds to the running driver, which starts the next
    /// iteration from its own frame. After a suspension the flag is 0 and the
    /// call starts a fresh driver from the resuming job.
    fn declare_loop(&mut self, name: &str, iteration: Segment, err: &str, seg: &mut Segment) {
        let iter_name = self.names.next("Iter");
        let decl = self.segment_decl(&iter_name, Vec::new(), iteration, err);
        seg.decls.push(decl);

        let flag = self.new_temp("lp");
        let result = self.names.next("lr");
        let mut b = self.b();
        let running = flag_is(&mut b, &flag, 1.0);
        let request = set_flag(&mut b, &flag, 2.0);
        let unwind = b.ret(NodeIndex::NONE);
        let unwind = b.block(vec![request, unwind]);
        let reentry = b.if_stmt(running, unwind, NodeIndex::NONE);

        let declare_result = b.var(&result, NodeIndex::NONE);
        let start = set_flag(&mut b, &flag, 1.0);
        let call = b.call_named(&iter_name, Vec::new());
        let target = b.temp(&result);
        let store = b.assign(target, call);
        let store = b.expr_stmt(store);
        let body = b.block(vec![start, store]);
        let again = flag_is(&mut b, &flag, 2.0);
        let drive = b.do_while(body, again);
        let idle = set_flag(&mut b, &flag, 0.0);
        let last = b.temp(&result);
        let finish = b.ret(last);

        let driver = Segment {
            decls: Vec::new(),
            body: vec![reentry, declare_result, drive, idle, finish],
        };
        let decl = self.segment_decl(name, Vec::new(), driver, err);
        seg.decls.push(decl);
    }

    /// `for (k in o) body` becomes a key snapshot plus an indexed `for` loop:
    ///
    /// ```javascript
    /// $obj_1 = o; $keys_2 = [];
    /// for ($key_3 in $obj_1) $keys_2.push($key_3);
    /// for ($idx_4 = 0; $idx_4 < $keys_2.length; $idx_4++) { k = $keys_2[$idx_4]; body }
    /// ```
    fn snapshot_for_in(
        &mut self,
        binding: &str,
        object: NodeIndex,
        body: NodeIndex,
        label: Option<String>,
    ) -> Vec<Item> {
        let obj = self.new_temp("obj");
        let keys = self.new_temp("keys");
        let key = self.new_temp("key");
        let index = self.new_temp("idx");
        let body_statements = self.arena.statements_of(body);

        let mut b = self.b();
        let target = b.temp(&obj);
        let assign = b.assign(target, object);
        let store_obj = b.expr_stmt(assign);

        let empty = b.array(Vec::new());
        let target = b.temp(&keys);
        let assign = b.assign(target, empty);
        let init_keys = b.expr_stmt(assign);

        let keys_ref = b.temp(&keys);
        let key_ref = b.temp(&key);
        let push = b.method_call(keys_ref, "push", vec![key_ref]);
        let push = b.expr_stmt(push);
        let source = b.temp(&obj);
        let collect = b.for_in(&key, false, source, push);

        let zero = b.number(0.0);
        let target = b.temp(&index);
        let init = b.assign(target, zero);
        let idx_ref = b.temp(&index);
        let keys_ref = b.temp(&keys);
        let length = b.prop(keys_ref, "length");
        let test = b.binary(BinaryOperator::LessThan, idx_ref, length);
        let idx_ref = b.temp(&index);
        let step = b.update(nodent_ast::UpdateOperator::Increment, false, idx_ref);
        let keys_ref = b.temp(&keys);
        let idx_ref = b.temp(&index);
        let current = b.elem(keys_ref, idx_ref);
        let bind = b.assign_named(binding, current);
        let bind = b.expr_stmt(bind);
        let mut loop_body = vec![bind];
        loop_body.extend(body_statements);
        let loop_body = b.block(loop_body);
        let indexed = b.node(NodeKind::For {
            initializer: init,
            condition: test,
            incrementor: step,
            body: loop_body,
            label,
        });

        vec![
            Item::Sync(store_obj),
            Item::Sync(init_keys),
            Item::Sync(collect),
            Item::Stmt(indexed),
        ]
    }

    /// ```javascript
    /// try { A } catch (e) { C } finally { F }
    /// ```
    /// becomes `$Try_n` (A, errors to `$Catch_n`), `$Catch_n(e)` (C, errors to
    /// `$TryErr_n`), `$Finally_n($fnext)` (F, then `$fnext()`) and
    /// `$TryErr_n($ex)` (F, then rethrow). Every exit of A and C that leaves
    /// the statement goes through `$Finally_n`.
    fn lower_try(
        &mut self,
        block: NodeIndex,
        catch_clause: NodeIndex,
        finally_block: NodeIndex,
        items: &mut VecDeque<Item>,
        frame: &Frame,
        tail: &Jump,
        seg: &mut Segment,
    ) {
        let span = self.span;
        let after = self.continuation(items, frame, tail, seg);

        let mut region = frame.clone();
        let mut completion = after.clone();
        let mut rethrow = None;
        if finally_block.is_some() {
            let finally_name = self.names.next("Finally");
            let next_param = self.names.next("fnext");
            let finally_items = self.statements(finally_block);
            let lowered =
                self.lower_items(finally_items, frame, &Jump::Call(next_param.clone()));
            let decl = self.segment_decl(&finally_name, vec![next_param], lowered, &frame.err);
            seg.decls.push(decl);

            let tryerr_name = self.names.next("TryErr");
            let ex_param = self.names.next("ex");
            self.span = span;
            let rethrow_body = {
                let mut b = self.b();
                let ex = b.ident(&ex_param);
                let call = b.call_named(&frame.err, vec![ex]);
                let ret = b.ret(call);
                let then = b.function_expr(None, &[], vec![ret]);
                let call = b.call_named(&finally_name, vec![then]);
                b.ret(call)
            };
            let segment = Segment {
                decls: Vec::new(),
                body: vec![rethrow_body],
            };
            let decl = self.segment_decl(&tryerr_name, vec![ex_param], segment, &frame.err);
            seg.decls.push(decl);

            region = self.through_finally(frame, &finally_name);
            completion = Jump::ViaFinally {
                finally: finally_name,
                inner: Box::new(after),
            };
            rethrow = Some(tryerr_name);
        }
        let outer_err = rethrow.clone().unwrap_or_else(|| frame.err.clone());

        let mut block_err = outer_err.clone();
        if let Some(NodeKind::CatchClause { param, block: handler }) =
            self.arena.kind(catch_clause).cloned()
        {
            let catch_name = self.names.next("Catch");
            let catch_frame = region.with_err(&outer_err);
            let handler_items = self.statements(handler);
            let lowered = self.lower_items(handler_items, &catch_frame, &completion);
            let decl = self.segment_decl(&catch_name, vec![param], lowered, &outer_err);
            seg.decls.push(decl);
            block_err = catch_name;
        }

        let try_name = self.names.next("Try");
        let try_frame = region.with_err(&block_err);
        let block_items = self.statements(block);
        let lowered = self.lower_items(block_items, &try_frame, &completion);
        let decl = self.segment_decl(&try_name, Vec::new(), lowered, &block_err);
        seg.decls.push(decl);

        self.span = span;
        let enter = self.emit_jump(&Jump::Call(try_name));
        seg.body.extend(enter);
    }

    /// Targets for code inside a `try` with a `finally`: every jump that
    /// leaves the statement runs the finally segment first.
    fn through_finally(&mut self, frame: &Frame, finally: &str) -> Frame {
        let value = self.new_temp("ret");
        let wrap = |jump: &Jump| Jump::ViaFinally {
            finally: finally.to_string(),
            inner: Box::new(jump.clone()),
        };
        Frame {
            ret: ReturnTarget::ViaFinally {
                finally: finally.to_string(),
                value,
                inner: Box::new(frame.ret.clone()),
            },
            err: frame.err.clone(),
            loops: frame
                .loops
                .iter()
                .map(|target| LoopTarget {
                    label: target.label.clone(),
                    brk: wrap(&target.brk),
                    cont: wrap(&target.cont),
                })
                .collect(),
        }
    }

    /// Identifiers that cannot change while suspended, and literals.
    pub(crate) fn is_stable(&self, idx: NodeIndex) -> bool {
        let Some(node) = self.arena.get(idx) else {
            return true;
        };
        match &node.kind {
            NodeKind::Literal(_) | NodeKind::Function(_) => true,
            NodeKind::Identifier { name } => {
                node.flags.contains(NodeFlags::TEMPORARY) || *name == self.this_name
            }
            _ => false,
        }
    }
}

/// `flag = state;`
fn set_flag(b: &mut AstBuilder<'_>, flag: &str, state: f64) -> NodeIndex {
    let target = b.temp(flag);
    let state = b.number(state);
    let assign = b.assign(target, state);
    b.expr_stmt(assign)
}

/// `flag === state`
fn flag_is(b: &mut AstBuilder<'_>, flag: &str, state: f64) -> NodeIndex {
    let current = b.temp(flag);
    let state = b.number(state);
    b.binary(BinaryOperator::StrictEqual, current, state)
}

fn requeue(items: &mut VecDeque<Item>, pre: Vec<Item>) {
    for item in pre.into_iter().rev() {
        items.push_front(item);
    }
}

/// A `try` with a `finally` whose protected code jumps out: the jump has to
/// run the finally block first, which only the segmented form can express.
fn has_finally_with_jump(arena: &NodeArena, stmt: NodeIndex) -> bool {
    let mut found = false;
    visit_body(arena, stmt, &mut |_, kind| {
        if let NodeKind::Try {
            block,
            catch_clause,
            finally_block,
        } = kind
        {
            if finally_block.is_some()
                && (contains_jump(arena, *block) || contains_jump(arena, *catch_clause))
            {
                found = true;
            }
        }
    });
    found
}

fn contains_jump(arena: &NodeArena, idx: NodeIndex) -> bool {
    let mut found = false;
    visit_body(arena, idx, &mut |_, kind| {
        if matches!(
            kind,
            NodeKind::Return { .. } | NodeKind::Break { .. } | NodeKind::Continue { .. }
        ) {
            found = true;
        }
    });
    found
}
