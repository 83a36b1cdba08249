//! Discovery and structural validation.
//!
//! Finds the async functions of a unit (innermost first) and rejects trees
//! the segmentation engine cannot handle. Every problem is collected before
//! the unit fails.

use crate::options::TargetMode;
use nodent_ast::walk::{Suspension, functions_postorder, suspension_points};
use nodent_ast::{NodeArena, NodeIndex, NodeKind};
use nodent_common::{Diagnostic, diagnostic_codes};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FunctionContext {
    TopLevel,
    Plain,
    Async,
    Generator,
    AsyncGenerator,
}

impl FunctionContext {
    fn allows_await(self) -> bool {
        matches!(
            self,
            FunctionContext::Async | FunctionContext::AsyncGenerator
        )
    }

    fn allows_yield(self) -> bool {
        matches!(
            self,
            FunctionContext::Generator | FunctionContext::AsyncGenerator
        )
    }
}

/// A function to be rewritten, with the suspension points it owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsyncUnit {
    pub function: NodeIndex,
    pub suspension_points: Vec<NodeIndex>,
}

/// Async functions under `root`, innermost first so that nested units are
/// rewritten before the bodies that contain them.
pub fn discover_async_functions(arena: &NodeArena, root: NodeIndex) -> Vec<AsyncUnit> {
    functions_postorder(arena, root)
        .into_iter()
        .filter_map(|function| {
            let func = arena.get_function(function)?;
            if !func.is_async {
                return None;
            }
            Some(AsyncUnit {
                function,
                suspension_points: suspension_points(arena, func.body, Suspension::Await),
            })
        })
        .collect()
}

/// Generator functions (not async) under `root`, innermost first.
pub fn discover_generators(arena: &NodeArena, root: NodeIndex) -> Vec<NodeIndex> {
    functions_postorder(arena, root)
        .into_iter()
        .filter(|&f| {
            arena
                .get_function(f)
                .is_some_and(|func| func.is_generator && !func.is_async)
        })
        .collect()
}

pub fn validate(
    arena: &NodeArena,
    root: NodeIndex,
    target: TargetMode,
    file: &str,
) -> Vec<Diagnostic> {
    let mut validator = Validator {
        arena,
        file,
        target,
        diagnostics: Vec::new(),
    };
    let mut loops = Vec::new();
    validator.walk(root, FunctionContext::TopLevel, &mut loops);
    validator.diagnostics
}

struct Validator<'a> {
    arena: &'a NodeArena,
    file: &'a str,
    target: TargetMode,
    diagnostics: Vec<Diagnostic>,
}

impl Validator<'_> {
    fn report(&mut self, idx: NodeIndex, code: u32, args: &[&str]) {
        let span = self.arena.span(idx);
        self.diagnostics
            .push(Diagnostic::from_code(self.file, span, code, args));
    }

    fn walk(&mut self, idx: NodeIndex, context: FunctionContext, loops: &mut Vec<Option<String>>) {
        let arena = self.arena;
        let Some(node) = arena.get(idx) else {
            return;
        };
        match &node.kind {
            NodeKind::Function(func) => {
                let inner = match (func.is_async, func.is_generator) {
                    (true, true) => {
                        if self.target != TargetMode::EngineNative {
                            self.report(
                                idx,
                                diagnostic_codes::ASYNC_GENERATOR_UNSUPPORTED,
                                &[self.target.name()],
                            );
                        }
                        FunctionContext::AsyncGenerator
                    }
                    (true, false) => FunctionContext::Async,
                    (false, true) => FunctionContext::Generator,
                    (false, false) => FunctionContext::Plain,
                };
                let mut inner_loops = Vec::new();
                self.walk(func.body, inner, &mut inner_loops);
                return;
            }
            NodeKind::Await { .. } if !context.allows_await() => {
                self.report(idx, diagnostic_codes::AWAIT_OUTSIDE_ASYNC, &[]);
            }
            NodeKind::Yield { .. } if !context.allows_yield() => {
                let code = if context == FunctionContext::Async {
                    diagnostic_codes::YIELD_IN_ASYNC_FUNCTION
                } else {
                    diagnostic_codes::YIELD_OUTSIDE_GENERATOR
                };
                self.report(idx, code, &[]);
            }
            NodeKind::Break { label } => {
                self.check_jump(idx, "break", label.as_deref(), loops);
            }
            NodeKind::Continue { label } => {
                self.check_jump(idx, "continue", label.as_deref(), loops);
            }
            kind => {
                if let Some(label) = kind.loop_label() {
                    loops.push(label.map(str::to_string));
                    kind.for_each_child(|child| self.walk(child, context, loops));
                    loops.pop();
                    return;
                }
            }
        }
        node.kind
            .for_each_child(|child| self.walk(child, context, loops));
    }

    fn check_jump(
        &mut self,
        idx: NodeIndex,
        keyword: &str,
        label: Option<&str>,
        loops: &[Option<String>],
    ) {
        match label {
            Some(label) => {
                if !loops.iter().any(|l| l.as_deref() == Some(label)) {
                    self.report(idx, diagnostic_codes::JUMP_TO_UNKNOWN_LABEL, &[keyword, label]);
                }
            }
            None if loops.is_empty() => {
                let code = if keyword == "break" {
                    diagnostic_codes::BREAK_OUTSIDE_LOOP
                } else {
                    diagnostic_codes::CONTINUE_OUTSIDE_LOOP
                };
                self.report(idx, code, &[]);
            }
            None => {}
        }
    }
}
