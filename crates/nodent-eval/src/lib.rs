//! Reference evaluator for transform output.
//!
//! Runs arena trees directly against `nodent-runtime`, so tests can check
//! that a transformed program behaves like the original: same values, same
//! ordering, same exceptions. It covers the subset of the language the
//! transform emits and the test corpus writes (function-scoped `var`,
//! closures, `this`/`arguments`, objects and arrays, `try/catch/finally`,
//! labeled loops, `for...in`, `new Error(..)`), nothing more.
//!
//! Async and generator functions must be transformed or lowered before they
//! are evaluated; calling one directly throws a `TypeError`.

mod error;
mod interpreter;
mod operators;
pub mod scope;

pub use error::EvalError;
pub use interpreter::Completion;

use interpreter::Context;
use nodent_ast::{NodeArena, NodeIndex, NodeKind};
use nodent_runtime::value::arg;
use nodent_runtime::{EntryPoints, ErrorKind, Outcome, Runtime, Value};
use std::rc::Rc;

/// Owns a tree and a global scope, and runs programs from the tree.
pub struct Evaluator {
    ctx: Rc<Context>,
    runtime: Runtime,
}

impl Evaluator {
    /// Take ownership of `arena` and install the default globals: the
    /// runtime entry points under their standard names and the error
    /// constructors.
    pub fn new(arena: NodeArena, runtime: &Runtime) -> Evaluator {
        let evaluator = Evaluator {
            ctx: Rc::new(Context::new(arena)),
            runtime: runtime.clone(),
        };
        let entry = EntryPoints::new(runtime);
        evaluator.define_global("$asyncbind", entry.async_bind);
        evaluator.define_global("$asyncspawn", entry.async_spawn);
        evaluator.define_global("$makeThenable", entry.make_thenable);
        evaluator.define_global("$generator", entry.generator);
        evaluator.define_global("asyncify", entry.asyncify);
        for kind in [
            ErrorKind::Error,
            ErrorKind::TypeError,
            ErrorKind::ReferenceError,
            ErrorKind::RangeError,
        ] {
            evaluator.define_global(kind.name(), error_constructor(kind));
        }
        evaluator
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn arena(&self) -> &NodeArena {
        &self.ctx.arena
    }

    pub fn define_global(&self, name: &str, value: Value) {
        self.ctx.globals.declare(name, value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.ctx.globals.lookup(name)
    }

    /// Run the `Program` at `root` in the global scope. Returns the value of
    /// the last expression statement, the way `eval` would.
    #[tracing::instrument(level = "debug", skip(self), fields(root = root.0))]
    pub fn run_program(&self, root: NodeIndex) -> Result<Value, EvalError> {
        let statements = match self.ctx.arena.kind(root) {
            Some(NodeKind::Program { body }) => body.nodes.clone(),
            _ => return Err(EvalError::NotAProgram(root.0)),
        };
        self.ctx.hoist(root, &self.ctx.globals);
        match self.ctx.exec_list(&statements, &self.ctx.globals) {
            Ok(Completion::Normal(value)) | Ok(Completion::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::Undefined),
            Err(thrown) => Err(uncaught(&thrown)),
        }
    }

    /// Call a global function with `this` undefined.
    pub fn call_global(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let function = self
            .global(name)
            .ok_or_else(|| EvalError::UnknownGlobal(name.to_string()))?;
        function
            .call(Value::Undefined, args)
            .map_err(|thrown| uncaught(&thrown))
    }

    /// Drain the scheduler and report how `value` settled. A non-cell value
    /// counts as already fulfilled.
    pub fn settle(&self, value: &Value) -> Result<Outcome, EvalError> {
        let Some(cell) = value.as_thenable() else {
            self.runtime.run_until_idle()?;
            return Ok(Ok(value.clone()));
        };
        // The host is observing this cell, so its rejection is not orphaned.
        cell.mark_handled();
        self.runtime.run_until_idle()?;
        cell.outcome().ok_or(EvalError::NeverSettled)
    }
}

fn uncaught(thrown: &Value) -> EvalError {
    tracing::debug!(thrown = %thrown.to_display_string(), "uncaught exception");
    EvalError::Uncaught {
        message: thrown.to_display_string(),
    }
}

/// `Error(message)` and `new Error(message)` both produce an error value.
fn error_constructor(kind: ErrorKind) -> Value {
    Value::native(kind.name(), move |_, args| {
        let message = match arg(args, 0) {
            Value::Undefined => String::new(),
            other => other.to_display_string(),
        };
        Ok(Value::error(kind, message))
    })
}
