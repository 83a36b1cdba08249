//! Bind Driver.
//!
//! Generated async functions end in
//! `return $asyncbind(this, function ($return, $error) { ... }, $return, $error)`.
//! When the caller supplied continuations they are used as-is. Otherwise the
//! driver manufactures a settlement cell, hands the body functions that
//! settle it, and returns the cell. Either way the body starts in the
//! caller's own turn.

use crate::scheduler::Runtime;
use crate::thenable::Thenable;
use crate::value::{Value, arg};

/// `$asyncbind(this, body[, onReturn, onError])`
#[tracing::instrument(level = "trace", skip_all)]
pub fn async_bind(
    runtime: &Runtime,
    this: Value,
    body: Value,
    on_return: Value,
    on_error: Value,
) -> Result<Value, Value> {
    if !body.is_callable() {
        return Err(Value::type_error("$asyncbind: body is not a function"));
    }

    if on_return.is_callable() {
        let on_error = if on_error.is_callable() {
            on_error
        } else {
            orphan_reporter(runtime)
        };
        if let Err(thrown) = body.call(this, &[on_return, on_error.clone()]) {
            on_error.call(Value::Undefined, &[thrown])?;
        }
        return Ok(Value::Undefined);
    }

    let cell = runtime.cell();
    let (resolve, reject) = settling_functions(&cell);
    if let Err(thrown) = body.call(this, &[resolve, reject]) {
        cell.settle_error(thrown);
    }
    Ok(Value::Thenable(cell))
}

/// `$makeThenable(v)`: `v` itself when it is already a cell, otherwise a new
/// cell resolved with `v` (adopting foreign thenables).
pub fn make_thenable(runtime: &Runtime, value: Value) -> Thenable {
    match value {
        Value::Thenable(cell) => cell,
        other => runtime.resolved(other),
    }
}

/// Functions that fulfil and reject `cell`.
pub fn settling_functions(cell: &Thenable) -> (Value, Value) {
    let ok = cell.clone();
    let resolve = Value::native("$return", move |_, args| {
        ok.settle_ok(arg(args, 0));
        Ok(Value::Undefined)
    });
    let err = cell.clone();
    let reject = Value::native("$error", move |_, args| {
        err.settle_error(arg(args, 0));
        Ok(Value::Undefined)
    });
    (resolve, reject)
}

/// Error continuation used when a callback-style caller passed none.
fn orphan_reporter(runtime: &Runtime) -> Value {
    let runtime = runtime.clone();
    Value::native("$error", move |_, args| {
        runtime.report_orphan(&arg(args, 0));
        Ok(Value::Undefined)
    })
}
