//! Wrap Node-style callback-last functions so they return settlement cells.

use crate::scheduler::Runtime;
use crate::value::{Value, arg};

/// `asyncify(fn)`: the returned function calls `fn(...args, cb)` and settles
/// its cell from `cb(err, result)`. A synchronous throw rejects the cell.
pub fn asyncify(runtime: &Runtime, callback_fn: Value) -> Result<Value, Value> {
    if !callback_fn.is_callable() {
        return Err(Value::type_error("asyncify: argument is not a function"));
    }
    let runtime = runtime.clone();
    Ok(Value::native("asyncified", move |this, args| {
        let cell = runtime.cell();
        let settle = cell.clone();
        let callback = Value::native("callback", move |_, cb_args| {
            let err = arg(cb_args, 0);
            if err.is_nullish() {
                settle.settle_ok(arg(cb_args, 1));
            } else {
                settle.settle_error(err);
            }
            Ok(Value::Undefined)
        });
        let mut call_args = args.to_vec();
        call_args.push(callback);
        if let Err(thrown) = callback_fn.call(this, &call_args) {
            cell.settle_error(thrown);
        }
        Ok(Value::Thenable(cell))
    }))
}
