//! The runtime surface generated code is allowed to reference.
//!
//! Each entry point is a callable value; a host binds them under whatever
//! symbol names the compilation used.

use crate::asyncify::asyncify;
use crate::bind::{async_bind, make_thenable};
use crate::generator::continuation_generator;
use crate::scheduler::Runtime;
use crate::spawn::async_spawn;
use crate::value::{Value, arg};

#[derive(Clone, Debug)]
pub struct EntryPoints {
    /// `$asyncbind(this, body[, onReturn, onError])`
    pub async_bind: Value,
    /// `$asyncspawn(this, genfn)`
    pub async_spawn: Value,
    /// `$makeThenable(value)`
    pub make_thenable: Value,
    /// `$generator(this, body)`
    pub generator: Value,
    /// `asyncify(fn)`
    pub asyncify: Value,
}

impl EntryPoints {
    pub fn new(runtime: &Runtime) -> EntryPoints {
        let rt = runtime.clone();
        let async_bind = Value::native("$asyncbind", move |_, args| {
            async_bind(&rt, arg(args, 0), arg(args, 1), arg(args, 2), arg(args, 3))
        });
        let rt = runtime.clone();
        let async_spawn = Value::native("$asyncspawn", move |_, args| {
            async_spawn(&rt, arg(args, 0), arg(args, 1))
        });
        let rt = runtime.clone();
        let make_thenable = Value::native("$makeThenable", move |_, args| {
            Ok(Value::Thenable(make_thenable(&rt, arg(args, 0))))
        });
        let generator = Value::native("$generator", move |_, args| {
            continuation_generator(arg(args, 0), arg(args, 1))
        });
        let rt = runtime.clone();
        let asyncify = Value::native("asyncify", move |_, args| asyncify(&rt, arg(args, 0)));
        EntryPoints {
            async_bind,
            async_spawn,
            make_thenable,
            generator,
            asyncify,
        }
    }
}
