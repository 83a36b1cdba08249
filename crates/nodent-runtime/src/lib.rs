//! Continuation runtime for code produced by the nodent async transform.
//!
//! - [`Thenable`] - settlement cell, standard or eager
//! - [`Runtime`] - job scheduler and orphaned-rejection tracking
//! - [`bind`] - Bind Driver (`$asyncbind`) and `$makeThenable`
//! - [`spawn`] - Spawn Driver (`$asyncspawn`)
//! - [`generator`] - generator protocol and continuation-backed generators
//! - [`hook`] - the process-wide fallback error hook

pub mod asyncify;
pub mod bind;
pub mod entry;
pub mod error;
pub mod generator;
pub mod hook;
pub mod scheduler;
pub mod spawn;
pub mod thenable;
pub mod value;

pub use entry::EntryPoints;
pub use error::{ErrorKind, ErrorValue, RuntimeFault};
pub use generator::{Generator, GeneratorRef, GeneratorStep, Resumption};
pub use hook::{HookVerdict, reset_fallback_error_hook, set_fallback_error_hook};
pub use scheduler::{DrainStats, Runtime, RuntimeOptions};
pub use thenable::{CellKind, CellState, Outcome, Thenable};
pub use value::{Callable, NativeFunction, Value};
