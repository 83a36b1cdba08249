//! async/await desugaring.
//!
//! The transform takes an arena tree and a resolved `CompileOptions` and
//! rewrites every async function so it runs on the nodent runtime:
//!
//! - `resolver` turns named option sets plus project/inline JSON into options
//! - `discovery` finds async functions and rejects invalid trees
//! - `prepare` hoists declarations and captures `this`/`arguments`
//! - `lower` and `flatten` split bodies into continuation segments
//! - `transform` emits the per-target wrapper

pub mod discovery;
pub mod error;
mod flatten;
mod lower;
mod names;
pub mod options;
mod prepare;
pub mod resolver;
pub mod transform;

pub use discovery::{AsyncUnit, discover_async_functions, discover_generators, validate};
pub use error::{ConfigError, TransformError};
pub use options::{CompileOptions, SymbolNames, TargetMode, is_identifier};
pub use resolver::{OptionResolver, OptionSet};
pub use transform::{
    PositionMapping, TransformOutput, TransformStats, lower_host_generators, transform,
};
