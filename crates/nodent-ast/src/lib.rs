//! Arena-backed syntax tree for the nodent async transform.
//!
//! Nodes live in a `NodeArena` and are addressed by `NodeIndex`. The arena
//! keeps an explicit parent-index map, so in-place rewriting is done by
//! rebinding a parent's child slot rather than through back-links.

pub mod arena;
pub mod builder;
pub mod node;
pub mod printer;
pub mod walk;

pub use arena::NodeArena;
pub use builder::AstBuilder;
pub use node::{
    AssignOperator, BinaryOperator, FunctionData, Literal, LogicalOperator, Node, NodeFlags,
    NodeIndex, NodeKind, NodeList, UnaryOperator, UpdateOperator,
};
pub use printer::{DebugPrinter, PrintedTree};
pub use walk::{Suspension, contains_suspension};
