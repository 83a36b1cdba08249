//! Centralized limits and thresholds for the transform and the runtime.
//!
//! These prevent stack overflow in recursive tree walks and runaway loops in
//! the scheduler. Keeping them in one place makes them easy to tune.

// =============================================================================
// Recursion Depth Limits (Transform)
// =============================================================================

/// Maximum nesting depth the transform will descend into.
///
/// Trees deeper than this are rejected rather than risking a stack overflow
/// in the recursive lowering of statements and expressions.
pub const MAX_TRANSFORM_DEPTH: u32 = 1000;

// =============================================================================
// Runtime Limits
// =============================================================================

/// Maximum number of jobs a single `run_until_idle` drain will execute.
///
/// A continuation chain that keeps scheduling itself forever (for example an
/// async `while (true)` loop over already-settled values) is stopped here
/// instead of hanging the host.
pub const MAX_SCHEDULER_JOBS: usize = 10_000_000;

/// Maximum length of a thenable adoption chain checked for cycles.
pub const MAX_ADOPTION_CHAIN: usize = 100_000;

/// Maximum call depth of the reference evaluator.
pub const MAX_EVAL_CALL_DEPTH: u32 = 400;
