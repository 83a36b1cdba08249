//! Common types and utilities for the nodent async transform.
//!
//! This crate provides foundational types used across all nodent crates:
//! - Diagnostics for structural (transform-time) errors
//! - Source spans and line maps
//! - Source map generation (VLQ mappings)
//! - Limits and thresholds shared by the transform and the runtime

// Diagnostics reported by the transform
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, diagnostic_codes};

// Span - Source location tracking (byte offsets + line/column)
pub mod position;
pub use position::{LineMap, SourcePosition, Span};

// Centralized limits and thresholds
pub mod limits;

// Source Map generation
pub mod source_map;
