//! Diagnostic types and message lookup for the async transform.
//!
//! Structural errors found while transforming a compilation unit are reported
//! as `Diagnostic` records carrying the offending node's source position.

use serde::Serialize;

/// Severity. Structural problems are always errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub file: String,
    pub start: u32,
    pub length: u32,
    /// 0-indexed line of `start`, when the tree carried line information.
    pub line: u32,
    /// 0-indexed column of `start`.
    pub column: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

impl Diagnostic {
    #[must_use]
    pub fn error(file: impl Into<String>, span: crate::Span, message: String, code: u32) -> Self {
        Self {
            file: file.into(),
            start: span.pos,
            length: span.len(),
            line: span.line,
            column: span.column,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
        }
    }

    /// Error for a registered code with its `{n}` placeholders filled from `args`.
    #[must_use]
    pub fn from_code(file: impl Into<String>, span: crate::Span, code: u32, args: &[&str]) -> Self {
        let template = message_template(code).unwrap_or("Unknown diagnostic.");
        Self::error(file, span, fill_placeholders(template, args), code)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({},{}): error NA{}: {}",
            self.file,
            self.line + 1,
            self.column + 1,
            self.code,
            self.message_text
        )
    }
}

fn fill_placeholders(template: &str, args: &[&str]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |text, (i, arg)| {
            text.replace(&format!("{{{i}}}"), arg)
        })
}

pub mod diagnostic_codes {
    pub const CONTINUE_OUTSIDE_LOOP: u32 = 1104;
    pub const BREAK_OUTSIDE_LOOP: u32 = 1105;
    pub const JUMP_TO_UNKNOWN_LABEL: u32 = 1116;
    pub const YIELD_OUTSIDE_GENERATOR: u32 = 1163;
    pub const AWAIT_OUTSIDE_ASYNC: u32 = 1308;
    pub const ASYNC_GENERATOR_UNSUPPORTED: u32 = 9001;
    pub const YIELD_IN_ASYNC_FUNCTION: u32 = 9002;
    pub const DELEGATING_YIELD_UNSUPPORTED: u32 = 9003;
}

static MESSAGES: &[(u32, &str)] = &[
    (
        diagnostic_codes::CONTINUE_OUTSIDE_LOOP,
        "A 'continue' statement can only be used within an enclosing iteration statement.",
    ),
    (
        diagnostic_codes::BREAK_OUTSIDE_LOOP,
        "A 'break' statement can only be used within an enclosing iteration statement.",
    ),
    (
        diagnostic_codes::JUMP_TO_UNKNOWN_LABEL,
        "A '{0}' statement can only jump to a label of an enclosing statement: '{1}'.",
    ),
    (
        diagnostic_codes::YIELD_OUTSIDE_GENERATOR,
        "A 'yield' expression is only allowed in a generator body.",
    ),
    (
        diagnostic_codes::AWAIT_OUTSIDE_ASYNC,
        "'await' expressions are only allowed within async functions.",
    ),
    (
        diagnostic_codes::ASYNC_GENERATOR_UNSUPPORTED,
        "Async generator functions are not supported by the '{0}' target mode.",
    ),
    (
        diagnostic_codes::YIELD_IN_ASYNC_FUNCTION,
        "A 'yield' expression cannot appear in an async function that is not a generator.",
    ),
    (
        diagnostic_codes::DELEGATING_YIELD_UNSUPPORTED,
        "Delegating 'yield*' is not supported when lowering generators for the host.",
    ),
];

/// Message template for a code, with `{0}`, `{1}`, ... placeholders.
#[must_use]
pub fn message_template(code: u32) -> Option<&'static str> {
    MESSAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, message)| *message)
}
