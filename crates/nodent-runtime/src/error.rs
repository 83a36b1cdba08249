//! Runtime error values and faults.
//!
//! Errors thrown inside generated code are ordinary `Value`s. The runtime
//! raises its own errors as `ErrorValue`s so that user code can catch them.
//! A `RuntimeFault` is different: it is returned to the host when an
//! orphaned rejection escalates or the scheduler exceeds its budget.

use crate::value::Value;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    RangeError,
    /// A cell was resolved with itself, directly or through an adoption chain.
    ThenableCycle,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ThenableCycle => "ThenableCycleError",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorValue {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind.name())
        } else {
            write!(f, "{}: {}", self.kind.name(), self.message)
        }
    }
}

impl Value {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Value {
        Value::Error(Rc::new(ErrorValue {
            kind,
            message: message.into(),
        }))
    }

    pub fn type_error(message: impl Into<String>) -> Value {
        Value::error(ErrorKind::TypeError, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Value {
        Value::error(ErrorKind::ReferenceError, message)
    }

    pub fn range_error(message: impl Into<String>) -> Value {
        Value::error(ErrorKind::RangeError, message)
    }

    /// The `ErrorKind` if this value is a runtime error.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(err) => Some(err.kind),
            _ => None,
        }
    }
}

/// Faults surfaced to the host from `Runtime::run_until_idle`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeFault {
    /// A rejection reached no handler and the fallback hook escalated it.
    #[error("unhandled rejection: {reason}")]
    UnhandledRejection { reason: String },
    /// The job queue kept refilling past the configured budget.
    #[error("scheduler exceeded {limit} jobs without becoming idle")]
    JobLimitExceeded { limit: usize },
}
