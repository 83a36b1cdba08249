use nodent_runtime::RuntimeFault;

/// Failures surfaced to the host running evaluated code.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// A value was thrown and nothing in the evaluated code caught it.
    #[error("uncaught exception: {message}")]
    Uncaught { message: String },
    #[error("node {0} is not a program")]
    NotAProgram(u32),
    #[error("no global named '{0}'")]
    UnknownGlobal(String),
    /// The cell was still pending after the scheduler went idle.
    #[error("settlement cell never settled")]
    NeverSettled,
    #[error(transparent)]
    Runtime(#[from] RuntimeFault),
}
