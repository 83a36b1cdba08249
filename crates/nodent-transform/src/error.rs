use nodent_common::Diagnostic;
use thiserror::Error;

/// Problems with the resolved configuration. Raised before any tree work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown compiler option '{0}'")]
    UnknownOption(String),

    #[error("option '{key}' expects {expected}")]
    InvalidValue { key: String, expected: &'static str },

    #[error("'{value}' is not a valid identifier for the {role} symbol")]
    InvalidSymbol { role: &'static str, value: String },

    #[error("symbol '{0}' is used for more than one injected name")]
    DuplicateSymbol(String),

    #[error("no target mode selected (expected one of es7, promises, generators, engine)")]
    NoTargetMode,

    #[error("unknown option set '{0}'")]
    UnknownOptionSet(String),

    #[error("option set '{0}' is a preset and cannot be redefined")]
    PresetOverwrite(String),

    #[error("option document must be a JSON object: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum TransformError {
    #[error("{}", render_diagnostics(.0))]
    Structural(Vec<Diagnostic>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("syntax tree nesting depth {depth} exceeds the limit of {limit}")]
    TooDeep { depth: u32, limit: u32 },
}

impl TransformError {
    /// Diagnostics carried by a structural failure; empty otherwise.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TransformError::Structural(diags) => diags,
            _ => &[],
        }
    }

    pub fn codes(&self) -> Vec<u32> {
        self.diagnostics().iter().map(|d| d.code).collect()
    }
}

fn render_diagnostics(diags: &[Diagnostic]) -> String {
    diags
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
