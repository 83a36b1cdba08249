//! Resolved compile configuration read by the transform.

use crate::error::ConfigError;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output encoding for suspension points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetMode {
    /// `function f(a, $return, $error)` bodies driven by `$asyncbind`; callable
    /// with callbacks or without (then a cell is returned).
    #[default]
    CallbackBind,
    /// Same segmentation, but the generated function always returns a cell.
    Promise,
    /// `await` becomes `yield` inside a generator driven by `$asyncspawn`.
    Generator,
    /// Async functions are left for the host to run.
    EngineNative,
}

impl TargetMode {
    pub fn name(self) -> &'static str {
        match self {
            TargetMode::CallbackBind => "es7",
            TargetMode::Promise => "promises",
            TargetMode::Generator => "generators",
            TargetMode::EngineNative => "engine",
        }
    }

    /// Modes whose output segments the body into continuation functions.
    pub fn uses_bind_driver(self) -> bool {
        matches!(self, TargetMode::CallbackBind | TargetMode::Promise)
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names of the identifiers the generated code injects or calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolNames {
    #[serde(rename = "$return")]
    pub return_name: String,
    #[serde(rename = "$error")]
    pub error_name: String,
    #[serde(rename = "$arguments")]
    pub arguments_name: String,
    #[serde(rename = "$asyncbind")]
    pub async_bind: String,
    #[serde(rename = "$asyncspawn")]
    pub async_spawn: String,
    #[serde(rename = "$makeThenable")]
    pub make_thenable: String,
    #[serde(rename = "$generator")]
    pub generator: String,
    /// Prefix of every other generated name (segments, temporaries).
    #[serde(rename = "generatedSymbolPrefix")]
    pub prefix: String,
}

impl Default for SymbolNames {
    fn default() -> Self {
        SymbolNames {
            return_name: "$return".to_string(),
            error_name: "$error".to_string(),
            arguments_name: "$args".to_string(),
            async_bind: "$asyncbind".to_string(),
            async_spawn: "$asyncspawn".to_string(),
            make_thenable: "$makeThenable".to_string(),
            generator: "$generator".to_string(),
            prefix: "$".to_string(),
        }
    }
}

impl SymbolNames {
    /// Name used for the captured `this`.
    pub fn this_name(&self) -> String {
        format!("{}this", self.prefix)
    }

    fn roles(&self) -> [(&'static str, &str); 7] {
        [
            ("result-continuation", &self.return_name),
            ("error-continuation", &self.error_name),
            ("captured-arguments", &self.arguments_name),
            ("bind-entry", &self.async_bind),
            ("spawn-entry", &self.async_spawn),
            ("cell-constructor", &self.make_thenable),
            ("generator-entry", &self.generator),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = FxHashSet::default();
        for (role, name) in self.roles() {
            if !is_identifier(name) {
                return Err(ConfigError::InvalidSymbol {
                    role,
                    value: name.to_string(),
                });
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateSymbol(name.to_string()));
            }
        }
        // The prefix only has to produce identifiers when something is appended.
        let sample = format!("{}x", self.prefix);
        if !is_identifier(&sample) {
            return Err(ConfigError::InvalidSymbol {
                role: "generated-prefix",
                value: self.prefix.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub target: TargetMode,
    #[serde(flatten)]
    pub symbols: SymbolNames,
    /// Pass awaited values through `$makeThenable` so plain values can be awaited.
    pub wrap_await: bool,
    /// Collect synthesized-node position correspondences.
    pub source_positions: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            target: TargetMode::default(),
            symbols: SymbolNames::default(),
            wrap_await: true,
            source_positions: false,
        }
    }
}

impl CompileOptions {
    pub fn new(target: TargetMode) -> CompileOptions {
        CompileOptions {
            target,
            ..CompileOptions::default()
        }
    }

    pub fn with_source_positions(mut self, on: bool) -> CompileOptions {
        self.source_positions = on;
        self
    }

    pub fn with_wrap_await(mut self, on: bool) -> CompileOptions {
        self.wrap_await = on;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.symbols.validate()
    }
}

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield", "await", "let", "static", "enum",
];

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') && !RESERVED.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_symbols_are_valid() {
        assert!(CompileOptions::default().validate().is_ok());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("$return"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("return"));
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let mut options = CompileOptions::default();
        options.symbols.error_name = "$return".to_string();
        assert_eq!(
            options.validate(),
            Err(ConfigError::DuplicateSymbol("$return".to_string()))
        );
    }

    #[test]
    fn test_bad_prefix_rejected() {
        let mut options = CompileOptions::default();
        options.symbols.prefix = "9".to_string();
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidSymbol { role: "generated-prefix", .. })
        ));
    }
}
