//! Named option sets and the merge policy that turns a directive into a
//! resolved `CompileOptions`.
//!
//! A unit selects a set by name (`"use nodent-promises"` selects `promises`).
//! The set is merged with project-level overrides and then with an inline
//! JSON literal; later layers win key by key. Flags are then normalised:
//! `generators`/`engine` imply `promises`, which implies `es7`. A request
//! for both promise-style and generator-style output cannot be honoured and
//! falls back to the plain `es7` set.

use crate::error::ConfigError;
use crate::options::{CompileOptions, SymbolNames, TargetMode};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

pub type OptionSet = Map<String, Value>;

/// Keys read by the option resolver.
const KNOWN_KEYS: &[&str] = &[
    "es7",
    "promises",
    "generators",
    "engine",
    "wrapAwait",
    "sourcemap",
    "$return",
    "$error",
    "$arguments",
    "$asyncbind",
    "$asyncspawn",
    "$makeThenable",
    "$generator",
    "generatedSymbolPrefix",
];

/// Keys owned by other collaborators (parser, loader, emitter).
const IGNORED_KEYS: &[&str] = &[
    "parser",
    "mapStartLine",
    "noRuntime",
    "lazyThenables",
    "es6target",
    "noUseDirective",
];

const FLAG_KEYS: &[&str] = &["es7", "promises", "generators", "engine"];

#[derive(Clone, Debug)]
pub struct OptionResolver {
    sets: IndexMap<String, OptionSet>,
    presets: FxHashSet<String>,
}

impl Default for OptionResolver {
    fn default() -> Self {
        OptionResolver::new()
    }
}

impl OptionResolver {
    pub fn new() -> OptionResolver {
        let mut sets = IndexMap::new();
        sets.insert("default".to_string(), flags(&[("es7", true)]));
        sets.insert("es7".to_string(), flags(&[("es7", true)]));
        let promise = flags(&[("es7", true), ("promises", true)]);
        sets.insert("promise".to_string(), promise.clone());
        sets.insert("promises".to_string(), promise);
        let generator = flags(&[("es7", false), ("generators", true)]);
        sets.insert("generator".to_string(), generator.clone());
        sets.insert("generators".to_string(), generator);
        sets.insert(
            "engine".to_string(),
            flags(&[("es7", true), ("engine", true), ("promises", true)]),
        );
        let presets = sets.keys().cloned().collect();
        OptionResolver { sets, presets }
    }

    /// Register an additional named set. Preset names cannot be redefined.
    pub fn register_set(&mut self, name: &str, options: Value) -> Result<(), ConfigError> {
        if self.presets.contains(name) {
            return Err(ConfigError::PresetOverwrite(name.to_string()));
        }
        let options = as_object(options)?;
        check_keys(&options)?;
        self.sets.insert(name.to_string(), options);
        Ok(())
    }

    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Merge `set` with optional project and inline layers and resolve.
    pub fn resolve(
        &self,
        set: &str,
        project: Option<&Value>,
        inline: Option<&Value>,
    ) -> Result<CompileOptions, ConfigError> {
        let base = self
            .sets
            .get(set)
            .ok_or_else(|| ConfigError::UnknownOptionSet(set.to_string()))?;

        let mut merged = base.clone();
        for layer in [project, inline].into_iter().flatten() {
            let layer = as_object(layer.clone())?;
            check_keys(&layer)?;
            merged.extend(layer);
        }

        if !FLAG_KEYS.iter().any(|k| flag(&merged, k)) {
            return Err(ConfigError::NoTargetMode);
        }
        if (flag(&merged, "promises") || flag(&merged, "es7")) && flag(&merged, "generators") {
            tracing::warn!(set, "conflicting target flags, assuming es7 mode");
            merged = self.sets.get("es7").cloned().unwrap_or_default();
        }
        if flag(&merged, "generators") || flag(&merged, "engine") {
            merged.insert("promises".to_string(), Value::Bool(true));
        }
        if flag(&merged, "promises") {
            merged.insert("es7".to_string(), Value::Bool(true));
        }

        let options = build_options(&merged)?;
        tracing::debug!(set, target = %options.target, "resolved compile options");
        Ok(options)
    }

    /// `resolve` with JSON text layers, as read from a directive or manifest.
    pub fn resolve_str(
        &self,
        set: &str,
        project: Option<&str>,
        inline: Option<&str>,
    ) -> Result<CompileOptions, ConfigError> {
        let parse = |text: &str| {
            serde_json::from_str::<Value>(text).map_err(|e| ConfigError::Malformed(e.to_string()))
        };
        let project = project.map(parse).transpose()?;
        let inline = inline.map(parse).transpose()?;
        self.resolve(set, project.as_ref(), inline.as_ref())
    }
}

fn flags(pairs: &[(&str, bool)]) -> OptionSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::Bool(*v)))
        .collect()
}

fn flag(options: &OptionSet, key: &str) -> bool {
    match options.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Null) | None => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn as_object(value: Value) -> Result<OptionSet, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ConfigError::Malformed(format!("found {other}"))),
    }
}

fn check_keys(options: &OptionSet) -> Result<(), ConfigError> {
    for key in options.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) && !IGNORED_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::UnknownOption(key.clone()));
        }
    }
    Ok(())
}

fn bool_value(options: &OptionSet, key: &str, default: bool) -> Result<bool, ConfigError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            expected: "a boolean",
        }),
    }
}

fn string_value(options: &OptionSet, key: &str, slot: &mut String) -> Result<(), ConfigError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(s)) => {
            *slot = s.clone();
            Ok(())
        }
        Some(_) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            expected: "a string",
        }),
    }
}

fn build_options(merged: &OptionSet) -> Result<CompileOptions, ConfigError> {
    let target = if flag(merged, "engine") {
        TargetMode::EngineNative
    } else if flag(merged, "generators") {
        TargetMode::Generator
    } else if flag(merged, "promises") {
        TargetMode::Promise
    } else {
        TargetMode::CallbackBind
    };

    let mut symbols = SymbolNames::default();
    string_value(merged, "$return", &mut symbols.return_name)?;
    string_value(merged, "$error", &mut symbols.error_name)?;
    string_value(merged, "$arguments", &mut symbols.arguments_name)?;
    string_value(merged, "$asyncbind", &mut symbols.async_bind)?;
    string_value(merged, "$asyncspawn", &mut symbols.async_spawn)?;
    string_value(merged, "$makeThenable", &mut symbols.make_thenable)?;
    string_value(merged, "$generator", &mut symbols.generator)?;
    string_value(merged, "generatedSymbolPrefix", &mut symbols.prefix)?;

    let options = CompileOptions {
        target,
        symbols,
        wrap_await: bool_value(merged, "wrapAwait", true)?,
        source_positions: bool_value(merged, "sourcemap", true)?,
    };
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_presets_map_to_targets() {
        let resolver = OptionResolver::new();
        let target = |set: &str| resolver.resolve(set, None, None).map(|o| o.target);
        assert_eq!(target("default"), Ok(TargetMode::CallbackBind));
        assert_eq!(target("es7"), Ok(TargetMode::CallbackBind));
        assert_eq!(target("promise"), Ok(TargetMode::Promise));
        assert_eq!(target("promises"), Ok(TargetMode::Promise));
        assert_eq!(target("generators"), Ok(TargetMode::Generator));
        assert_eq!(target("engine"), Ok(TargetMode::EngineNative));
    }

    #[test]
    fn test_flag_implication() {
        let resolver = OptionResolver::new();
        let options = resolver
            .resolve("es7", None, Some(&json!({"es7": false, "engine": true})))
            .unwrap();
        assert_eq!(options.target, TargetMode::EngineNative);
    }
}
