//! Option sets, merge order and configuration errors.

use nodent_transform::{CompileOptions, ConfigError, OptionResolver, TargetMode, TransformError};
use serde_json::json;

#[test]
fn test_inline_layer_wins_over_project() {
    let resolver = OptionResolver::new();
    let project = json!({"promises": true});
    let inline = json!({"promises": false, "engine": true});
    let options = resolver
        .resolve("default", Some(&project), Some(&inline))
        .expect("resolve");
    assert_eq!(options.target, TargetMode::EngineNative);
}

#[test]
fn test_conflicting_styles_fall_back_to_es7() {
    let resolver = OptionResolver::new();
    let inline = json!({"generators": true, "$return": "done"});
    let options = resolver
        .resolve("promises", None, Some(&inline))
        .expect("resolve");
    assert_eq!(options.target, TargetMode::CallbackBind);
    // The fallback replaces the merged set, overrides included.
    assert_eq!(options.symbols.return_name, "$return");
}

#[test]
fn test_no_target_mode_is_an_error() {
    let resolver = OptionResolver::new();
    let inline = json!({"es7": false});
    assert_eq!(
        resolver.resolve("es7", None, Some(&inline)),
        Err(ConfigError::NoTargetMode)
    );
}

#[test]
fn test_unknown_keys_rejected_and_foreign_keys_ignored() {
    let resolver = OptionResolver::new();
    let err = resolver
        .resolve("es7", None, Some(&json!({"promisses": true})))
        .expect_err("typo");
    assert_eq!(err, ConfigError::UnknownOption("promisses".into()));

    let ok = resolver.resolve("es7", None, Some(&json!({"parser": {"sourceType": "module"}})));
    assert!(ok.is_ok());
}

#[test]
fn test_value_types_are_checked() {
    let resolver = OptionResolver::new();
    let err = resolver
        .resolve("es7", None, Some(&json!({"wrapAwait": "yes"})))
        .expect_err("string flag");
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "wrapAwait"));
}

#[test]
fn test_symbol_overrides_are_validated() {
    let resolver = OptionResolver::new();
    let options = resolver
        .resolve("promises", None, Some(&json!({"$return": "$ok", "$error": "$fail"})))
        .expect("resolve");
    assert_eq!(options.symbols.return_name, "$ok");
    assert_eq!(options.symbols.error_name, "$fail");

    let invalid = resolver.resolve("es7", None, Some(&json!({"$error": "not valid"})));
    assert!(matches!(invalid, Err(ConfigError::InvalidSymbol { .. })));

    let duplicate = resolver.resolve("es7", None, Some(&json!({"$error": "$return"})));
    assert_eq!(duplicate, Err(ConfigError::DuplicateSymbol("$return".into())));
}

#[test]
fn test_registered_sets_and_presets() {
    let mut resolver = OptionResolver::new();
    resolver
        .register_set("fast", json!({"promises": true, "wrapAwait": false}))
        .expect("register");
    let options = resolver.resolve("fast", None, None).expect("resolve");
    assert_eq!(options.target, TargetMode::Promise);
    assert!(!options.wrap_await);
    assert!(resolver.set_names().any(|n| n == "fast"));

    assert_eq!(
        resolver.register_set("es7", json!({"engine": true})),
        Err(ConfigError::PresetOverwrite("es7".into()))
    );
    assert_eq!(
        resolver.resolve("missing", None, None),
        Err(ConfigError::UnknownOptionSet("missing".into()))
    );
}

#[test]
fn test_json_text_layers() {
    let resolver = OptionResolver::new();
    let options = resolver.resolve_str("default", None, None).expect("resolve");
    assert!(options.source_positions);
    let options = resolver
        .resolve_str("default", Some(r#"{"sourcemap": false}"#), None)
        .expect("resolve");
    assert!(!options.source_positions);
    assert!(matches!(
        resolver.resolve_str("default", Some("[1, 2]"), None),
        Err(ConfigError::Malformed(_))
    ));
    assert!(matches!(
        resolver.resolve_str("default", None, Some("{")),
        Err(ConfigError::Malformed(_))
    ));
}

#[test]
fn test_compile_options_serde_round_trip_uses_option_names() {
    let options = CompileOptions::new(TargetMode::Generator).with_source_positions(true);
    let value = serde_json::to_value(&options).expect("serialize");
    assert_eq!(value["$return"], "$return");
    assert_eq!(value["wrapAwait"], true);
    assert_eq!(value["sourcePositions"], true);
    let back: CompileOptions = serde_json::from_value(value).expect("deserialize");
    assert_eq!(back, options);
}

#[test]
fn test_config_error_converts_into_transform_error() {
    let err: TransformError = ConfigError::NoTargetMode.into();
    assert!(err.diagnostics().is_empty());
    assert!(err.to_string().contains("no target mode"));
}
