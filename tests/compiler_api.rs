//! The `Compiler` facade: option resolution, emission and evaluator wiring.

use nodent::Compiler;
use nodent::ast::{AstBuilder, NodeArena, NodeIndex};
use nodent::common::{LineMap, Span, diagnostic_codes};
use nodent::runtime::{Runtime, RuntimeOptions};
use nodent::transform::{CompileOptions, ConfigError, TargetMode, TransformError};

/// `async function f() { return await 7; } f();`
fn await_seven(b: &mut AstBuilder<'_>) -> NodeIndex {
    let seven = b.number(7.0);
    let waited = b.await_expr(seven);
    let ret = b.ret(waited);
    let f = b.async_function_decl("f", &[], vec![ret]);
    let call = b.call_named("f", vec![]);
    let call = b.expr_stmt(call);
    b.program(vec![f, call])
}

#[test]
fn test_option_sets_select_targets() {
    let cases = [
        ("default", TargetMode::CallbackBind),
        ("es7", TargetMode::CallbackBind),
        ("promise", TargetMode::Promise),
        ("promises", TargetMode::Promise),
        ("generators", TargetMode::Generator),
        ("engine", TargetMode::EngineNative),
    ];
    for (set, target) in cases {
        let compiler = Compiler::from_option_set(set, None, None).expect(set);
        assert_eq!(compiler.options().target, target, "{set}");
    }
}

#[test]
fn test_inline_layer_wins_over_project_layer() {
    let compiler = Compiler::from_option_set(
        "promises",
        Some(r#"{ "wrapAwait": false, "$return": "done" }"#),
        Some(r#"{ "$return": "finish" }"#),
    )
    .expect("resolves");
    let options = compiler.options();
    assert_eq!(options.target, TargetMode::Promise);
    assert!(!options.wrap_await);
    assert_eq!(options.symbols.return_name, "finish");
}

#[test]
fn test_conflicting_targets_fall_back_to_es7() {
    let compiler =
        Compiler::from_option_set("promises", None, Some(r#"{ "generators": true }"#))
            .expect("resolves");
    assert_eq!(compiler.options().target, TargetMode::CallbackBind);
    // Overrides from the conflicting layers are dropped with them.
    let compiler = Compiler::from_option_set(
        "es7",
        None,
        Some(r#"{ "generators": true, "wrapAwait": false }"#),
    )
    .expect("resolves");
    assert!(compiler.options().wrap_await);
}

#[test]
fn test_configuration_errors() {
    let err = Compiler::from_option_set("turbo", None, None).unwrap_err();
    assert_eq!(err, ConfigError::UnknownOptionSet("turbo".to_string()));

    let err = Compiler::from_option_set("es7", None, Some(r#"{ "frobnicate": 1 }"#)).unwrap_err();
    assert_eq!(err, ConfigError::UnknownOption("frobnicate".to_string()));

    let err = Compiler::from_option_set("es7", None, Some("[1, 2]")).unwrap_err();
    assert!(matches!(err, ConfigError::Malformed(_)), "{err}");

    let err = Compiler::from_option_set("es7", None, Some("{ not json")).unwrap_err();
    assert!(matches!(err, ConfigError::Malformed(_)), "{err}");

    let err = Compiler::from_option_set("es7", None, Some(r#"{ "wrapAwait": "yes" }"#))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");

    let err = Compiler::from_option_set("es7", None, Some(r#"{ "$return": "$error" }"#))
        .unwrap_err();
    assert_eq!(err, ConfigError::DuplicateSymbol("$error".to_string()));

    let err = Compiler::from_option_set("es7", None, Some(r#"{ "$asyncbind": "not valid" }"#))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSymbol { .. }), "{err}");

    let err = Compiler::from_option_set("es7", Some(r#"{ "es7": false }"#), None).unwrap_err();
    assert_eq!(err, ConfigError::NoTargetMode);
}

#[test]
fn test_custom_symbols_reach_output_and_evaluator() {
    let compiler = Compiler::from_option_set(
        "promises",
        None,
        Some(r#"{ "$asyncbind": "runAsync", "$return": "ok", "$error": "fail" }"#),
    )
    .expect("resolves");

    let mut arena = NodeArena::new();
    let root = await_seven(&mut AstBuilder::new(&mut arena));
    let unit = compiler.compile(&mut arena, root, "custom.js").expect("compiles");
    assert!(unit.text.contains("runAsync"), "{}", unit.text);
    assert!(!unit.text.contains("$asyncbind"), "{}", unit.text);
    assert!(!unit.text.contains("$return"), "{}", unit.text);

    let runtime = Runtime::new(RuntimeOptions::default());
    let evaluator = compiler.evaluator(arena, &runtime);
    let cell = evaluator.run_program(root).expect("runs");
    let value = evaluator.settle(&cell).expect("settles").expect("fulfilled");
    assert_eq!(value.as_number(), Some(7.0));
}

#[test]
fn test_source_map_emitted_on_request() {
    let source = "// header\n\n    async function f() { return await 7; } f();\n";
    let pos = source.find("async").expect("offset") as u32;
    let span = Span::from_offsets(&LineMap::build(source), source, pos, source.len() as u32);
    assert_eq!((span.line, span.column), (2, 4));

    let mut arena = NodeArena::new();
    let root = {
        let mut b = AstBuilder::new(&mut arena).with_span(span);
        await_seven(&mut b)
    };
    let compiler = Compiler::new(CompileOptions::new(TargetMode::Promise).with_source_positions(true));
    let unit = compiler.compile(&mut arena, root, "mapped.js").expect("compiles");

    let map = unit.source_map.as_deref().expect("source map");
    let map: serde_json::Value = serde_json::from_str(map).expect("valid JSON");
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "mapped.js.out");
    assert_eq!(map["sources"], serde_json::json!(["mapped.js"]));
    assert!(map["mappings"].as_str().is_some_and(|m| !m.is_empty()), "{map}");
}

#[test]
fn test_option_sets_emit_source_maps_unless_disabled() {
    for (inline, expected) in [(None, true), (Some(r#"{ "sourcemap": false }"#), false)] {
        let compiler = Compiler::from_option_set("promises", None, inline).expect("resolves");
        let mut arena = NodeArena::new();
        let root = await_seven(&mut AstBuilder::new(&mut arena));
        let unit = compiler.compile(&mut arena, root, "set.js").expect("compiles");
        assert_eq!(unit.source_map.is_some(), expected, "{inline:?}");
    }
}

#[test]
fn test_no_source_map_from_plain_options() {
    let mut arena = NodeArena::new();
    let root = await_seven(&mut AstBuilder::new(&mut arena));
    let compiler = Compiler::new(CompileOptions::new(TargetMode::CallbackBind));
    let unit = compiler.compile(&mut arena, root, "plain.js").expect("compiles");
    assert!(unit.source_map.is_none());
}

#[test]
fn test_report_summarises_unit() {
    let mut arena = NodeArena::new();
    let root = await_seven(&mut AstBuilder::new(&mut arena));
    let compiler = Compiler::new(CompileOptions::new(TargetMode::Promise));
    let unit = compiler.compile(&mut arena, root, "report.js").expect("compiles");

    let report = unit.report();
    assert_eq!(report["target"], "promises");
    assert_eq!(report["sourceMap"], false);
    assert_eq!(report["stats"]["functionsTransformed"], 1);
    assert_eq!(report["stats"]["suspensionPoints"], 1);
}

#[test]
fn test_structural_errors_are_reported_with_codes() {
    // await 1; break;
    let mut arena = NodeArena::new();
    let root = {
        let mut b = AstBuilder::new(&mut arena);
        let one = b.number(1.0);
        let stray = b.await_expr(one);
        let stray = b.expr_stmt(stray);
        let brk = b.brk(None);
        b.program(vec![stray, brk])
    };
    let compiler = Compiler::new(CompileOptions::new(TargetMode::Promise));
    let err = compiler.compile(&mut arena, root, "broken.js").unwrap_err();
    assert!(matches!(err, TransformError::Structural(_)), "{err}");
    let codes = err.codes();
    assert!(codes.contains(&diagnostic_codes::AWAIT_OUTSIDE_ASYNC), "{codes:?}");
    assert!(codes.contains(&diagnostic_codes::BREAK_OUTSIDE_LOOP), "{codes:?}");
}
