//! Async-function discovery and structural validation.

use nodent_ast::{AstBuilder, NodeArena};
use nodent_transform::{
    CompileOptions, TargetMode, TransformError, discover_async_functions, transform, validate,
};

#[test]
fn test_units_are_innermost_first() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let q = b.ident("q");
    let inner_wait = b.await_expr(q);
    let inner_stmt = b.expr_stmt(inner_wait);
    let inner = b.async_function_decl("inner", &[], vec![inner_stmt]);
    let p = b.ident("p");
    let w1 = b.await_expr(p);
    let s1 = b.expr_stmt(w1);
    let r = b.ident("r");
    let w2 = b.await_expr(r);
    let s2 = b.expr_stmt(w2);
    let outer = b.async_function_decl("outer", &[], vec![inner, s1, s2]);
    let plain = b.function_decl("plain", &[], vec![]);
    let root = b.program(vec![outer, plain]);

    let units = discover_async_functions(&arena, root);
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].function, inner);
    assert_eq!(units[0].suspension_points, vec![inner_wait]);
    assert_eq!(units[1].function, outer);
    // The nested function's await belongs to it alone.
    assert_eq!(units[1].suspension_points, vec![w1, w2]);
}

#[test]
fn test_await_outside_async_function() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let p = b.ident("p");
    let waited = b.await_expr(p);
    let stmt = b.expr_stmt(waited);
    let f = b.function_decl("f", &[], vec![stmt]);
    let root = b.program(vec![f]);

    let diags = validate(&arena, root, TargetMode::CallbackBind, "a.js");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, 1308);
    assert_eq!(diags[0].file, "a.js");
}

#[test]
fn test_yield_placement() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let one = b.number(1.0);
    let y1 = b.yield_expr(one);
    let s1 = b.expr_stmt(y1);
    let f = b.async_function_decl("f", &[], vec![s1]);
    let two = b.number(2.0);
    let y2 = b.yield_expr(two);
    let s2 = b.expr_stmt(y2);
    let root = b.program(vec![f, s2]);

    let codes: Vec<u32> = validate(&arena, root, TargetMode::Promise, "a.js")
        .iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, vec![9002, 1163]);
}

#[test]
fn test_async_generators_need_engine_target() {
    let build = |arena: &mut NodeArena| {
        let mut b = AstBuilder::new(arena);
        let body = b.block(vec![]);
        let f = b.function(nodent_ast::FunctionData {
            name: Some("g".into()),
            params: vec![],
            body,
            is_async: true,
            is_generator: true,
            is_declaration: true,
        });
        b.program(vec![f])
    };
    let mut arena = NodeArena::new();
    let root = build(&mut arena);
    let diags = validate(&arena, root, TargetMode::Generator, "a.js");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, 9001);
    assert!(diags[0].message_text.contains("generators"), "{}", diags[0].message_text);
    assert!(validate(&arena, root, TargetMode::EngineNative, "a.js").is_empty());
}

#[test]
fn test_jump_targets_checked_per_function() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let brk = b.brk(None);
    let inner = b.function_decl("inner", &[], vec![brk]);
    let body = b.block(vec![inner]);
    let t = b.boolean(true);
    let lp = b.labeled_while("outer", t, body);
    let cont = b.cont(Some("missing"));
    let root = b.program(vec![lp, cont]);

    let diags = validate(&arena, root, TargetMode::CallbackBind, "a.js");
    let codes: Vec<u32> = diags.iter().map(|d| d.code).collect();
    // A function boundary hides the enclosing loop.
    assert_eq!(codes, vec![1105, 1116]);
    assert!(diags[1].message_text.contains("'missing'"));
}

#[test]
fn test_transform_reports_every_problem_and_leaves_tree() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let p = b.ident("p");
    let w = b.await_expr(p);
    let s = b.expr_stmt(w);
    let q = b.ident("q");
    let w2 = b.await_expr(q);
    let s2 = b.expr_stmt(w2);
    let ok = b.async_function_decl("ok", &[], vec![s2]);
    let root = b.program(vec![s, ok]);
    let before = arena.len();

    let err = transform(
        &mut arena,
        root,
        &CompileOptions::new(TargetMode::Promise),
        "a.js",
    )
    .expect_err("await at top level");
    assert!(matches!(err, TransformError::Structural(_)));
    assert_eq!(err.codes(), vec![1308]);
    assert!(err.to_string().contains("a.js"));
    assert_eq!(arena.len(), before);
}

#[test]
fn test_invalid_options_fail_before_tree_work() {
    let mut arena = NodeArena::new();
    let root = AstBuilder::new(&mut arena).program(vec![]);
    let mut options = CompileOptions::new(TargetMode::Promise);
    options.symbols.error_name = "$return".into();
    let err = transform(&mut arena, root, &options, "a.js").expect_err("duplicate symbol");
    assert!(matches!(err, TransformError::Config(_)));
}
