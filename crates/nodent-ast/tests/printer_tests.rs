//! Tests for the debug printer.

use nodent_ast::{AstBuilder, BinaryOperator, DebugPrinter, NodeArena};

#[test]
fn test_print_async_function() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let x = b.ident("x");
    let awaited = b.await_expr(x);
    let one = b.number(1.0);
    let sum = b.binary(BinaryOperator::Add, awaited, one);
    let ret = b.ret(sum);
    let func = b.async_function_decl("f", &["x"], vec![ret]);

    let text = DebugPrinter::new(&arena).print(func);
    assert_eq!(text, "async function f(x) {\n    return await x + 1;\n}");
}

#[test]
fn test_print_respects_precedence() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let a = b.ident("a");
    let c = b.ident("b");
    let sum = b.binary(BinaryOperator::Add, a, c);
    let two = b.number(2.0);
    let product = b.binary(BinaryOperator::Multiply, sum, two);

    assert_eq!(DebugPrinter::new(&arena).print(product), "(a + b) * 2");
}

#[test]
fn test_print_try_catch_finally() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let body = b.block(vec![]);
    let e = b.ident("e");
    let rethrow = b.throw(e);
    let handler = b.block(vec![rethrow]);
    let finalizer = b.block(vec![]);
    let stmt = b.try_stmt(body, Some(("e", handler)), finalizer);

    let text = DebugPrinter::new(&arena).print(stmt);
    assert_eq!(
        text,
        "try {} catch (e) {\n    throw e;\n} finally {}"
    );
}

#[test]
fn test_print_records_generated_positions() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let one = b.number(1.0);
    let first = b.var("a", one);
    let two = b.number(2.5);
    let second = b.var("b", two);
    let program = b.program(vec![first, second]);

    let printed = DebugPrinter::new(&arena).with_positions().print_tree(program);
    assert_eq!(printed.text, "var a = 1;\nvar b = 2.5;");
    let pos = printed.position_of(second).expect("second statement printed");
    assert_eq!((pos.line, pos.column), (1, 0));
    let pos = printed.position_of(two).expect("literal printed");
    assert_eq!((pos.line, pos.column), (1, 8));
}

#[test]
fn test_print_immediately_invoked_function() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let func = b.function_expr(None, &[], vec![]);
    let call = b.call(func, vec![]);
    let stmt = b.expr_stmt(call);

    assert_eq!(DebugPrinter::new(&arena).print(stmt), "(function() {})();");
}
