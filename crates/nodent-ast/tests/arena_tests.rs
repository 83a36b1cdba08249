//! Tests for the node arena, parent map, and tree walks.

use nodent_ast::walk::{self, Suspension};
use nodent_ast::{AstBuilder, BinaryOperator, NodeArena, NodeFlags, NodeIndex, NodeKind};
use nodent_common::Span;

#[test]
fn test_add_sets_parent_of_children() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let one = b.number(1.0);
    let two = b.number(2.0);
    let sum = b.binary(BinaryOperator::Add, one, two);

    assert_eq!(arena.parent(one), sum);
    assert_eq!(arena.parent(two), sum);
    assert!(arena.parent(sum).is_none());
}

#[test]
fn test_replace_child_rebinds_slot() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let one = b.number(1.0);
    let two = b.number(2.0);
    let sum = b.binary(BinaryOperator::Add, one, two);
    let three = b.number(3.0);

    assert!(arena.replace_child(sum, two, three));
    match arena.kind(sum) {
        Some(NodeKind::Binary { right, .. }) => assert_eq!(*right, three),
        other => panic!("expected binary, got {other:?}"),
    }
    assert_eq!(arena.parent(three), sum);
    assert!(arena.parent(two).is_none());
    assert!(!arena.replace_child(sum, two, three));
}

#[test]
fn test_rebuild_parents_after_replace_kind() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let x = b.ident("x");
    let stmt = b.expr_stmt(x);
    let block = b.block(vec![stmt]);
    let y = b.ident("y");
    let ret = b.ret(y);

    arena.replace_kind(
        block,
        NodeKind::Block {
            statements: vec![ret].into(),
        },
    );
    arena.rebuild_parents(block);

    assert_eq!(arena.parent(ret), block);
    assert_eq!(arena.parent(y), ret);
    assert!(arena.parent(stmt).is_none());
}

#[test]
fn test_single_owner_detects_sharing() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let x = b.ident("x");
    let shared = b.binary(BinaryOperator::Add, x, x);
    assert_eq!(arena.check_single_owner(shared), Err(x));

    let mut b = AstBuilder::new(&mut arena);
    let y = b.ident("y");
    let z = b.ident("z");
    let fine = b.binary(BinaryOperator::Add, y, z);
    assert_eq!(arena.check_single_owner(fine), Ok(()));
}

#[test]
fn test_synthesized_builder_stamps_span_and_flags() {
    let mut arena = NodeArena::new();
    let span = Span::with_location(10, 20, 2, 4);
    let mut b = AstBuilder::synthesized(&mut arena, span);
    let call = b.driver_call("$asyncbind", vec![]);

    let node = arena.get(call).expect("call node");
    assert!(node.is_synthesized());
    assert!(node.flags.contains(NodeFlags::DRIVER_CALL));
    assert_eq!(node.span, span);
}

#[test]
fn test_contains_suspension_skips_nested_functions() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let p = b.ident("p");
    let awaited = b.await_expr(p);
    let inner_stmt = b.expr_stmt(awaited);
    let inner = b.async_function_expr(None, &[], vec![inner_stmt]);
    let outer_stmt = b.expr_stmt(inner);
    let outer_body = b.block(vec![outer_stmt]);

    assert!(!walk::contains_suspension(&arena, outer_body, Suspension::Await));
    assert!(walk::contains_suspension(&arena, inner_stmt, Suspension::Await));
    assert!(!walk::contains_suspension(&arena, inner_stmt, Suspension::Yield));
    assert!(walk::contains_suspension(&arena, inner_stmt, Suspension::Any));
}

#[test]
fn test_suspension_points_in_evaluation_order() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let a = b.call_named("a", vec![]);
    let await_a = b.await_expr(a);
    let c = b.call_named("b", vec![]);
    let await_b = b.await_expr(c);
    let sum = b.binary(BinaryOperator::Add, await_a, await_b);
    let stmt = b.ret(sum);

    let points = walk::suspension_points(&arena, stmt, Suspension::Await);
    assert_eq!(points, vec![await_a, await_b]);
}

#[test]
fn test_functions_postorder_lists_innermost_first() {
    let mut arena = NodeArena::new();
    let mut b = AstBuilder::new(&mut arena);
    let inner = b.function_expr(Some("inner"), &[], vec![]);
    let stmt = b.expr_stmt(inner);
    let outer = b.function_decl("outer", &[], vec![stmt]);
    let program = b.program(vec![outer]);

    assert_eq!(walk::functions_postorder(&arena, program), vec![inner, outer]);
}

#[test]
fn test_none_index_is_never_resolved() {
    let arena = NodeArena::new();
    assert!(arena.get(NodeIndex::NONE).is_none());
    assert_eq!(NodeIndex::NONE.get(), None);
    assert_eq!(NodeIndex::default(), NodeIndex::NONE);
}
