//! Interop between units compiled for different targets.
//!
//! Three helper units, compiled as es7, promises and generators, each push a
//! descriptor `{ name, call, consume }` onto a shared `gen` array. A driver
//! unit awaits every pairing of them, first one at a time and then launched
//! together, and reports `single === 6 && multi === 12`.

use nodent::Compiler;
use nodent::ast::{
    AssignOperator, AstBuilder, BinaryOperator, LogicalOperator, NodeArena, NodeIndex,
    UnaryOperator, UpdateOperator,
};
use nodent::runtime::{Runtime, RuntimeOptions, Value};
use nodent::transform::{CompileOptions, TargetMode};

const PAIRS: [(f64, f64); 6] = [
    (0.0, 1.0),
    (0.0, 2.0),
    (1.0, 0.0),
    (1.0, 2.0),
    (2.0, 0.0),
    (2.0, 1.0),
];

/// `gen.push({ name: "<name>", call: async function () { return "<name>"; },
///             consume: async function (f) { return await f(); } });`
fn helper_unit(b: &mut AstBuilder<'_>, name: &str) -> NodeIndex {
    let label = b.string(name);
    let ret = b.ret(label);
    let call = b.async_function_expr(None, &[], vec![ret]);

    let f = b.call_named("f", vec![]);
    let waited = b.await_expr(f);
    let ret = b.ret(waited);
    let consume = b.async_function_expr(None, &["f"], vec![ret]);

    let label = b.string(name);
    let descriptor = b.object(vec![
        ("name".to_string(), label),
        ("call".to_string(), call),
        ("consume".to_string(), consume),
    ]);
    let shared = b.ident("gen");
    let push = b.method_call(shared, "push", vec![descriptor]);
    let stmt = b.expr_stmt(push);
    b.program(vec![stmt])
}

/// `gen[<index>]`
fn gen_at(b: &mut AstBuilder<'_>, index: &str) -> NodeIndex {
    let shared = b.ident("gen");
    let index = b.ident(index);
    b.elem(shared, index)
}

fn gen_length(b: &mut AstBuilder<'_>) -> NodeIndex {
    let shared = b.ident("gen");
    b.prop(shared, "length")
}

fn inter_call(b: &mut AstBuilder<'_>, (i, j): (f64, f64)) -> NodeIndex {
    let i = b.number(i);
    let j = b.number(j);
    b.call_named("inter", vec![i, j])
}

/// ```javascript
/// async function inter(i, j) {
///     return (gen[j].name == await gen[j].call() &&
///             await gen[j].call() == await gen[i].consume(gen[j].call)) ? 1 : 100;
/// }
/// ```
fn inter_function(b: &mut AstBuilder<'_>) -> NodeIndex {
    let target = gen_at(b, "j");
    let name = b.prop(target, "name");
    let target = gen_at(b, "j");
    let call = b.method_call(target, "call", vec![]);
    let first = b.await_expr(call);
    let names_match = b.binary(BinaryOperator::Equal, name, first);

    let target = gen_at(b, "j");
    let call = b.method_call(target, "call", vec![]);
    let direct = b.await_expr(call);
    let target = gen_at(b, "j");
    let unbound = b.prop(target, "call");
    let consumer = gen_at(b, "i");
    let consumed = b.method_call(consumer, "consume", vec![unbound]);
    let consumed = b.await_expr(consumed);
    let values_match = b.binary(BinaryOperator::Equal, direct, consumed);

    let both = b.logical(LogicalOperator::And, names_match, values_match);
    let one = b.number(1.0);
    let hundred = b.number(100.0);
    let score = b.conditional(both, one, hundred);
    let ret = b.ret(score);
    b.async_function_decl("inter", &["i", "j"], vec![ret])
}

/// The `test()` driver from the interop scenario.
fn test_function(b: &mut AstBuilder<'_>) -> NodeIndex {
    // for (var q = 0; q < gen.length * gen.length * 2; q++) {
    //     if (!q % gen.length) await breathe();
    //     await inter(q % gen.length, (q / gen.length) % gen.length | 0);
    // }
    let zero = b.number(0.0);
    let init = b.var("q", zero);
    let q = b.ident("q");
    let len_a = gen_length(b);
    let len_b = gen_length(b);
    let squared = b.binary(BinaryOperator::Multiply, len_a, len_b);
    let two = b.number(2.0);
    let bound = b.binary(BinaryOperator::Multiply, squared, two);
    let test = b.binary(BinaryOperator::LessThan, q, bound);
    let q = b.ident("q");
    let step = b.update(UpdateOperator::Increment, false, q);

    let q = b.ident("q");
    let not_q = b.unary(UnaryOperator::Not, q);
    let len = gen_length(b);
    let first_round = b.binary(BinaryOperator::Remainder, not_q, len);
    let breathe = b.call_named("breathe", vec![]);
    let breathe = b.await_expr(breathe);
    let breathe = b.expr_stmt(breathe);
    let maybe_breathe = b.if_stmt(first_round, breathe, NodeIndex::NONE);

    let q = b.ident("q");
    let len = gen_length(b);
    let i = b.binary(BinaryOperator::Remainder, q, len);
    let q = b.ident("q");
    let len = gen_length(b);
    let row = b.binary(BinaryOperator::Divide, q, len);
    let len = gen_length(b);
    let row = b.binary(BinaryOperator::Remainder, row, len);
    let zero = b.number(0.0);
    let j = b.binary(BinaryOperator::BitwiseOr, row, zero);
    let warmup = b.call_named("inter", vec![i, j]);
    let warmup = b.await_expr(warmup);
    let warmup = b.expr_stmt(warmup);
    let body = b.block(vec![maybe_breathe, warmup]);
    let rounds = b.for_stmt(init, test, step, body);

    // var single = await inter(0,1) + ... + await inter(2,1);
    let mut sum = NodeIndex::NONE;
    for pair in PAIRS {
        let call = inter_call(b, pair);
        let waited = b.await_expr(call);
        sum = if sum.is_none() {
            waited
        } else {
            b.binary(BinaryOperator::Add, sum, waited)
        };
    }
    let single = b.var("single", sum);

    // var a = [inter(0,1), ..., inter(2,1)];
    let launched: Vec<NodeIndex> = PAIRS.iter().map(|&pair| inter_call(b, pair)).collect();
    let launched = b.array(launched);
    let a = b.var("a", launched);

    // var multi = 0;
    // for (var i = 0; i < a.length; i++) multi += await a[i] + await a[i];
    let zero = b.number(0.0);
    let multi = b.var("multi", zero);
    let zero = b.number(0.0);
    let init = b.var("i", zero);
    let i = b.ident("i");
    let arr = b.ident("a");
    let len = b.prop(arr, "length");
    let test = b.binary(BinaryOperator::LessThan, i, len);
    let i = b.ident("i");
    let step = b.update(UpdateOperator::Increment, false, i);
    let arr = b.ident("a");
    let i = b.ident("i");
    let first = b.elem(arr, i);
    let first = b.await_expr(first);
    let arr = b.ident("a");
    let i = b.ident("i");
    let second = b.elem(arr, i);
    let second = b.await_expr(second);
    let pair_sum = b.binary(BinaryOperator::Add, first, second);
    let target = b.ident("multi");
    let accumulate = b.assign_op(AssignOperator::Compound(BinaryOperator::Add), target, pair_sum);
    let accumulate = b.expr_stmt(accumulate);
    let body = b.block(vec![accumulate]);
    let gather = b.for_stmt(init, test, step, body);

    // return single === 6 && multi === 12;
    let s = b.ident("single");
    let six = b.number(6.0);
    let single_ok = b.binary(BinaryOperator::StrictEqual, s, six);
    let m = b.ident("multi");
    let twelve = b.number(12.0);
    let multi_ok = b.binary(BinaryOperator::StrictEqual, m, twelve);
    let verdict = b.logical(LogicalOperator::And, single_ok, multi_ok);
    let ret = b.ret(verdict);

    b.async_function_decl("test", &[], vec![rounds, single, a, multi, gather, ret])
}

fn driver_unit(b: &mut AstBuilder<'_>) -> NodeIndex {
    let inter = inter_function(b);
    let test = test_function(b);
    let run = b.call_named("test", vec![]);
    let run = b.expr_stmt(run);
    b.program(vec![inter, test, run])
}

/// Compile all four units into one arena, run them, and return the value
/// the driver's cell settled with.
fn run_interop(driver_target: TargetMode) -> anyhow::Result<Value> {
    let mut arena = NodeArena::new();
    let (helpers, driver) = {
        let mut b = AstBuilder::new(&mut arena);
        let helpers = [
            (helper_unit(&mut b, "es7"), TargetMode::CallbackBind),
            (helper_unit(&mut b, "promises"), TargetMode::Promise),
            (helper_unit(&mut b, "generators"), TargetMode::Generator),
        ];
        (helpers, driver_unit(&mut b))
    };

    for (root, target) in helpers {
        let compiler = Compiler::new(CompileOptions::new(target)).with_host_generators(true);
        let unit = compiler.compile(&mut arena, root, &format!("cg-{}.js", target.name()))?;
        assert!(!unit.text.contains("await "), "{}", unit.text);
    }
    let driver_compiler = Compiler::new(CompileOptions::new(driver_target)).with_host_generators(true);
    let unit = driver_compiler.compile(&mut arena, driver, "es6-interop.js")?;
    assert_eq!(unit.stats.functions_transformed, 2);

    let runtime = Runtime::new(RuntimeOptions::default());
    let evaluator = driver_compiler.evaluator(arena, &runtime);
    evaluator.define_global("gen", Value::array(Vec::new()));
    let rt = runtime.clone();
    evaluator.define_global(
        "breathe",
        Value::native("breathe", move |_, _| {
            let cell = rt.cell();
            let settle = cell.clone();
            rt.enqueue(move || settle.settle_ok(Value::Undefined));
            Ok(Value::Thenable(cell))
        }),
    );

    for (root, _) in helpers {
        evaluator.run_program(root)?;
    }
    let result = evaluator.run_program(driver)?;
    let settled = evaluator.settle(&result)?;
    settled.map_err(|reason| anyhow::anyhow!("test() rejected: {}", reason.to_display_string()))
}

/// Evaluator recursion is deep; give it room.
fn on_large_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(f)
        .expect("spawn test thread")
        .join()
        .expect("test thread panicked")
}

#[test]
fn test_interop_with_callback_bind_driver() {
    let verdict = on_large_stack(|| run_interop(TargetMode::CallbackBind).map(|v| v.is_truthy()));
    assert!(verdict.expect("scenario runs"), "single === 6 && multi === 12");
}

#[test]
fn test_interop_with_promise_driver() {
    let verdict = on_large_stack(|| run_interop(TargetMode::Promise).map(|v| v.is_truthy()));
    assert!(verdict.expect("scenario runs"), "single === 6 && multi === 12");
}
