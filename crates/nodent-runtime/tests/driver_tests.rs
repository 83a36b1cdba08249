//! Bind Driver, Spawn Driver, continuation-backed generators, and asyncify.

use nodent_runtime::bind::{async_bind, make_thenable};
use nodent_runtime::generator::continuation_generator;
use nodent_runtime::spawn::{async_spawn, spawn_generator};
use nodent_runtime::value::arg;
use nodent_runtime::{
    EntryPoints, Generator, GeneratorRef, GeneratorStep, Resumption, Runtime, RuntimeOptions,
    Value,
};
use std::cell::RefCell;
use std::rc::Rc;

fn fulfilled_number(value: &Value) -> f64 {
    match value.as_thenable().and_then(|cell| cell.outcome()) {
        Some(Ok(v)) => v.to_number(),
        other => panic!("expected a fulfilled cell, got {other:?}"),
    }
}

/// Body that calls `$return(arg)` immediately.
fn returning_body(result: f64) -> Value {
    Value::native("body", move |_, args| {
        arg(args, 0).call(Value::Undefined, &[Value::Number(result)])
    })
}

#[test]
fn test_bind_without_continuations_returns_settled_cell() {
    let rt = Runtime::default();
    let result = async_bind(
        &rt,
        Value::Undefined,
        returning_body(7.0),
        Value::Undefined,
        Value::Undefined,
    )
    .expect("bind");

    // Settled within the call; observing it still takes a job.
    assert_eq!(fulfilled_number(&result), 7.0);
}

#[test]
fn test_bind_with_continuations_calls_them_directly() {
    let rt = Runtime::default();
    let seen = Rc::new(RefCell::new(None));
    let on_return = {
        let seen = Rc::clone(&seen);
        Value::native("ok", move |_, args| {
            *seen.borrow_mut() = Some(arg(args, 0).to_number());
            Ok(Value::Undefined)
        })
    };
    let result = async_bind(
        &rt,
        Value::Undefined,
        returning_body(3.0),
        on_return,
        Value::Undefined,
    )
    .expect("bind");

    assert!(result.is_undefined());
    assert_eq!(*seen.borrow(), Some(3.0));
}

#[test]
fn test_bind_runs_body_in_callers_turn() {
    let rt = Runtime::default();
    let ran = Rc::new(RefCell::new(false));
    let body = {
        let ran = Rc::clone(&ran);
        Value::native("body", move |_, _| {
            *ran.borrow_mut() = true;
            Ok(Value::Undefined)
        })
    };
    let cell = async_bind(&rt, Value::Undefined, body, Value::Undefined, Value::Undefined)
        .expect("bind");

    assert!(*ran.borrow());
    assert!(cell.as_thenable().is_some_and(|c| c.is_pending()));
}

#[test]
fn test_bind_synchronous_throw_rejects_cell() {
    let rt = Runtime::default();
    let body = Value::native("body", |_, _| Err(Value::string("sync failure")));
    let result = async_bind(&rt, Value::Undefined, body, Value::Undefined, Value::Undefined)
        .expect("bind");
    let cell = result.as_thenable().expect("cell");
    cell.mark_handled();

    match cell.outcome() {
        Some(Err(e)) => assert_eq!(e.to_display_string(), "sync failure"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn test_bind_passes_receiver_to_body() {
    let rt = Runtime::default();
    let receiver = Value::object([("n".to_string(), Value::Number(9.0))]);
    let body = Value::native("body", |this, args| {
        let n = this.get_property("n")?;
        arg(args, 0).call(Value::Undefined, &[n])
    });
    let result = async_bind(&rt, receiver, body, Value::Undefined, Value::Undefined)
        .expect("bind");
    assert_eq!(fulfilled_number(&result), 9.0);
}

#[test]
fn test_make_thenable_keeps_existing_cells() {
    let rt = Runtime::default();
    let cell = rt.cell();
    let same = make_thenable(&rt, Value::Thenable(cell.clone()));
    assert!(same.ptr_eq(&cell));

    let wrapped = make_thenable(&rt, Value::Number(1.0));
    assert!(matches!(wrapped.outcome(), Some(Ok(Value::Number(n))) if n == 1.0));
}

/// Yields each of `values`, collecting what it is resumed with.
struct Echo {
    values: Vec<Value>,
    position: usize,
    received: Rc<RefCell<Vec<String>>>,
}

impl Generator for Echo {
    fn resume(&mut self, input: Resumption) -> Result<GeneratorStep, Value> {
        match input {
            Resumption::Next(v) => self.received.borrow_mut().push(v.to_display_string()),
            Resumption::Throw(e) => {
                self.received
                    .borrow_mut()
                    .push(format!("threw {}", e.to_display_string()));
            }
        }
        match self.values.get(self.position) {
            Some(v) => {
                self.position += 1;
                Ok(GeneratorStep::Yielded(v.clone()))
            }
            None => Ok(GeneratorStep::Complete(Value::string("done"))),
        }
    }
}

#[test]
fn test_spawn_resumes_with_settled_values() {
    let rt = Runtime::default();
    let received = Rc::new(RefCell::new(Vec::new()));
    let pending = rt.cell();
    let generator = GeneratorRef::new(Echo {
        values: vec![Value::Number(1.0), Value::Thenable(pending.clone())],
        position: 0,
        received: Rc::clone(&received),
    });
    let cell = spawn_generator(&rt, generator);

    rt.run_until_idle().expect("idle");
    assert!(cell.is_pending());
    pending.settle_ok(Value::Number(2.0));
    rt.run_until_idle().expect("idle");

    assert_eq!(*received.borrow(), vec!["undefined", "1", "2"]);
    assert!(matches!(cell.outcome(), Some(Ok(v)) if v.to_display_string() == "done"));
}

#[test]
fn test_spawn_throws_rejections_into_generator() {
    let rt = Runtime::default();
    let received = Rc::new(RefCell::new(Vec::new()));
    let generator = GeneratorRef::new(Echo {
        values: vec![Value::Thenable(rt.rejected(Value::string("bad")))],
        position: 0,
        received: Rc::clone(&received),
    });
    let cell = spawn_generator(&rt, generator);
    rt.run_until_idle().expect("idle");

    assert_eq!(*received.borrow(), vec!["undefined", "threw bad"]);
    assert!(cell.outcome().is_some_and(|o| o.is_ok()));
}

#[test]
fn test_async_spawn_rejects_non_generator() {
    let rt = Runtime::default();
    let not_a_generator = Value::native("f", |_, _| Ok(Value::Number(1.0)));
    let result = async_spawn(&rt, Value::Undefined, not_a_generator).expect("spawn");
    let cell = result.as_thenable().expect("cell");
    cell.mark_handled();
    assert!(matches!(cell.outcome(), Some(Err(_))));
}

/// Body `function ($return, $error, $yield) { return $yield(10, k) }`
/// where `k(x)` returns `x + 1`.
fn one_yield_body() -> Value {
    Value::native("body", |_, args| {
        let on_return = arg(args, 0);
        let resume = Value::native("k", move |_, k_args| {
            let x = arg(k_args, 0).to_number();
            on_return.call(Value::Undefined, &[Value::Number(x + 1.0)])
        });
        arg(args, 2).call(Value::Undefined, &[Value::Number(10.0), resume])
    })
}

#[test]
fn test_continuation_generator_protocol() {
    let generator = continuation_generator(Value::Undefined, one_yield_body()).expect("generator");
    let next = generator.get_property("next").expect("next");

    let first = next.call(Value::Undefined, &[]).expect("first step");
    assert_eq!(first.get_property("value").expect("value").to_number(), 10.0);
    assert!(!first.get_property("done").expect("done").is_truthy());

    let second = next
        .call(Value::Undefined, &[Value::Number(5.0)])
        .expect("second step");
    assert_eq!(second.get_property("value").expect("value").to_number(), 6.0);
    assert!(second.get_property("done").expect("done").is_truthy());

    let third = next.call(Value::Undefined, &[]).expect("finished");
    assert!(third.get_property("value").expect("value").is_undefined());
}

#[test]
fn test_spawn_drives_continuation_generator() {
    let rt = Runtime::new(RuntimeOptions { eager: true });
    let entry = EntryPoints::new(&rt);
    let generator_entry = entry.generator.clone();
    let genfn = Value::native("genfn", move |this, _| {
        generator_entry.call(Value::Undefined, &[this, one_yield_body()])
    });
    let result = entry
        .async_spawn
        .call(Value::Undefined, &[Value::Undefined, genfn])
        .expect("spawn");

    // 10 is already settled and the cells are eager: no job needed.
    assert_eq!(fulfilled_number(&result), 11.0);
}

/// Yields `0..limit`, then returns the sum of what it was resumed with.
struct Count {
    limit: u32,
    next: u32,
    total: f64,
}

impl Generator for Count {
    fn resume(&mut self, input: Resumption) -> Result<GeneratorStep, Value> {
        match input {
            Resumption::Next(v) => {
                if let Some(n) = v.as_number() {
                    self.total += n;
                }
            }
            Resumption::Throw(e) => return Err(e),
        }
        if self.next == self.limit {
            return Ok(GeneratorStep::Complete(Value::Number(self.total)));
        }
        let value = Value::Number(f64::from(self.next));
        self.next += 1;
        Ok(GeneratorStep::Yielded(value))
    }
}

#[test]
fn test_spawn_runs_long_eager_generators_in_place() {
    let rt = Runtime::new(RuntimeOptions { eager: true });
    let generator = GeneratorRef::new(Count {
        limit: 100_000,
        next: 0,
        total: 0.0,
    });
    let cell = spawn_generator(&rt, generator);

    // Sum of 0..100_000.
    assert!(matches!(cell.outcome(), Some(Ok(Value::Number(n))) if n == 4_999_950_000.0));
    assert_eq!(rt.pending_jobs(), 0);
}

#[test]
fn test_spawn_waits_for_pending_cell_after_eager_run() {
    let rt = Runtime::new(RuntimeOptions { eager: true });
    let received = Rc::new(RefCell::new(Vec::new()));
    let pending = rt.cell();
    let generator = GeneratorRef::new(Echo {
        values: vec![
            Value::Number(1.0),
            Value::Thenable(pending.clone()),
            Value::Number(3.0),
        ],
        position: 0,
        received: Rc::clone(&received),
    });
    let cell = spawn_generator(&rt, generator);
    assert_eq!(*received.borrow(), vec!["undefined", "1"]);
    assert!(cell.is_pending());

    pending.settle_ok(Value::Number(2.0));
    rt.run_until_idle().expect("idle");
    assert_eq!(*received.borrow(), vec!["undefined", "1", "2", "3"]);
    assert!(matches!(cell.outcome(), Some(Ok(v)) if v.to_display_string() == "done"));
}

#[test]
fn test_asyncify_settles_from_node_callback() {
    let rt = Runtime::default();
    let node_style = Value::native("read", |_, args| {
        let callback = arg(args, 1);
        if arg(args, 0).to_display_string() == "missing" {
            callback.call(Value::Undefined, &[Value::string("ENOENT")])
        } else {
            callback.call(Value::Undefined, &[Value::Null, Value::string("contents")])
        }
    });
    let wrapped = nodent_runtime::asyncify::asyncify(&rt, node_style).expect("asyncify");

    let ok = wrapped
        .call(Value::Undefined, &[Value::string("file")])
        .expect("call");
    assert!(matches!(ok.as_thenable().and_then(|c| c.outcome()), Some(Ok(v)) if v.to_display_string() == "contents"));

    let failed = wrapped
        .call(Value::Undefined, &[Value::string("missing")])
        .expect("call");
    let cell = failed.as_thenable().expect("cell");
    cell.mark_handled();
    assert!(matches!(cell.outcome(), Some(Err(e)) if e.to_display_string() == "ENOENT"));
}
