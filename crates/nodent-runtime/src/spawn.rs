//! Spawn Driver: runs a generator to completion, awaiting every yielded value.

use crate::bind::make_thenable;
use crate::generator::{GeneratorRef, GeneratorStep, Resumption};
use crate::scheduler::Runtime;
use crate::thenable::{CellKind, Outcome, Thenable};
use crate::value::Value;

/// `$asyncspawn(this, genfn)`: call `genfn` to obtain a generator and drive it.
/// Returns a cell settled with the generator's return value or uncaught error.
#[tracing::instrument(level = "trace", skip_all)]
pub fn async_spawn(runtime: &Runtime, this: Value, generator_fn: Value) -> Result<Value, Value> {
    let cell = runtime.cell();
    match generator_fn.call(this, &[]) {
        Ok(Value::Generator(generator)) => step(
            runtime,
            generator,
            Resumption::Next(Value::Undefined),
            cell.clone(),
        ),
        Ok(other) => cell.settle_error(Value::type_error(format!(
            "$asyncspawn: {} is not a generator",
            other.to_display_string()
        ))),
        Err(thrown) => cell.settle_error(thrown),
    }
    Ok(Value::Thenable(cell))
}

/// Drive `generator` with an existing cell; usable for generators created on
/// the Rust side.
pub fn spawn_generator(runtime: &Runtime, generator: GeneratorRef) -> Thenable {
    let cell = runtime.cell();
    step(runtime, generator, Resumption::Next(Value::Undefined), cell.clone());
    cell
}

/// Resume `generator` until it finishes or yields something still pending.
/// Settled eager cells are consumed in place so a long run of them does not
/// nest a frame per yield.
fn step(runtime: &Runtime, generator: GeneratorRef, mut input: Resumption, cell: Thenable) {
    loop {
        let awaited = match generator.resume(input) {
            Err(thrown) => {
                cell.settle_error(thrown);
                return;
            }
            Ok(GeneratorStep::Complete(value)) => {
                cell.settle_ok(value);
                return;
            }
            Ok(GeneratorStep::Yielded(value)) => make_thenable(runtime, value),
        };
        if let (CellKind::Eager, Some(outcome)) = (awaited.kind(), awaited.outcome()) {
            awaited.mark_handled();
            input = resumption(outcome);
            continue;
        }
        let target = cell.clone();
        awaited.on_outcome(move |outcome| {
            let Some(runtime) = target.runtime() else {
                return;
            };
            step(&runtime, generator, resumption(outcome), target);
        });
        return;
    }
}

fn resumption(outcome: Outcome) -> Resumption {
    match outcome {
        Ok(v) => Resumption::Next(v),
        Err(e) => Resumption::Throw(e),
    }
}
