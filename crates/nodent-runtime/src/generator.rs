//! Generator protocol consumed by the Spawn Driver, and a generator backed
//! by continuation-passing code.
//!
//! A continuation-backed generator wraps a body of the form
//! `function ($return, $error, $yield) { ... }` produced by host-generator
//! lowering. The body suspends by calling `$yield(value, resume, resumeErr)`
//! and returning; the generator keeps the two continuations and calls one of
//! them on the next resumption.

use crate::value::{Value, arg};
use std::cell::RefCell;
use std::rc::Rc;

/// How a suspended generator is resumed.
#[derive(Clone, Debug)]
pub enum Resumption {
    Next(Value),
    Throw(Value),
}

/// What a resumption produced.
#[derive(Clone, Debug)]
pub enum GeneratorStep {
    Yielded(Value),
    Complete(Value),
}

pub trait Generator {
    /// Run until the next yield or completion. `Err` is an uncaught throw.
    fn resume(&mut self, input: Resumption) -> Result<GeneratorStep, Value>;
}

/// Shared handle to a generator object.
#[derive(Clone)]
pub struct GeneratorRef(Rc<RefCell<dyn Generator>>);

impl GeneratorRef {
    pub fn new(generator: impl Generator + 'static) -> GeneratorRef {
        GeneratorRef(Rc::new(RefCell::new(generator)))
    }

    pub fn ptr_eq(&self, other: &GeneratorRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn resume(&self, input: Resumption) -> Result<GeneratorStep, Value> {
        let mut generator = self
            .0
            .try_borrow_mut()
            .map_err(|_| Value::type_error("Generator is already running"))?;
        generator.resume(input)
    }

    /// Resume and wrap the step as an iterator result `{ value, done }`.
    pub fn resume_to_result(&self, input: Resumption) -> Result<Value, Value> {
        let (value, done) = match self.resume(input)? {
            GeneratorStep::Yielded(v) => (v, false),
            GeneratorStep::Complete(v) => (v, true),
        };
        Ok(Value::object([
            ("value".to_string(), value),
            ("done".to_string(), Value::Bool(done)),
        ]))
    }
}

impl std::fmt::Debug for GeneratorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GeneratorRef")
    }
}

enum StepRecord {
    Returned(Value),
    Threw(Value),
    Yielded {
        value: Value,
        resume: Value,
        resume_err: Value,
    },
}

enum Phase {
    NotStarted { this: Value, body: Value },
    Suspended { resume: Value, resume_err: Value },
    Running,
    Done,
}

pub struct ContinuationGenerator {
    phase: Phase,
    record: Rc<RefCell<Option<StepRecord>>>,
    on_return: Value,
    on_error: Value,
    on_yield: Value,
}

impl ContinuationGenerator {
    pub fn new(this: Value, body: Value) -> ContinuationGenerator {
        let record: Rc<RefCell<Option<StepRecord>>> = Rc::new(RefCell::new(None));
        let on_return = {
            let record = Rc::clone(&record);
            Value::native("$return", move |_, args| {
                record.replace(Some(StepRecord::Returned(arg(args, 0))));
                Ok(Value::Undefined)
            })
        };
        let on_error = {
            let record = Rc::clone(&record);
            Value::native("$error", move |_, args| {
                record.replace(Some(StepRecord::Threw(arg(args, 0))));
                Ok(Value::Undefined)
            })
        };
        let on_yield = {
            let record = Rc::clone(&record);
            Value::native("$yield", move |_, args| {
                record.replace(Some(StepRecord::Yielded {
                    value: arg(args, 0),
                    resume: arg(args, 1),
                    resume_err: arg(args, 2),
                }));
                Ok(Value::Undefined)
            })
        };
        ContinuationGenerator {
            phase: Phase::NotStarted { this, body },
            record,
            on_return,
            on_error,
            on_yield,
        }
    }
}

impl Generator for ContinuationGenerator {
    fn resume(&mut self, input: Resumption) -> Result<GeneratorStep, Value> {
        let phase = std::mem::replace(&mut self.phase, Phase::Running);
        let called = match (phase, input) {
            (Phase::Done, Resumption::Next(_)) => {
                self.phase = Phase::Done;
                return Ok(GeneratorStep::Complete(Value::Undefined));
            }
            (Phase::Done | Phase::NotStarted { .. }, Resumption::Throw(e)) => {
                self.phase = Phase::Done;
                return Err(e);
            }
            (Phase::Running, _) => {
                return Err(Value::type_error("Generator is already running"));
            }
            (Phase::NotStarted { this, body }, Resumption::Next(_)) => body.call(
                this,
                &[
                    self.on_return.clone(),
                    self.on_error.clone(),
                    self.on_yield.clone(),
                ],
            ),
            (Phase::Suspended { resume, .. }, Resumption::Next(v)) => {
                resume.call(Value::Undefined, &[v])
            }
            (Phase::Suspended { resume_err, .. }, Resumption::Throw(e)) => {
                resume_err.call(Value::Undefined, &[e])
            }
        };

        let record = self.record.borrow_mut().take();
        match (called, record) {
            (_, Some(StepRecord::Yielded {
                value,
                resume,
                resume_err,
            })) => {
                self.phase = Phase::Suspended { resume, resume_err };
                Ok(GeneratorStep::Yielded(value))
            }
            (_, Some(StepRecord::Returned(v))) => {
                self.phase = Phase::Done;
                Ok(GeneratorStep::Complete(v))
            }
            (_, Some(StepRecord::Threw(e))) | (Err(e), None) => {
                self.phase = Phase::Done;
                Err(e)
            }
            (Ok(_), None) => {
                self.phase = Phase::Done;
                Ok(GeneratorStep::Complete(Value::Undefined))
            }
        }
    }
}

/// The `$generator(this, body)` entry point.
pub fn continuation_generator(this: Value, body: Value) -> Result<Value, Value> {
    if !body.is_callable() {
        return Err(Value::type_error("generator body is not a function"));
    }
    Ok(Value::Generator(GeneratorRef::new(ContinuationGenerator::new(
        this, body,
    ))))
}
