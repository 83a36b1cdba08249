//! Settlement cells.
//!
//! A cell moves once from pending to fulfilled or rejected. Reactions run in
//! registration order, each exactly once. Standard cells deliver every
//! reaction as a scheduler job; eager cells deliver synchronously, which
//! saves a scheduling round trip between already-settled steps.
//!
//! Resolving a cell with another thenable adopts it: the cell stays pending
//! until the adopted value settles. Adoption chains are checked for cycles.

use crate::error::ErrorKind;
use crate::scheduler::{Runtime, RuntimeInner};
use crate::value::{Value, arg};
use nodent_common::limits::MAX_ADOPTION_CHAIN;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// The result of a settled cell: fulfilled value or rejection reason.
pub type Outcome = Result<Value, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Standard,
    Eager,
}

#[derive(Clone, Debug)]
pub enum CellState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

enum Reaction {
    /// `then(on_ok, on_err)` from generated or user code; its result
    /// settles `derived`.
    Handlers {
        on_ok: Value,
        on_err: Value,
        derived: Thenable,
    },
    Native(Box<dyn FnOnce(Outcome)>),
}

impl Reaction {
    fn run(self, outcome: Outcome) {
        match self {
            Reaction::Native(f) => f(outcome),
            Reaction::Handlers {
                on_ok,
                on_err,
                derived,
            } => {
                let (handler, input, ok) = match outcome {
                    Ok(v) => (on_ok, v, true),
                    Err(e) => (on_err, e, false),
                };
                if handler.is_callable() {
                    match handler.call(Value::Undefined, &[input]) {
                        Ok(result) => derived.settle_ok(result),
                        Err(thrown) => derived.settle_error(thrown),
                    }
                } else if ok {
                    derived.settle_ok(input);
                } else {
                    derived.settle_error(input);
                }
            }
        }
    }
}

pub(crate) struct CellInner {
    id: u64,
    kind: CellKind,
    state: RefCell<CellState>,
    reactions: RefCell<VecDeque<Reaction>>,
    /// Set once `settle_ok`/`settle_error` has been accepted; later calls are no-ops.
    locked: Cell<bool>,
    /// The cell being adopted while this one is locked but still pending.
    follows: RefCell<Option<Thenable>>,
    handled: Cell<bool>,
    flushing: Cell<bool>,
    runtime: Weak<RuntimeInner>,
}

/// Handle to a settlement cell. Clones share the same cell.
#[derive(Clone)]
pub struct Thenable(Rc<CellInner>);

impl Thenable {
    /// A new pending cell attached to `runtime`.
    pub fn new(runtime: &Runtime, kind: CellKind) -> Thenable {
        Thenable(Rc::new(CellInner {
            id: runtime.next_cell_id(),
            kind,
            state: RefCell::new(CellState::Pending),
            reactions: RefCell::new(VecDeque::new()),
            locked: Cell::new(false),
            follows: RefCell::new(None),
            handled: Cell::new(false),
            flushing: Cell::new(false),
            runtime: runtime.downgrade(),
        }))
    }

    /// A cell of the same kind on the same runtime.
    fn sibling(&self) -> Thenable {
        Thenable(Rc::new(CellInner {
            id: self
                .runtime()
                .map(|rt| rt.next_cell_id())
                .unwrap_or_default(),
            kind: self.0.kind,
            state: RefCell::new(CellState::Pending),
            reactions: RefCell::new(VecDeque::new()),
            locked: Cell::new(false),
            follows: RefCell::new(None),
            handled: Cell::new(false),
            flushing: Cell::new(false),
            runtime: self.0.runtime.clone(),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> CellKind {
        self.0.kind
    }

    pub fn ptr_eq(&self, other: &Thenable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn runtime(&self) -> Option<Runtime> {
        self.0.runtime.upgrade().map(Runtime::from_inner)
    }

    pub fn state(&self) -> CellState {
        self.0.state.borrow().clone()
    }

    pub fn state_name(&self) -> &'static str {
        match &*self.0.state.borrow() {
            CellState::Pending => "pending",
            CellState::Fulfilled(_) => "fulfilled",
            CellState::Rejected(_) => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(&*self.0.state.borrow(), CellState::Pending)
    }

    /// The outcome, once settled.
    pub fn outcome(&self) -> Option<Outcome> {
        match &*self.0.state.borrow() {
            CellState::Pending => None,
            CellState::Fulfilled(v) => Some(Ok(v.clone())),
            CellState::Rejected(e) => Some(Err(e.clone())),
        }
    }

    /// True once any reaction has been registered.
    pub fn is_handled(&self) -> bool {
        self.0.handled.get()
    }

    pub fn mark_handled(&self) {
        self.0.handled.set(true);
    }

    fn follows(&self) -> Option<Thenable> {
        self.0.follows.borrow().clone()
    }

    fn lock(&self) -> bool {
        if self.0.locked.get() {
            tracing::trace!(cell = self.0.id, "ignoring repeated settlement");
            return false;
        }
        self.0.locked.set(true);
        true
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Fulfil with `value`, adopting it when it is thenable-shaped.
    /// A no-op once the cell has been settled or has started adopting.
    pub fn settle_ok(&self, value: Value) {
        if self.lock() {
            self.resolve_unlocked(value);
        }
    }

    /// Reject with `reason`. A no-op once the cell has been settled.
    pub fn settle_error(&self, reason: Value) {
        if self.lock() {
            self.complete(Err(reason));
        }
    }

    fn resolve_unlocked(&self, value: Value) {
        match &value {
            Value::Thenable(other) => self.adopt_cell(other.clone()),
            Value::Object(_) => match value.get_property("then") {
                Ok(then) if then.is_callable() => self.adopt_foreign(value.clone(), then),
                Ok(_) => self.complete(Ok(value)),
                Err(thrown) => self.complete(Err(thrown)),
            },
            _ => self.complete(Ok(value)),
        }
    }

    fn adopt_cell(&self, other: Thenable) {
        if self.creates_cycle(&other) {
            tracing::debug!(cell = self.0.id, other = other.0.id, "thenable cycle");
            self.complete(Err(Value::error(
                ErrorKind::ThenableCycle,
                "Chaining cycle detected for thenable",
            )));
            return;
        }
        *self.0.follows.borrow_mut() = Some(other.clone());
        let me = self.clone();
        other.on_outcome(move |outcome| me.complete(outcome));
    }

    fn creates_cycle(&self, other: &Thenable) -> bool {
        let mut current = Some(other.clone());
        let mut steps = 0;
        while let Some(cell) = current {
            if cell.ptr_eq(self) {
                return true;
            }
            steps += 1;
            if steps > MAX_ADOPTION_CHAIN {
                return true;
            }
            current = cell.follows();
        }
        false
    }

    /// Adopt an object exposing a callable `then`. The resolving functions
    /// handed to it only take effect once.
    fn adopt_foreign(&self, object: Value, then: Value) {
        let called = Rc::new(Cell::new(false));
        let resolve = {
            let me = self.clone();
            let called = Rc::clone(&called);
            let object = object.clone();
            Value::native("resolve", move |_, args| {
                if !called.replace(true) {
                    let value = arg(args, 0);
                    if value.strict_equals(&object) {
                        me.complete(Err(Value::error(
                            ErrorKind::ThenableCycle,
                            "Chaining cycle detected for thenable",
                        )));
                    } else {
                        me.resolve_unlocked(value);
                    }
                }
                Ok(Value::Undefined)
            })
        };
        let reject = {
            let me = self.clone();
            let called = Rc::clone(&called);
            Value::native("reject", move |_, args| {
                if !called.replace(true) {
                    me.complete(Err(arg(args, 0)));
                }
                Ok(Value::Undefined)
            })
        };
        if let Err(thrown) = then.call(object, &[resolve, reject]) {
            if !called.replace(true) {
                self.complete(Err(thrown));
            }
        }
    }

    fn complete(&self, outcome: Outcome) {
        {
            let mut state = self.0.state.borrow_mut();
            if !matches!(*state, CellState::Pending) {
                return;
            }
            *state = match &outcome {
                Ok(v) => CellState::Fulfilled(v.clone()),
                Err(e) => CellState::Rejected(e.clone()),
            };
        }
        self.0.follows.borrow_mut().take();
        tracing::trace!(
            cell = self.0.id,
            state = self.state_name(),
            reactions = self.0.reactions.borrow().len(),
            "cell settled"
        );

        if outcome.is_err() && !self.is_handled() {
            if let Some(rt) = self.runtime() {
                rt.track_rejection(self.clone());
            }
        }
        self.dispatch();
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// Register `on_ok`/`on_err` (non-callables pass the outcome through) and
    /// return the cell settled by whichever one runs.
    pub fn on_settle(&self, on_ok: Value, on_err: Value) -> Thenable {
        let derived = self.sibling();
        self.push_reaction(Reaction::Handlers {
            on_ok,
            on_err,
            derived: derived.clone(),
        });
        derived
    }

    /// Register a Rust reaction.
    pub fn on_outcome(&self, f: impl FnOnce(Outcome) + 'static) {
        self.push_reaction(Reaction::Native(Box::new(f)));
    }

    fn push_reaction(&self, reaction: Reaction) {
        self.mark_handled();
        self.0.reactions.borrow_mut().push_back(reaction);
        if !self.is_pending() {
            self.dispatch();
        }
    }

    /// Deliver queued reactions of a settled cell.
    fn dispatch(&self) {
        let Some(outcome) = self.outcome() else {
            return;
        };
        match self.0.kind {
            CellKind::Standard => {
                let reactions: Vec<Reaction> = self.0.reactions.borrow_mut().drain(..).collect();
                if reactions.is_empty() {
                    return;
                }
                let Some(rt) = self.runtime() else {
                    tracing::warn!(cell = self.0.id, "runtime dropped; reactions discarded");
                    return;
                };
                for reaction in reactions {
                    let outcome = outcome.clone();
                    rt.enqueue(move || reaction.run(outcome));
                }
            }
            CellKind::Eager => {
                // Reactions registered while flushing join the queue behind
                // the ones already waiting.
                if self.0.flushing.replace(true) {
                    return;
                }
                loop {
                    let next = self.0.reactions.borrow_mut().pop_front();
                    let Some(reaction) = next else {
                        break;
                    };
                    reaction.run(outcome.clone());
                }
                self.0.flushing.set(false);
            }
        }
    }
}

impl std::fmt::Debug for Thenable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thenable")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("state", &self.state_name())
            .finish()
    }
}
