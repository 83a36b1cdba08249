//! Single-threaded job scheduler.
//!
//! `Runtime` owns the job queue that standard settlement cells deliver their
//! reactions through, and the list of rejected cells nobody has observed yet.
//! Draining the queue to idle hands those orphans to the fallback hook.

use crate::error::RuntimeFault;
use crate::hook::{self, HookVerdict};
use crate::thenable::{CellKind, Thenable};
use crate::value::Value;
use nodent_common::limits::MAX_SCHEDULER_JOBS;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

type Job = Box<dyn FnOnce()>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Cells manufactured by the drivers run ready reactions synchronously.
    pub eager: bool,
}

pub(crate) struct RuntimeInner {
    options: RuntimeOptions,
    jobs: RefCell<VecDeque<Job>>,
    rejections: RefCell<Vec<Thenable>>,
    faults: RefCell<Vec<RuntimeFault>>,
    next_cell_id: Cell<u64>,
    jobs_run: Cell<u64>,
}

/// Cheaply clonable handle to a scheduler.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Counters reported by a completed drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub jobs_run: u64,
    pub orphans_reported: usize,
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Runtime {
        Runtime {
            inner: Rc::new(RuntimeInner {
                options,
                jobs: RefCell::new(VecDeque::new()),
                rejections: RefCell::new(Vec::new()),
                faults: RefCell::new(Vec::new()),
                next_cell_id: Cell::new(1),
                jobs_run: Cell::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RuntimeInner>) -> Runtime {
        Runtime { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn next_cell_id(&self) -> u64 {
        let id = self.inner.next_cell_id.get();
        self.inner.next_cell_id.set(id + 1);
        id
    }

    pub fn options(&self) -> RuntimeOptions {
        self.inner.options
    }

    // =========================================================================
    // Cells
    // =========================================================================

    /// The kind of cell the drivers manufacture under these options.
    pub fn default_cell_kind(&self) -> CellKind {
        if self.inner.options.eager {
            CellKind::Eager
        } else {
            CellKind::Standard
        }
    }

    /// A pending cell of the configured kind.
    pub fn cell(&self) -> Thenable {
        Thenable::new(self, self.default_cell_kind())
    }

    pub fn resolved(&self, value: Value) -> Thenable {
        let cell = self.cell();
        cell.settle_ok(value);
        cell
    }

    pub fn rejected(&self, reason: Value) -> Thenable {
        let cell = self.cell();
        cell.settle_error(reason);
        cell
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    pub fn enqueue(&self, job: impl FnOnce() + 'static) {
        self.inner.jobs.borrow_mut().push_back(Box::new(job));
    }

    pub fn pending_jobs(&self) -> usize {
        self.inner.jobs.borrow().len()
    }

    /// Total jobs executed by this runtime.
    pub fn jobs_run(&self) -> u64 {
        self.inner.jobs_run.get()
    }

    /// Run the oldest queued job. Returns false when the queue was empty.
    pub fn run_one(&self) -> bool {
        // The borrow must end before the job runs; jobs enqueue more jobs.
        let job = self.inner.jobs.borrow_mut().pop_front();
        match job {
            Some(job) => {
                job();
                self.inner.jobs_run.set(self.inner.jobs_run.get() + 1);
                true
            }
            None => false,
        }
    }

    /// Drain the queue, then report orphaned rejections to the fallback hook.
    /// Repeats until nothing is left to do.
    pub fn run_until_idle(&self) -> Result<DrainStats, RuntimeFault> {
        let mut stats = DrainStats::default();
        loop {
            while self.run_one() {
                stats.jobs_run += 1;
                if stats.jobs_run as usize > MAX_SCHEDULER_JOBS {
                    return Err(RuntimeFault::JobLimitExceeded {
                        limit: MAX_SCHEDULER_JOBS,
                    });
                }
            }
            stats.orphans_reported += self.report_orphaned_rejections();
            if let Some(fault) = self.take_fault() {
                return Err(fault);
            }
            if self.pending_jobs() == 0 {
                tracing::debug!(
                    jobs = stats.jobs_run,
                    orphans = stats.orphans_reported,
                    "runtime idle"
                );
                return Ok(stats);
            }
        }
    }

    // =========================================================================
    // Orphaned rejections
    // =========================================================================

    pub(crate) fn track_rejection(&self, cell: Thenable) {
        self.inner.rejections.borrow_mut().push(cell);
    }

    fn report_orphaned_rejections(&self) -> usize {
        let tracked: Vec<Thenable> = self.inner.rejections.borrow_mut().drain(..).collect();
        let mut reported = 0;
        for cell in tracked {
            if cell.is_handled() {
                continue;
            }
            if let Some(Err(reason)) = cell.outcome() {
                reported += 1;
                self.report_orphan(&reason);
            }
        }
        reported
    }

    /// Send an error that reached no handler to the fallback hook. An
    /// escalation is kept as a fault for the next drain to return.
    pub fn report_orphan(&self, reason: &Value) {
        tracing::debug!(reason = %reason.to_display_string(), "orphaned rejection");
        if hook::dispatch(reason) == HookVerdict::Escalate {
            self.inner
                .faults
                .borrow_mut()
                .push(RuntimeFault::UnhandledRejection {
                    reason: reason.to_display_string(),
                });
        }
    }

    /// The first escalated fault, if any.
    pub fn take_fault(&self) -> Option<RuntimeFault> {
        let mut faults = self.inner.faults.borrow_mut();
        if faults.is_empty() {
            None
        } else {
            Some(faults.remove(0))
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new(RuntimeOptions::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.inner.options)
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}
