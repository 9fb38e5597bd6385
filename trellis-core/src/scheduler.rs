//! Job Scheduler
//!
//! Deduplicates and batches jobs into one deferred flush per synchronous
//! turn.
//!
//! # Flush Model
//!
//! There is no ambient microtask queue to defer to, so the deferred flush is
//! an explicit checkpoint. [`queue_job`] records the job and marks a flush
//! as pending; whoever drives the event loop calls [`flush_jobs`] once the
//! current synchronous work has completed.
//!
//! A flush clears the pending flag *before* running anything, so a job that
//! queues more work schedules a new flush instead of extending the current
//! one. [`run_until_idle`] keeps flushing until nothing is pending.
//!
//! # Fault Isolation
//!
//! Each job runs inside `catch_unwind`. A panicking job is logged and
//! reported in the [`FlushReport`]; the jobs after it still run.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{panic_message, Error, Result};

/// Upper bound on consecutive flushes in [`run_until_idle`].
pub const MAX_FLUSH_ITERATIONS: usize = 1000;

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier of a job. Deduplication is by ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn new() -> Self {
        Self(JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

struct JobInner {
    id: JobId,
    label: Option<Rc<str>>,
    run: Box<dyn Fn()>,
}

/// A queued unit of work.
///
/// Clones share identity: queueing two clones of one job in the same turn
/// runs it once.
#[derive(Clone)]
pub struct Job(Rc<JobInner>);

impl Job {
    /// Create a job.
    pub fn new(run: impl Fn() + 'static) -> Self {
        Self(Rc::new(JobInner {
            id: JobId::new(),
            label: None,
            run: Box::new(run),
        }))
    }

    /// Create a job with a label used in logs and errors.
    pub fn labeled(label: impl Into<Rc<str>>, run: impl Fn() + 'static) -> Self {
        Self(Rc::new(JobInner {
            id: JobId::new(),
            label: Some(label.into()),
            run: Box::new(run),
        }))
    }

    pub fn id(&self) -> JobId {
        self.0.id
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Run the job immediately, outside any flush.
    pub fn run(&self) {
        (self.0.run)();
    }

    fn name(&self) -> String {
        match &self.0.label {
            Some(label) => label.to_string(),
            None => self.0.id.to_string(),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.0.id)
            .field("label", &self.0.label)
            .finish()
    }
}

/// Outcome of one flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Jobs that ran, including failed ones.
    pub ran: usize,
    /// One entry per job that panicked.
    pub failed: Vec<Error>,
}

impl FlushReport {
    /// Whether every job completed.
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
struct Queue {
    pending: RefCell<Vec<Job>>,
    flush_pending: Cell<bool>,
}

thread_local! {
    static QUEUE: Queue = Queue::default();
}

/// Queue a job for the next flush.
pub fn queue_job(job: &Job) {
    QUEUE.with(|queue| {
        queue.pending.borrow_mut().push(job.clone());
        if !queue.flush_pending.replace(true) {
            tracing::trace!(job = %job.id(), "flush scheduled");
        }
    });
}

/// Remove a job from the pending list. Returns whether it was queued.
pub fn invalidate_job(job: &Job) -> bool {
    QUEUE.with(|queue| {
        let mut pending = queue.pending.borrow_mut();
        let before = pending.len();
        pending.retain(|queued| queued.id() != job.id());
        let removed = pending.len() != before;
        if pending.is_empty() {
            queue.flush_pending.set(false);
        }
        removed
    })
}

/// Whether a flush has been scheduled and not yet run.
pub fn has_pending_flush() -> bool {
    QUEUE.with(|queue| queue.flush_pending.get())
}

/// Number of queued entries, duplicates included.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| queue.pending.borrow().len())
}

/// Run every pending job once, in first-queued order.
///
/// Jobs queued while this runs wait for the next flush.
pub fn flush_jobs() -> FlushReport {
    let jobs = QUEUE.with(|queue| {
        queue.flush_pending.set(false);
        std::mem::take(&mut *queue.pending.borrow_mut())
    });

    let mut seen = HashSet::with_capacity(jobs.len());
    let jobs: Vec<Job> = jobs.into_iter().filter(|job| seen.insert(job.id())).collect();

    let mut report = FlushReport::default();
    if jobs.is_empty() {
        return report;
    }

    tracing::debug!(jobs = jobs.len(), "flush start");

    for job in &jobs {
        report.ran += 1;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
            let err = Error::JobPanicked {
                job: job.name(),
                message: panic_message(payload.as_ref()),
            };
            tracing::error!(error = %err, "job failed");
            report.failed.push(err);
        }
    }

    tracing::debug!(ran = report.ran, failed = report.failed.len(), "flush end");
    report
}

/// Flush until no job is pending.
///
/// Fails with [`Error::RecursionLimit`] if jobs keep re-queueing work for
/// more than [`MAX_FLUSH_ITERATIONS`] flushes. Job failures are collected
/// into the returned report, not returned as errors.
pub fn run_until_idle() -> Result<FlushReport> {
    let mut total = FlushReport::default();

    for _ in 0..MAX_FLUSH_ITERATIONS {
        if !has_pending_flush() && pending_jobs() == 0 {
            return Ok(total);
        }
        let report = flush_jobs();
        total.ran += report.ran;
        total.failed.extend(report.failed);
    }

    if !has_pending_flush() && pending_jobs() == 0 {
        return Ok(total);
    }

    tracing::warn!(limit = MAX_FLUSH_ITERATIONS, "scheduler did not settle");
    Err(Error::RecursionLimit {
        limit: MAX_FLUSH_ITERATIONS,
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
