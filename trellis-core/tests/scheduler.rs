//! Scheduler Integration Tests
//!
//! Fault isolation and re-entrancy of the job queue, driven through
//! watchers and raw jobs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::reactive::{ref_, watch, watch_effect, WatchOptions};
use trellis_core::scheduler::{
    flush_jobs, has_pending_flush, pending_jobs, queue_job, run_until_idle, Job,
};
use trellis_core::Error;

/// A panicking job does not stop the jobs after it, and the flush returns
/// normally with the failure recorded.
#[test]
fn failing_job_is_isolated() {
    let observed = Rc::new(Cell::new(false));
    let a = Job::labeled("a", || panic!("boom"));
    let b = Job::labeled("b", {
        let observed = observed.clone();
        move || observed.set(true)
    });

    queue_job(&a);
    queue_job(&b);
    let report = flush_jobs();

    assert!(observed.get());
    assert_eq!(report.ran, 2);
    assert_eq!(report.failed.len(), 1);
    match &report.failed[0] {
        Error::JobPanicked { job, message } => {
            assert_eq!(job, "a");
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!has_pending_flush());
}

/// The queue still works after a flush in which a job panicked.
#[test]
fn queue_recovers_after_failure() {
    queue_job(&Job::new(|| panic!("first flush")));
    assert!(!flush_jobs().is_ok());

    let ran = Rc::new(Cell::new(0));
    let job = Job::new({
        let ran = ran.clone();
        move || ran.set(ran.get() + 1)
    });
    queue_job(&job);
    queue_job(&job);
    assert_eq!(pending_jobs(), 2);

    let report = flush_jobs();
    assert!(report.is_ok());
    assert_eq!(ran.get(), 1);
}

/// A watcher whose callback panics does not prevent other watchers from
/// seeing the same change.
#[test]
fn panicking_watcher_does_not_block_others() {
    let count = ref_(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let _bad = watch(&count, |_: &i32, _: Option<&i32>| panic!("bad watcher"), WatchOptions::new());
    let _good = watch(
        &count,
        {
            let seen = seen.clone();
            move |new: &i32, _: Option<&i32>| seen.borrow_mut().push(*new)
        },
        WatchOptions::new(),
    );

    count.set(7);
    let report = flush_jobs();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(*seen.borrow(), vec![7]);

    count.set(8);
    flush_jobs();
    assert_eq!(*seen.borrow(), vec![7, 8]);
}

/// Work triggered during a flush lands in the next flush, and
/// `run_until_idle` drains it.
#[test]
fn writes_during_flush_defer_to_next_flush() {
    let source = ref_(0);
    let mirror = ref_(0);
    let log = Rc::new(RefCell::new(Vec::new()));

    let _copy = watch_effect({
        let (source, mirror) = (source.clone(), mirror.clone());
        move || {
            mirror.set(source.get() * 10);
        }
    });
    let _record = watch_effect({
        let (mirror, log) = (mirror.clone(), log.clone());
        move || log.borrow_mut().push(mirror.get())
    });
    assert_eq!(*log.borrow(), vec![0]);

    source.set(1);
    let first = flush_jobs();
    assert_eq!(first.ran, 1);
    assert_eq!(*log.borrow(), vec![0]);
    assert!(has_pending_flush());

    let rest = run_until_idle().expect("settles");
    assert_eq!(rest.ran, 1);
    assert_eq!(*log.borrow(), vec![0, 10]);
}

/// A job that always re-queues itself is reported instead of looping.
#[test]
fn livelock_hits_recursion_limit() {
    let slot: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));
    let job = Job::new({
        let slot = slot.clone();
        move || {
            if let Some(job) = slot.borrow().as_ref() {
                queue_job(job);
            }
        }
    });
    *slot.borrow_mut() = Some(job.clone());
    queue_job(&job);

    match run_until_idle() {
        Err(Error::RecursionLimit { limit }) => assert!(limit > 0),
        other => panic!("expected recursion limit, got {other:?}"),
    }

    // Break the cycle so the queue can drain.
    slot.borrow_mut().take();
    flush_jobs();
    assert!(!has_pending_flush());
}
