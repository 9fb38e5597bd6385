//! Watchers
//!
//! A watcher runs a callback when a reactive source changes. It is an
//! effect whose scheduler queues a [`Job`] instead of re-running
//! synchronously, so any number of writes in one turn produce a single
//! callback at the next flush.
//!
//! # Sources
//!
//! - a [`Ref`] or [`Computed`]: the callback fires when the value changes
//!   (same-value rule);
//! - a [`Reactive`] object: watched deeply, the callback fires on any
//!   nested write;
//! - a getter closure: the callback fires when the returned value changes.
//!
//! With `deep`, the watcher traverses the returned value so nested reads
//! are tracked, and the callback fires on every trigger even if the
//! top-level value is the same object.

use std::cell::{OnceCell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use super::computed::Computed;
use super::context::untrack;
use super::effect::{Effect, EffectOptions, WeakEffect};
use super::equality::{has_changed, RefValue};
use super::object::{Reactive, Value};
use super::refs::Ref;
use crate::scheduler::{invalidate_job, queue_job, Job};

/// Something a watcher can observe.
pub struct WatchSource<T: RefValue> {
    getter: Rc<dyn Fn() -> T>,
    deep: bool,
}

impl<T: RefValue> WatchSource<T> {
    /// Watch the value returned by `getter`.
    pub fn getter(getter: impl Fn() -> T + 'static) -> Self {
        Self {
            getter: Rc::new(getter),
            deep: false,
        }
    }
}

impl<T: RefValue> From<Ref<T>> for WatchSource<T> {
    fn from(source: Ref<T>) -> Self {
        Self::getter(move || source.get())
    }
}

impl<T: RefValue> From<&Ref<T>> for WatchSource<T> {
    fn from(source: &Ref<T>) -> Self {
        source.clone().into()
    }
}

impl<T: RefValue> From<Computed<T>> for WatchSource<T> {
    fn from(source: Computed<T>) -> Self {
        Self::getter(move || source.get())
    }
}

impl<T: RefValue> From<&Computed<T>> for WatchSource<T> {
    fn from(source: &Computed<T>) -> Self {
        source.clone().into()
    }
}

/// Reactive objects are always watched deeply.
impl From<Reactive> for WatchSource<Value> {
    fn from(source: Reactive) -> Self {
        Self {
            getter: Rc::new(move || Value::Reactive(source.clone())),
            deep: true,
        }
    }
}

impl From<&Reactive> for WatchSource<Value> {
    fn from(source: &Reactive) -> Self {
        source.clone().into()
    }
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Call the callback once right away, with no old value.
    pub immediate: bool,
    /// Track nested reads and fire on every trigger.
    pub deep: bool,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }
}

/// Handle to a running watcher.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    effect: Effect,
    job: Job,
}

impl WatchHandle {
    /// Stop watching. A callback already queued for the next flush is
    /// dropped.
    pub fn stop(&self) {
        self.effect.stop();
        invalidate_job(&self.job);
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }

    /// The effect tracking the source.
    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

/// Read every nested reactive value so the running effect tracks it.
pub fn traverse<T: RefValue>(value: &T) {
    let mut seen = HashSet::new();
    value.traverse(&mut seen);
}

/// Watch `source` and call `callback(new, old)` when it changes.
///
/// Callbacks run from the scheduler, so they are batched per flush. `old`
/// is `None` only for the immediate call.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use trellis_core::reactive::{ref_, watch, WatchOptions};
/// use trellis_core::scheduler::flush_jobs;
///
/// let count = ref_(0);
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let handle = watch(&count, {
///     let log = log.clone();
///     move |new: &i32, old: Option<&i32>| log.borrow_mut().push((*new, old.copied()))
/// }, WatchOptions::new());
///
/// count.set(1);
/// count.set(2);
/// flush_jobs();
/// assert_eq!(*log.borrow(), vec![(2, Some(0))]);
/// handle.stop();
/// ```
pub fn watch<T, S, F>(source: S, callback: F, options: WatchOptions) -> WatchHandle
where
    T: RefValue,
    S: Into<WatchSource<T>>,
    F: Fn(&T, Option<&T>) + 'static,
{
    let source = source.into();
    let deep = options.deep || source.deep;

    let latest: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let old: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let slot: Rc<OnceCell<WeakEffect>> = Rc::new(OnceCell::new());

    let job = Job::labeled("watch", {
        let (latest, old, slot) = (latest.clone(), old.clone(), slot.clone());
        move || {
            let Some(effect) = slot.get().and_then(WeakEffect::upgrade) else {
                return;
            };
            if !effect.is_active() {
                return;
            }

            effect.run();
            let Some(new) = latest.borrow_mut().take() else {
                return;
            };
            let previous = old.borrow_mut().take();

            let changed = previous.as_ref().map_or(true, |prev| has_changed(&new, prev));
            if deep || changed {
                untrack(|| callback(&new, previous.as_ref()));
            }
            *old.borrow_mut() = Some(new);
        }
    });

    let effect = Effect::with_options(
        {
            let getter = source.getter;
            let latest = latest.clone();
            move || {
                let value = getter();
                if deep {
                    traverse(&value);
                }
                *latest.borrow_mut() = Some(value);
            }
        },
        EffectOptions::new().lazy().with_scheduler({
            let job = job.clone();
            move || queue_job(&job)
        }),
    );
    let _ = slot.set(effect.downgrade());

    if options.immediate {
        job.run();
    } else {
        effect.run();
        *old.borrow_mut() = latest.borrow_mut().take();
    }

    WatchHandle { effect, job }
}

/// Run `f` now and again at the next flush after anything it read changes.
pub fn watch_effect<F>(f: F) -> WatchHandle
where
    F: Fn() + 'static,
{
    let slot: Rc<OnceCell<WeakEffect>> = Rc::new(OnceCell::new());

    let job = Job::labeled("watch_effect", {
        let slot = slot.clone();
        move || {
            if let Some(effect) = slot.get().and_then(WeakEffect::upgrade) {
                if effect.is_active() {
                    effect.run();
                }
            }
        }
    });

    let effect = Effect::with_options(
        f,
        EffectOptions::new().lazy().with_scheduler({
            let job = job.clone();
            move || queue_job(&job)
        }),
    );
    let _ = slot.set(effect.downgrade());
    effect.run();

    WatchHandle { effect, job }
}
