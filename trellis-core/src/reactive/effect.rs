//! Effect Implementation
//!
//! An Effect is a re-runnable unit of work that becomes the implicit
//! subscriber of any reactive state it reads while running.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazily).
//!
//! 2. When any dependency changes, the effect is notified. With a scheduler
//!    the scheduler is called instead of the body; without one the body
//!    re-runs synchronously.
//!
//! 3. Before re-running, the effect leaves every Dep it belongs to and
//!    re-subscribes to exactly what the new run reads, so branches that are
//!    no longer taken stop triggering it.
//!
//! # Stopping
//!
//! [`Effect::stop`] removes the effect from every Dep and from the runtime
//! registry. A stopped effect can still be run by hand, but its reads are
//! not tracked.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::ReactiveContext;
use super::runtime::{Runtime, Subscriber};
use super::subscriber::SubscriberId;

/// Callback invoked instead of the effect body when a dependency changes.
pub type SchedulerFn = Rc<dyn Fn()>;

/// Options for [`Effect::with_options`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run the effect on creation.
    pub lazy: bool,
    /// Called instead of re-running the body when a dependency changes.
    pub scheduler: Option<SchedulerFn>,
}

impl EffectOptions {
    /// Default options: run immediately, re-run synchronously.
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run the effect on creation.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Route dependency changes through `scheduler`.
    pub fn with_scheduler(mut self, scheduler: impl Fn() + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

pub(crate) struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    id: SubscriberId,

    /// The effect function.
    run: Rc<dyn Fn()>,

    /// Optional scheduler.
    scheduler: Option<SchedulerFn>,

    /// Whether this effect backs a computed value.
    computed: bool,

    /// Cleared by `stop`.
    active: Cell<bool>,

    /// Number of times the body has run.
    run_count: Cell<usize>,
}

impl EffectInner {
    fn run_tracked(&self) {
        if !self.active.get() {
            let _ctx = ReactiveContext::enter_untracked();
            (self.run)();
            return;
        }

        Runtime::clear_dependencies(self.id);
        let _ctx = ReactiveContext::enter(self.id);
        self.run_count.set(self.run_count.get() + 1);
        (self.run)();
    }
}

impl Subscriber for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn is_computed(&self) -> bool {
        self.computed
    }

    fn notify(&self) {
        if !self.active.get() {
            return;
        }
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => self.run_tracked(),
        }
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// `Effect` is a cheap handle; clones refer to the same effect. The runtime
/// keeps the effect alive until it is stopped, so dropping every handle
/// does not stop it.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::reactive::{ref_, Effect};
///
/// let count = ref_(0);
/// let seen = Rc::new(Cell::new(0));
///
/// let effect = Effect::new({
///     let count = count.clone();
///     let seen = seen.clone();
///     move || seen.set(count.get())
/// });
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
/// effect.stop();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it immediately.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create a new effect without running it.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, EffectOptions::new().lazy())
    }

    /// Create a new effect with explicit options.
    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self::build(Rc::new(run), options.scheduler, false);
        if !options.lazy {
            effect.run();
        }
        effect
    }

    /// Create the (lazy, scheduled) effect that backs a computed value.
    pub(crate) fn for_computed(run: Rc<dyn Fn()>, scheduler: SchedulerFn) -> Self {
        Self::build(run, Some(scheduler), true)
    }

    fn build(run: Rc<dyn Fn()>, scheduler: Option<SchedulerFn>, computed: bool) -> Self {
        let inner = Rc::new(EffectInner {
            id: SubscriberId::new(),
            run,
            scheduler,
            computed,
            active: Cell::new(true),
            run_count: Cell::new(0),
        });
        Runtime::register(inner.clone());
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the effect body now, tracking what it reads.
    ///
    /// A panic in the body propagates to the caller; the active-effect
    /// stack is restored on the way out.
    pub fn run(&self) {
        self.inner.run_tracked();
    }

    /// Stop the effect.
    ///
    /// After stopping, no dependency change reaches this effect again.
    pub fn stop(&self) {
        if self.inner.active.replace(false) {
            tracing::debug!(effect = %self.inner.id, "effect stopped");
            Runtime::unregister(self.inner.id);
        }
    }

    /// Check if the effect is still subscribed.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Whether this effect backs a computed value.
    pub fn is_computed(&self) -> bool {
        self.inner.computed
    }

    /// Get the number of times the effect has run while active.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of Deps the effect belongs to.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.id)
    }

    /// Create a weak handle that does not keep the effect alive.
    pub fn downgrade(&self) -> WeakEffect {
        WeakEffect {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Check whether two handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Weak counterpart of [`Effect`].
#[derive(Clone, Default)]
pub struct WeakEffect {
    inner: Weak<EffectInner>,
}

impl WeakEffect {
    /// Upgrade to a strong handle if the effect still exists.
    pub fn upgrade(&self) -> Option<Effect> {
        self.inner.upgrade().map(|inner| Effect { inner })
    }
}

/// Create an effect and run it immediately.
pub fn effect<F>(run: F) -> Effect
where
    F: Fn() + 'static,
{
    Effect::new(run)
}

/// Create an effect with options.
pub fn effect_with_options<F>(run: F, options: EffectOptions) -> Effect
where
    F: Fn() + 'static,
{
    Effect::with_options(run, options)
}
