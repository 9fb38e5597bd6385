//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies changes.
//!
//! # How Computeds Work
//!
//! 1. A computed owns a lazy [`Effect`] wrapping its getter and a `dirty`
//!    flag that starts out `true`.
//!
//! 2. Reading the computed tracks it like a ref. If it is dirty, the effect
//!    runs the getter, the result is cached and `dirty` is cleared.
//!
//! 3. When a dependency changes, the effect's scheduler marks the computed
//!    dirty instead of recomputing. Only the clean-to-dirty transition
//!    notifies the computed's own subscribers; re-marking a dirty computed
//!    is a no-op.
//!
//! Because the runtime notifies computed-backing effects before any other
//! effect, a computed is always dirty by the time an effect that reads it
//! re-runs.
//!
//! A computed that is never read again never recomputes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::Effect;
use super::equality::RefValue;
use super::runtime::{DepKey, Runtime};
use super::subscriber::SourceId;
use crate::error::{Error, Result};

type Getter<T> = Box<dyn Fn() -> T>;
type Setter<T> = Box<dyn Fn(T)>;

struct ComputedInner<T: RefValue> {
    /// Unique identifier used as the Dep target.
    id: SourceId,

    getter: Getter<T>,

    setter: Option<Setter<T>>,

    /// Cached value from the last evaluation.
    value: RefCell<Option<T>>,

    /// Set when a dependency changed since the last evaluation.
    dirty: Cell<bool>,

    /// Number of getter invocations.
    evaluations: Cell<usize>,

    /// The effect that tracks the getter's dependencies.
    effect: Effect,
}

impl<T: RefValue> ComputedInner<T> {
    fn evaluate(&self) {
        let value = (self.getter)();
        self.evaluations.set(self.evaluations.get() + 1);
        *self.value.borrow_mut() = Some(value);
    }

    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            Runtime::trigger(self.id, DepKey::Value);
        }
    }
}

/// Marks the computed dirty again if the getter unwinds, so the next read
/// retries instead of seeing a clean computed with no value.
struct DirtyOnUnwind<'a>(&'a Cell<bool>);

impl Drop for DirtyOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set(true);
        }
    }
}

impl<T: RefValue> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
        Runtime::release_source(self.id);
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{computed, ref_};
///
/// let count = ref_(2);
/// let doubled = computed({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: RefValue> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: RefValue> Computed<T> {
    /// Create a new readonly computed.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(Box::new(getter), None)
    }

    /// Create a new writable computed.
    pub fn with_setter<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::build(Box::new(getter), Some(Box::new(setter)))
    }

    fn build(getter: Getter<T>, setter: Option<Setter<T>>) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let run = {
                let weak = weak.clone();
                Rc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.evaluate();
                    }
                })
            };
            let scheduler = {
                let weak = weak.clone();
                Rc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate();
                    }
                })
            };

            ComputedInner {
                id: SourceId::new(),
                getter,
                setter,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                evaluations: Cell::new(0),
                effect: Effect::for_computed(run, scheduler),
            }
        });

        Self { inner }
    }

    /// Get the computed's source ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the value, recomputing it first if it is dirty.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.id, DepKey::Value);

        if self.inner.dirty.replace(false) {
            let _restore = DirtyOnUnwind(&self.inner.dirty);
            self.inner.effect.run();
        }

        let cached = self.inner.value.borrow().clone();
        match cached {
            Some(value) => value,
            None => {
                let value = (self.inner.getter)();
                self.inner.evaluations.set(self.inner.evaluations.get() + 1);
                *self.inner.value.borrow_mut() = Some(value.clone());
                value
            }
        }
    }

    /// Write through the setter.
    ///
    /// Fails with [`Error::ReadonlyComputed`] when there is no setter.
    pub fn set(&self, value: T) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                tracing::warn!(computed = %self.inner.id, "write to readonly computed ignored");
                Err(Error::ReadonlyComputed)
            }
        }
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Whether this computed has a setter.
    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Number of times the getter has run.
    pub fn evaluations(&self) -> usize {
        self.inner.evaluations.get()
    }

    /// The effect that tracks the getter.
    pub fn effect(&self) -> &Effect {
        &self.inner.effect
    }

    /// Check whether two handles refer to the same computed.
    pub fn ptr_eq(&self, other: &Computed<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: RefValue> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: RefValue + fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Create a readonly computed.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: RefValue,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

/// Create a writable computed.
pub fn computed_with_setter<T, G, S>(getter: G, setter: S) -> Computed<T>
where
    T: RefValue,
    G: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    Computed::with_setter(getter, setter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::refs::ref_;

    #[test]
    fn computed_is_lazy() {
        let count = ref_(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });

        assert!(doubled.is_dirty());
        assert_eq!(doubled.evaluations(), 0);

        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.evaluations(), 1);
    }

    #[test]
    fn computed_memoizes() {
        let count = ref_(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });

        doubled.get();
        doubled.get();
        assert_eq!(doubled.evaluations(), 1);

        count.set(2);
        assert!(doubled.is_dirty());
        // Invalidation alone does not recompute.
        assert_eq!(doubled.evaluations(), 1);

        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.evaluations(), 2);
    }

    #[test]
    fn chained_computeds() {
        let a = ref_(1);
        let b = computed({
            let a = a.clone();
            move || a.get() + 1
        });
        let c = computed({
            let b = b.clone();
            move || b.get() * 10
        });

        assert_eq!(c.get(), 20);
        a.set(4);
        assert!(c.is_dirty());
        assert_eq!(c.get(), 50);
    }

    #[test]
    fn effect_reading_computed_sees_fresh_value() {
        let count = ref_(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });

        let seen = Rc::new(RefCell::new(Vec::new()));
        // The effect reads the ref directly as well, and subscribes to it
        // before the computed does.
        let effect = Effect::new({
            let (count, doubled, seen) = (count.clone(), doubled.clone(), seen.clone());
            move || {
                let c = count.get();
                seen.borrow_mut().push((c, doubled.get()));
            }
        });

        count.set(3);
        let seen = seen.borrow();
        assert_eq!(seen.first(), Some(&(1, 2)));
        assert_eq!(seen.last(), Some(&(3, 6)));
        // Never a stale cached value next to a fresh ref value.
        assert!(seen.iter().all(|(c, d)| *d == c * 2));
        effect.stop();
    }

    #[test]
    fn dirty_marking_is_idempotent() {
        let a = ref_(1);
        let b = ref_(1);
        let sum = computed({
            let (a, b) = (a.clone(), b.clone());
            move || a.get() + b.get()
        });

        let runs = Rc::new(Cell::new(0));
        let effect = Effect::with_options(
            {
                let sum = sum.clone();
                move || {
                    sum.get();
                }
            },
            crate::reactive::effect::EffectOptions::new().with_scheduler({
                let runs = runs.clone();
                move || runs.set(runs.get() + 1)
            }),
        );

        a.set(2);
        b.set(2);
        // Second write finds the computed already dirty.
        assert_eq!(runs.get(), 1);
        assert_eq!(sum.get(), 4);
        effect.stop();
    }

    #[test]
    fn readonly_and_writable() {
        let count = ref_(1);
        let readonly = computed({
            let count = count.clone();
            move || count.get()
        });
        assert_eq!(readonly.set(5), Err(Error::ReadonlyComputed));
        assert!(!readonly.is_writable());

        let plus_one = computed_with_setter(
            {
                let count = count.clone();
                move || count.get() + 1
            },
            {
                let count = count.clone();
                move |value: i32| {
                    count.set(value - 1);
                }
            },
        );
        assert!(plus_one.set(10).is_ok());
        assert_eq!(count.get(), 9);
        assert_eq!(plus_one.get(), 10);
    }

    #[test]
    fn dropping_computed_stops_its_effect() {
        let count = ref_(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });
        doubled.get();
        assert_eq!(count.subscriber_count(), 1);

        drop(doubled);
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn panicking_getter_leaves_computed_dirty() {
        let fail = ref_(true);
        let count = ref_(5);
        let doubled = computed({
            let (fail, count) = (fail.clone(), count.clone());
            move || {
                if fail.get() {
                    panic!("getter failed");
                }
                count.get() * 2
            }
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| doubled.get()));
        assert!(result.is_err());
        assert!(doubled.is_dirty());

        fail.set(false);
        assert_eq!(doubled.get(), 10);
        assert!(!doubled.is_dirty());

        count.set(6);
        assert_eq!(doubled.get(), 12);
    }
}
