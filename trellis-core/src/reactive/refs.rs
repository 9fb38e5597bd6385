//! Ref Implementation
//!
//! A Ref is the single-value reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Refs Work
//!
//! 1. When a ref is read while an effect is running, the effect joins the
//!    ref's Dep.
//!
//! 2. When a ref is written with a value that is not the *same value* as
//!    the current one (see [`RefValue::same_value`]), the Dep is triggered.
//!    Unchanged writes are no-ops.
//!
//! # Raw and Exposed Values
//!
//! A ref keeps two copies: the raw value, used to detect changes, and the
//! exposed value returned by [`Ref::get`]. For most types they are the same.
//! For a [`Value`](super::Value) holding an object, the exposed copy is the
//! reactive wrapper, so reads through the ref stay deeply reactive.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::equality::RefValue;
use super::runtime::{DepKey, Runtime};
use super::subscriber::SourceId;

struct RefInner<T> {
    /// Unique identifier used as the Dep target.
    id: SourceId,

    /// The last assigned value in raw form.
    raw: RefCell<T>,

    /// The value handed to readers.
    value: RefCell<T>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        Runtime::release_source(self.id);
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Cloning a `Ref` clones the handle, not the value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::ref_;
///
/// let count = ref_(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// count.update(|n| *n += 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Ref<T: RefValue> {
    inner: Rc<RefInner<T>>,
}

impl<T: RefValue> Ref<T> {
    /// Create a new ref with the given initial value.
    pub fn new(value: T) -> Self {
        let raw = value.to_raw();
        let exposed = value.to_reactive();
        Self {
            inner: Rc::new(RefInner {
                id: SourceId::new(),
                raw: RefCell::new(raw),
                value: RefCell::new(exposed),
            }),
        }
    }

    /// Get the ref's source ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value, tracking it if an effect is running.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.id, DepKey::Value);
        self.get_untracked()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Read the current value by reference, tracking it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.id, DepKey::Value);
        f(&self.inner.value.borrow())
    }

    /// Set a new value. Returns whether the value changed.
    ///
    /// Subscribers are notified only on a change.
    pub fn set(&self, value: T) -> bool {
        let raw = value.to_raw();
        if raw.same_value(&self.inner.raw.borrow()) {
            return false;
        }

        let exposed = value.to_reactive();
        *self.inner.raw.borrow_mut() = raw;
        *self.inner.value.borrow_mut() = exposed;

        Runtime::trigger(self.inner.id, DepKey::Value);
        true
    }

    /// Update the value with a function of the current value.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut value = self.get_untracked();
        f(&mut value);
        self.set(value)
    }

    /// Trigger subscribers without changing the value.
    pub fn trigger(&self) {
        Runtime::trigger(self.inner.id, DepKey::Value);
    }

    /// Number of effects subscribed to this ref.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id, &DepKey::Value)
    }

    /// Check whether two handles refer to the same ref.
    pub fn ptr_eq(&self, other: &Ref<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: RefValue> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: RefValue> From<T> for Ref<T> {
    fn from(value: T) -> Self {
        Ref::new(value)
    }
}

impl<T: RefValue + fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Create a ref.
///
/// Accepts a plain value or an existing ref; an existing ref is returned
/// unchanged.
///
/// ```rust
/// use trellis_core::reactive::{ref_, Ref};
///
/// let a: Ref<i32> = ref_(1);
/// let b = ref_(a.clone());
/// assert!(a.ptr_eq(&b));
/// ```
pub fn ref_<T: RefValue>(value: impl Into<Ref<T>>) -> Ref<T> {
    value.into()
}
