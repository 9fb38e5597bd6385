//! Reactive Primitives
//!
//! This module implements the core reactive system: effects, refs, reactive
//! objects, computeds and watchers. These primitives form the foundation of
//! Trellis's state propagation.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a re-runnable computation. While it runs, it becomes the
//! implicit subscriber of every piece of reactive state it reads. When any
//! of that state changes, the effect runs again, or hands itself to its
//! scheduler.
//!
//! ## Refs and Reactive Objects
//!
//! A Ref holds a single value. A Reactive wraps an object and tracks each
//! property separately. Both call `track` on reads and `trigger` on writes
//! that actually change something.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result and re-evaluates
//! lazily, only after one of its dependencies has changed.
//!
//! ## Watchers
//!
//! A watcher runs a callback when a source changes, batched through the
//! [`scheduler`](crate::scheduler).
//!
//! # Implementation Notes
//!
//! All state is thread-local. The dependency graph is owned by the
//! [`Runtime`] and keyed by [`SourceId`]; sources release their entries when
//! dropped.

mod computed;
mod context;
mod effect;
mod equality;
mod object;
mod refs;
mod runtime;
mod subscriber;
mod watch;

pub use computed::{computed, computed_with_setter, Computed};
pub use context::{untrack, ReactiveContext};
pub use effect::{effect, effect_with_options, Effect, EffectOptions, SchedulerFn, WeakEffect};
pub use equality::{has_changed, same_f32, same_f64, RefValue};
pub use object::{is_reactive, reactive, Object, Reactive, Value};
pub use refs::{ref_, Ref};
pub use runtime::{DepKey, Runtime, Subscriber};
pub use subscriber::{SourceId, SubscriberId};
pub use watch::{traverse, watch, watch_effect, WatchHandle, WatchOptions, WatchSource};
