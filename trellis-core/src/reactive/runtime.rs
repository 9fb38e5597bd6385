//! Reactive Runtime
//!
//! The runtime is the reactivity context that owns the dependency graph. It
//! connects reactive sources (refs, computeds, objects) to the effects that
//! read them, and re-runs exactly the affected effects when a source changes.
//!
//! # How It Works
//!
//! 1. Every effect registers with the runtime when it is created. The
//!    registry owns the effect until it is stopped.
//!
//! 2. When a source is read while an effect is running, [`Runtime::track`]
//!    adds that effect to the Dep for `(source, key)`. The effect also
//!    records the membership, so stopping it or re-running it can leave
//!    every Dep it belongs to without scanning the whole graph.
//!
//! 3. When a source is written, [`Runtime::trigger`] snapshots the Dep and
//!    notifies its effects in two passes: effects backing a computed first,
//!    then everything else. A computed's cache is therefore invalidated
//!    before any effect that reads it re-runs.
//!
//! 4. Notifying an effect either calls its scheduler or runs it
//!    synchronously.
//!
//! # Ownership
//!
//! The graph is keyed by [`SourceId`], never by the source itself. Sources
//! call [`Runtime::release_source`] from their `Drop` impl so their entries
//! do not outlive them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{SourceId, SubscriberId};

/// The property of a source that a Dep is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// The single value of a ref or computed.
    Value,
    /// A named property of a reactive object.
    Prop(Rc<str>),
    /// The key set of a reactive object (enumeration, length).
    Iterate,
}

impl DepKey {
    /// Key for a named property.
    pub fn prop(name: &str) -> Self {
        DepKey::Prop(Rc::from(name))
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Value => f.write_str("value"),
            DepKey::Prop(name) => write!(f, ".{name}"),
            DepKey::Iterate => f.write_str("[iterate]"),
        }
    }
}

/// A computation that can be notified when a Dep it belongs to is triggered.
pub trait Subscriber {
    /// Get the subscriber ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// Whether this subscriber backs a computed value.
    ///
    /// Computed subscribers are notified before all others.
    fn is_computed(&self) -> bool;

    /// React to a dependency change: call the scheduler if there is one,
    /// otherwise re-run synchronously.
    fn notify(&self);
}

/// A set of subscribers for one property of one source.
///
/// `IndexSet` gives set semantics with a deterministic notification order.
type Dep = IndexSet<SubscriberId>;

/// One `(source, key)` pair an effect is subscribed to.
type Membership = (SourceId, DepKey);

#[derive(Default)]
struct Graph {
    /// source -> key -> subscribers
    targets: HashMap<SourceId, HashMap<DepKey, Dep>>,
    /// Registered effects, owned until unregistered.
    subscribers: HashMap<SubscriberId, Rc<dyn Subscriber>>,
    /// subscriber -> every Dep it currently belongs to
    memberships: HashMap<SubscriberId, SmallVec<[Membership; 4]>>,
}

impl Graph {
    fn detach(&mut self, subscriber_id: SubscriberId) {
        let Some(memberships) = self.memberships.remove(&subscriber_id) else {
            return;
        };

        for (source, key) in memberships {
            if let Some(deps) = self.targets.get_mut(&source) {
                if let Some(dep) = deps.get_mut(&key) {
                    dep.shift_remove(&subscriber_id);
                    if dep.is_empty() {
                        deps.remove(&key);
                    }
                }
                if deps.is_empty() {
                    self.targets.remove(&source);
                }
            }
        }
    }
}

thread_local! {
    static GRAPH: RefCell<Graph> = RefCell::new(Graph::default());
}

/// The thread's reactive runtime.
///
/// All state is thread-local; the reactive core is strictly single-threaded.
pub struct Runtime;

impl Runtime {
    /// Register an effect with the runtime.
    ///
    /// The runtime keeps the subscriber alive until [`Runtime::unregister`].
    pub fn register(subscriber: Rc<dyn Subscriber>) {
        let id = subscriber.subscriber_id();
        GRAPH.with(|graph| {
            graph.borrow_mut().subscribers.insert(id, subscriber);
        });
    }

    /// Unregister an effect and remove it from every Dep.
    pub fn unregister(id: SubscriberId) {
        // The subscriber is dropped after the graph borrow is released: its
        // closures may own sources whose `Drop` calls back into the runtime.
        let removed = GRAPH
            .try_with(|graph| {
                let mut graph = graph.borrow_mut();
                graph.detach(id);
                graph.subscribers.remove(&id)
            })
            .ok()
            .flatten();
        drop(removed);
    }

    /// Whether the subscriber is currently registered.
    pub fn is_registered(id: SubscriberId) -> bool {
        GRAPH.with(|graph| graph.borrow().subscribers.contains_key(&id))
    }

    /// Record that the running effect depends on `(source, key)`.
    ///
    /// A no-op when no effect is running, or when the running effect has
    /// already been stopped.
    pub fn track(source: SourceId, key: DepKey) {
        let Some(subscriber_id) = ReactiveContext::current_subscriber() else {
            return;
        };

        GRAPH.with(|graph| {
            let mut graph = graph.borrow_mut();
            if !graph.subscribers.contains_key(&subscriber_id) {
                return;
            }
            let inserted = graph
                .targets
                .entry(source)
                .or_default()
                .entry(key.clone())
                .or_default()
                .insert(subscriber_id);

            if inserted {
                tracing::trace!(%subscriber_id, %source, %key, "track");
                graph
                    .memberships
                    .entry(subscriber_id)
                    .or_default()
                    .push((source, key));
            }
        });
    }

    /// Notify every effect subscribed to `(source, key)`.
    pub fn trigger(source: SourceId, key: DepKey) {
        Self::trigger_keys(source, std::slice::from_ref(&key));
    }

    /// Notify the union of the Deps for several keys of one source.
    ///
    /// Each effect is notified at most once even if it reads several of
    /// the keys.
    pub fn trigger_keys(source: SourceId, keys: &[DepKey]) {
        let running = ReactiveContext::current_subscriber();

        let subscribers: Vec<Rc<dyn Subscriber>> = GRAPH.with(|graph| {
            let graph = graph.borrow();
            let Some(deps) = graph.targets.get(&source) else {
                return Vec::new();
            };

            let mut ids = IndexSet::new();
            for key in keys {
                if let Some(dep) = deps.get(key) {
                    ids.extend(dep.iter().copied());
                }
            }

            ids.into_iter()
                // An effect never re-triggers itself through its own writes.
                .filter(|id| Some(*id) != running)
                .filter_map(|id| graph.subscribers.get(&id).cloned())
                .collect()
        });

        if subscribers.is_empty() {
            return;
        }

        tracing::trace!(%source, count = subscribers.len(), "trigger");

        for subscriber in subscribers.iter().filter(|s| s.is_computed()) {
            subscriber.notify();
        }
        for subscriber in subscribers.iter().filter(|s| !s.is_computed()) {
            subscriber.notify();
        }
    }

    /// Remove a subscriber from every Dep it belongs to.
    ///
    /// Called before re-running an effect so it only stays subscribed to
    /// what the new run reads.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        GRAPH.with(|graph| graph.borrow_mut().detach(subscriber_id));
    }

    /// Drop all graph entries for a source that is going away.
    pub fn release_source(source: SourceId) {
        let _ = GRAPH.try_with(|graph| {
            let Ok(mut graph) = graph.try_borrow_mut() else {
                return;
            };
            let Some(deps) = graph.targets.remove(&source) else {
                return;
            };

            for subscriber_id in deps.into_values().flatten() {
                if let Some(memberships) = graph.memberships.get_mut(&subscriber_id) {
                    memberships.retain(|(s, _)| *s != source);
                }
            }
        });
    }

    /// Number of subscribers in the Dep for `(source, key)`.
    pub fn subscriber_count(source: SourceId, key: &DepKey) -> usize {
        GRAPH.with(|graph| {
            graph
                .borrow()
                .targets
                .get(&source)
                .and_then(|deps| deps.get(key))
                .map_or(0, IndexSet::len)
        })
    }

    /// Number of Deps the subscriber currently belongs to.
    pub fn dependency_count(subscriber_id: SubscriberId) -> usize {
        GRAPH.with(|graph| {
            graph
                .borrow()
                .memberships
                .get(&subscriber_id)
                .map_or(0, SmallVec::len)
        })
    }

    /// Whether any Dep exists for the source.
    pub fn has_source(source: SourceId) -> bool {
        GRAPH.with(|graph| graph.borrow().targets.contains_key(&source))
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if reads are currently tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
