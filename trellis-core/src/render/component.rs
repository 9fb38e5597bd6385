//! Components.
//!
//! A [`Component`] is a named setup function. Mounting a component VNode
//! creates a [`ComponentInstance`]: setup runs once with a [`SetupContext`]
//! and returns the render closure, which the renderer then wraps in a
//! render effect.
//!
//! # Update Loop
//!
//! The render effect reads whatever reactive state the render closure
//! reads. When any of it changes, the effect's scheduler queues the
//! instance's update job instead of re-rendering on the spot, so a burst of
//! writes produces one re-render at the next flush.
//!
//! Re-rendering diffs the new subtree against the previous one. A render
//! closure that panics is logged and the previous subtree stays in place.
//! If the very first render panics, an empty placeholder node keeps the
//! instance's position among its siblings until a render succeeds.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::host::HostNode;
use super::props::{PropValue, Props};
use super::vnode::{VNode, WeakVNode};
use crate::error::Error;
use crate::reactive::{Effect, Ref};
use crate::scheduler::{invalidate_job, Job};

/// The render closure produced by setup.
pub type RenderFn = Box<dyn Fn() -> VNode>;

type SetupFn = dyn Fn(&SetupContext) -> RenderFn;

struct ComponentDef {
    name: Rc<str>,
    setup: Box<SetupFn>,
}

/// A component definition.
///
/// Clones share identity; two component VNodes are the same type only if
/// they refer to the same definition.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::ref_;
/// use trellis_core::render::{h, Component};
///
/// let counter = Component::new("Counter", |_ctx| {
///     let count = ref_(0);
///     move || h("span", None, count.get().to_string())
/// });
/// assert_eq!(counter.name(), "Counter");
/// ```
#[derive(Clone)]
pub struct Component(Rc<ComponentDef>);

impl Component {
    /// Define a component. `setup` runs once per instance and returns the
    /// render closure; render output may be a VNode or a string.
    pub fn new<S, R, V>(name: &str, setup: S) -> Self
    where
        S: Fn(&SetupContext) -> R + 'static,
        R: Fn() -> V + 'static,
        V: Into<VNode>,
    {
        let setup = move |ctx: &SetupContext| -> RenderFn {
            let render = setup(ctx);
            Box::new(move || -> VNode { render().into() })
        };
        Self(Rc::new(ComponentDef {
            name: Rc::from(name),
            setup: Box::new(setup),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn setup(&self, ctx: &SetupContext) -> RenderFn {
        (self.0.setup)(ctx)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.0.name).finish()
    }
}

/// What setup receives.
pub struct SetupContext {
    props: Ref<Props>,
}

impl SetupContext {
    /// The instance's props. Reading them inside render tracks them.
    pub fn props(&self) -> Ref<Props> {
        self.props.clone()
    }

    /// Read one prop, tracked.
    pub fn prop(&self, key: &str) -> Option<PropValue> {
        self.props.with(|props| props.get(key).cloned())
    }
}

static INSTANCE_UID: AtomicU64 = AtomicU64::new(0);

/// A mounted component.
pub struct ComponentInstance {
    uid: u64,
    def: Component,
    props: Ref<Props>,
    render: RenderFn,
    /// The last successfully rendered tree.
    subtree: RefCell<Option<VNode>>,
    /// The component VNode currently representing this instance.
    vnode: RefCell<WeakVNode>,
    effect: OnceCell<Effect>,
    job: OnceCell<Job>,
    mounted: Cell<bool>,
    unmounted: Cell<bool>,
    /// Where the first render is inserted.
    container: Cell<Option<HostNode>>,
    anchor: Cell<Option<HostNode>>,
    /// Empty host node holding the instance's position while it has no
    /// subtree because its first render failed.
    placeholder: Cell<Option<HostNode>>,
    last_error: RefCell<Option<Error>>,
}

impl ComponentInstance {
    /// Run setup and build the instance. Setup reads are not tracked.
    pub(crate) fn create(vnode: &VNode, def: &Component) -> Rc<Self> {
        let props = Ref::new(vnode.props().cloned().unwrap_or_default());
        let ctx = SetupContext {
            props: props.clone(),
        };
        let render = crate::reactive::untrack(|| def.setup(&ctx));

        Rc::new(Self {
            uid: INSTANCE_UID.fetch_add(1, Ordering::Relaxed),
            def: def.clone(),
            props,
            render,
            subtree: RefCell::new(None),
            vnode: RefCell::new(vnode.downgrade()),
            effect: OnceCell::new(),
            job: OnceCell::new(),
            mounted: Cell::new(false),
            unmounted: Cell::new(false),
            container: Cell::new(None),
            anchor: Cell::new(None),
            placeholder: Cell::new(None),
            last_error: RefCell::new(None),
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn props(&self) -> Ref<Props> {
        self.props.clone()
    }

    /// The last successfully rendered tree.
    pub fn subtree(&self) -> Option<VNode> {
        self.subtree.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.get()
    }

    /// The render effect.
    pub fn effect(&self) -> Option<&Effect> {
        self.effect.get()
    }

    /// The update job queued by the render effect.
    pub fn job(&self) -> Option<&Job> {
        self.job.get()
    }

    /// Number of times the render effect has run.
    pub fn render_count(&self) -> usize {
        self.effect.get().map_or(0, Effect::run_count)
    }

    /// The error from the most recent failed render, cleared on success.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error.borrow().clone()
    }

    pub(crate) fn render(&self) -> VNode {
        (self.render)()
    }

    pub(crate) fn vnode(&self) -> Option<VNode> {
        self.vnode.borrow().upgrade()
    }

    pub(crate) fn set_vnode(&self, vnode: &VNode) {
        *self.vnode.borrow_mut() = vnode.downgrade();
    }

    pub(crate) fn set_subtree(&self, subtree: VNode) {
        *self.subtree.borrow_mut() = Some(subtree);
    }

    pub(crate) fn init(&self, effect: Effect, job: Job) {
        let _ = self.effect.set(effect);
        let _ = self.job.set(job);
    }

    pub(crate) fn set_location(&self, container: HostNode, anchor: Option<HostNode>) {
        self.container.set(Some(container));
        self.anchor.set(anchor);
    }

    pub(crate) fn location(&self) -> (Option<HostNode>, Option<HostNode>) {
        (self.container.get(), self.anchor.get())
    }

    pub(crate) fn placeholder(&self) -> Option<HostNode> {
        self.placeholder.get()
    }

    pub(crate) fn set_placeholder(&self, node: HostNode) {
        self.placeholder.set(Some(node));
    }

    pub(crate) fn take_placeholder(&self) -> Option<HostNode> {
        self.placeholder.take()
    }

    pub(crate) fn mark_mounted(&self) {
        self.mounted.set(true);
    }

    pub(crate) fn record_error(&self, error: Option<Error>) {
        *self.last_error.borrow_mut() = error;
    }

    /// Drop any queued update and re-render now.
    pub(crate) fn update_now(&self) {
        if let Some(job) = self.job.get() {
            invalidate_job(job);
        }
        if let Some(effect) = self.effect.get() {
            effect.run();
        }
    }

    /// Stop the render effect and drop any queued update.
    pub(crate) fn teardown(&self) {
        if self.unmounted.replace(true) {
            return;
        }
        if let Some(effect) = self.effect.get() {
            effect.stop();
        }
        if let Some(job) = self.job.get() {
            invalidate_job(job);
        }
        tracing::debug!(component = %self.name(), uid = self.uid, "component unmounted");
    }
}

impl Drop for ComponentInstance {
    fn drop(&mut self) {
        if let Some(effect) = self.effect.get() {
            effect.stop();
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.uid)
            .field("name", &self.name())
            .field("mounted", &self.mounted.get())
            .field("unmounted", &self.unmounted.get())
            .finish()
    }
}
