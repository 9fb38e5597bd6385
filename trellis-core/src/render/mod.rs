//! Virtual Nodes and Reconciliation
//!
//! This module describes host trees as lightweight [`VNode`] descriptors and
//! keeps a realized host tree in sync with them.
//!
//! # How It Works
//!
//! 1. Build a tree with [`h`], [`text`], [`fragment`] and [`component`].
//! 2. [`Renderer::render`] diffs it against the tree rendered into the same
//!    container last time.
//! 3. The diff drives a [`HostAdapter`] with create / insert / remove /
//!    patch calls. Keyed child lists are reordered with the fewest moves,
//!    found via [`longest_increasing_subsequence`].
//!
//! Components wrap their render closure in a reactive effect. State they
//! read schedules a re-render job, which runs at the next
//! [`flush_jobs`](crate::scheduler::flush_jobs).
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use trellis_core::reactive::ref_;
//! use trellis_core::render::{component, create_renderer, h, Component, MemoryHost};
//! use trellis_core::scheduler::flush_jobs;
//!
//! let count = ref_(0);
//! let counter = Component::new("Counter", {
//!     let count = count.clone();
//!     move |_ctx| {
//!         let count = count.clone();
//!         move || h("span", None, count.get().to_string())
//!     }
//! });
//!
//! let host = Rc::new(MemoryHost::new());
//! let root = host.create_root();
//! let renderer = create_renderer(host.clone());
//! renderer.render(component(&counter, None), root);
//! assert_eq!(host.serialize(root), "<span>0</span>");
//!
//! count.set(1);
//! count.set(2);
//! flush_jobs();
//! assert_eq!(host.serialize(root), "<span>2</span>");
//! ```

mod component;
mod host;
mod memory;
mod props;
mod renderer;
mod sequence;
mod shape;
mod visit;
mod vnode;

pub use component::{Component, ComponentInstance, RenderFn, SetupContext};
pub use host::{HostAdapter, HostNode};
pub use memory::{HostOp, MemoryHost, NodeKind, OpStats};
pub use props::{event_prop_name, normalize_class, ClassValue, EventHandler, PropValue, Props};
pub use renderer::{create_renderer, Renderer};
pub use sequence::longest_increasing_subsequence;
pub use shape::ShapeFlags;
pub use visit::{walk, Exit, Visitor};
pub use vnode::{
    comment, component, fragment, h, is_same_vnode_type, keyed_fragment, text, Children, Key,
    VNode, VNodeType, WeakVNode,
};
