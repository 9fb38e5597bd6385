//! Host adapter boundary.
//!
//! The renderer never touches a concrete tree. Every mutation goes through
//! a [`HostAdapter`], which owns the real nodes and hands out opaque
//! [`HostNode`] handles.

use std::fmt;
use std::rc::Rc;

use super::props::PropValue;

/// Opaque handle to a node owned by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    /// Wrap an adapter-specific ID.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the adapter-specific ID.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Tree-mutation primitives for one rendering target.
///
/// All operations are synchronous. Methods take `&self`; adapters use
/// interior mutability for their node storage.
pub trait HostAdapter {
    /// Allocate a fresh element node.
    fn create_element(&self, tag: &str) -> HostNode;

    /// Allocate a fresh text node.
    fn create_text(&self, text: &str) -> HostNode;

    /// Allocate a fresh comment node.
    fn create_comment(&self, text: &str) -> HostNode;

    /// Insert `node` into `parent` before `anchor`, or at the end when
    /// `anchor` is `None`. Inserting an attached node moves it.
    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>);

    /// Detach `node` from its parent. No-op if already detached.
    fn remove(&self, node: HostNode);

    /// Replace all content of an element with `text`.
    fn set_element_text(&self, node: HostNode, text: &str);

    /// Update the content of a text node.
    fn set_text(&self, node: HostNode, text: &str);

    /// Apply one property change. `next == None` removes the property.
    fn patch_prop(&self, node: HostNode, key: &str, prev: Option<&PropValue>, next: Option<&PropValue>);

    /// The node's current parent.
    fn parent_node(&self, node: HostNode) -> Option<HostNode>;

    /// The node that follows `node` under the same parent.
    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;
}

impl<H: HostAdapter + ?Sized> HostAdapter for Rc<H> {
    fn create_element(&self, tag: &str) -> HostNode {
        (**self).create_element(tag)
    }

    fn create_text(&self, text: &str) -> HostNode {
        (**self).create_text(text)
    }

    fn create_comment(&self, text: &str) -> HostNode {
        (**self).create_comment(text)
    }

    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        (**self).insert(node, parent, anchor)
    }

    fn remove(&self, node: HostNode) {
        (**self).remove(node)
    }

    fn set_element_text(&self, node: HostNode, text: &str) {
        (**self).set_element_text(node, text)
    }

    fn set_text(&self, node: HostNode, text: &str) {
        (**self).set_text(node, text)
    }

    fn patch_prop(&self, node: HostNode, key: &str, prev: Option<&PropValue>, next: Option<&PropValue>) {
        (**self).patch_prop(node, key, prev, next)
    }

    fn parent_node(&self, node: HostNode) -> Option<HostNode> {
        (**self).parent_node(node)
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        (**self).next_sibling(node)
    }
}
