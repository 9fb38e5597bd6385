//! Renderer
//!
//! The renderer turns VNode trees into host trees and keeps them in sync.
//! [`Renderer::render`] diffs a new root against the one recorded for the
//! container last time and drives the [`HostAdapter`] with the minimal set
//! of mutations.
//!
//! # Patch Dispatch
//!
//! `patch(old, new)` dispatches on the node kind: Text, Comment and
//! Fragment first, then element or component by shape flags.
//!
//! - no old node: mount `new` at the anchor;
//! - same type and key: patch in place (props, then children);
//! - different type: unmount `old` completely and mount `new` where `old`
//!   was. There is no partial patch across types.
//!
//! Children lists are reconciled by the keyed diff in [`keyed`].
//!
//! # Unmounting
//!
//! Unmounting first walks the old tree with a two-phase visitor so nested
//! components are torn down children-first, then detaches the host nodes.

mod keyed;

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::component::ComponentInstance;
use super::host::{HostAdapter, HostNode};
use super::props::Props;
use super::shape::ShapeFlags;
use super::vnode::{is_same_vnode_type, Children, VNode, VNodeType};
use super::visit::{walk, Exit, Visitor};
use crate::error::{panic_message, Error};
use crate::reactive::{Effect, EffectOptions};
use crate::scheduler::{queue_job, Job};

struct RendererInner<H> {
    host: H,
    /// container -> last rendered root
    roots: RefCell<HashMap<HostNode, VNode>>,
}

/// Drives a host adapter from VNode trees.
///
/// Cloning a `Renderer` clones the handle.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use trellis_core::render::{create_renderer, h, MemoryHost, Props};
///
/// let host = Rc::new(MemoryHost::new());
/// let root = host.create_root();
/// let renderer = create_renderer(host.clone());
///
/// renderer.render(h("p", Props::new().attr("id", "x"), "hello"), root);
/// assert_eq!(host.serialize(root), "<p id=\"x\">hello</p>");
///
/// renderer.render(None, root);
/// assert_eq!(host.serialize(root), "");
/// ```
pub struct Renderer<H: HostAdapter> {
    inner: Rc<RendererInner<H>>,
}

impl<H: HostAdapter> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Create a renderer for `host`.
pub fn create_renderer<H: HostAdapter + 'static>(host: H) -> Renderer<H> {
    Renderer::new(host)
}

impl<H: HostAdapter + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                host,
                roots: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The host adapter.
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// The root last rendered into `container`.
    pub fn root(&self, container: HostNode) -> Option<VNode> {
        self.inner.roots.borrow().get(&container).cloned()
    }

    /// Render `vnode` into `container`, diffing against the previous root.
    ///
    /// `None` unmounts whatever was rendered there.
    pub fn render(&self, vnode: impl Into<Option<VNode>>, container: HostNode) {
        let previous = self.root(container);

        match vnode.into() {
            Some(vnode) => {
                self.patch(previous.as_ref(), &vnode, container, None);
                self.inner.roots.borrow_mut().insert(container, vnode);
            }
            None => {
                if let Some(previous) = previous {
                    self.unmount(&previous);
                }
                self.inner.roots.borrow_mut().remove(&container);
            }
        }
    }

    fn downgrade(&self) -> Weak<RendererInner<H>> {
        Rc::downgrade(&self.inner)
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    pub(crate) fn patch(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let mut anchor = anchor;
        let old = match old {
            Some(old) if old.ptr_eq(new) => return,
            Some(old) if !is_same_vnode_type(old, new) => {
                anchor = self.next_host_node(old);
                self.unmount(old);
                None
            }
            other => other,
        };

        match new.ty() {
            VNodeType::Text => self.process_text(old, new, container, anchor),
            VNodeType::Comment => self.process_comment(old, new, container, anchor),
            VNodeType::Fragment => self.process_fragment(old, new, container, anchor),
            _ if new.shape().contains(ShapeFlags::ELEMENT) => {
                self.process_element(old, new, container, anchor)
            }
            _ if new.shape().intersects(ShapeFlags::COMPONENT) => {
                self.process_component(old, new, container, anchor)
            }
            _ => {}
        }
    }

    fn process_text(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let host = self.host();
        match old {
            None => {
                let el = host.create_text(new.text());
                new.set_el(Some(el));
                host.insert(el, container, anchor);
            }
            Some(old) => {
                new.set_el(old.el());
                if old.text() != new.text() {
                    if let Some(el) = old.el() {
                        host.set_text(el, new.text());
                    }
                }
            }
        }
    }

    fn process_comment(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        match old {
            None => {
                let el = self.host().create_comment(new.text());
                new.set_el(Some(el));
                self.host().insert(el, container, anchor);
            }
            // Comments are static.
            Some(old) => new.set_el(old.el()),
        }
    }

    fn process_fragment(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        match old {
            None => {
                let host = self.host();
                let start = host.create_text("");
                let end = host.create_text("");
                new.set_el(Some(start));
                new.set_anchor(Some(end));
                host.insert(start, container, anchor);
                host.insert(end, container, anchor);
                if let Children::Array(children) = new.children() {
                    self.mount_children(children, container, Some(end));
                }
            }
            Some(old) => {
                new.set_el(old.el());
                new.set_anchor(old.anchor());
                self.patch_children(old, new, container, old.anchor());
            }
        }
    }

    fn process_element(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        match old {
            None => self.mount_element(new, container, anchor),
            Some(old) => self.patch_element(old, new),
        }
    }

    fn process_component(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        match old.and_then(|old| old.component_instance().map(|i| (old, i))) {
            None => self.mount_component(new, container, anchor),
            Some((old, instance)) => self.patch_component(old, new, &instance),
        }
    }

    // ------------------------------------------------------------------------
    // Elements
    // ------------------------------------------------------------------------

    fn mount_element(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let host = self.host();
        let Some(tag) = vnode.tag() else {
            return;
        };

        let el = host.create_element(tag);
        vnode.set_el(Some(el));

        match vnode.children() {
            Children::Text(text) => host.set_element_text(el, text),
            Children::Array(children) => self.mount_children(children, el, None),
            Children::None => {}
        }

        if let Some(props) = vnode.props() {
            for (key, value) in props.iter() {
                host.patch_prop(el, key, None, Some(value));
            }
        }

        host.insert(el, container, anchor);
        tracing::trace!(%el, tag, "element mounted");
    }

    fn patch_element(&self, old: &VNode, new: &VNode) {
        let Some(el) = old.el() else {
            return;
        };
        new.set_el(Some(el));

        self.patch_props(el, old.props(), new.props());
        self.patch_children(old, new, el, None);
    }

    fn patch_props(&self, el: HostNode, old: Option<&Props>, new: Option<&Props>) {
        let empty = Props::new();
        let old = old.unwrap_or(&empty);
        let new = new.unwrap_or(&empty);
        let host = self.host();

        for (key, next) in new.iter() {
            let prev = old.get(key);
            if prev != Some(next) {
                host.patch_prop(el, key, prev, Some(next));
            }
        }
        for (key, prev) in old.iter() {
            if !new.contains_key(key) {
                host.patch_prop(el, key, Some(prev), None);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------------

    fn patch_children(
        &self,
        old: &VNode,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let host = self.host();

        match (old.children(), new.children()) {
            (Children::Array(prev), Children::Text(text)) => {
                self.unmount_children(prev);
                host.set_element_text(container, text);
            }
            (prev, Children::Text(text)) => {
                let unchanged = matches!(prev, Children::Text(old_text) if old_text == text);
                if !unchanged {
                    host.set_element_text(container, text);
                }
            }
            (Children::Array(prev), Children::Array(next)) => {
                self.patch_keyed_children(prev, next, container, anchor);
            }
            (Children::Array(prev), Children::None) => self.unmount_children(prev),
            (Children::Text(_), Children::Array(next)) => {
                host.set_element_text(container, "");
                self.mount_children(next, container, anchor);
            }
            (Children::Text(_), Children::None) => host.set_element_text(container, ""),
            (Children::None, Children::Array(next)) => self.mount_children(next, container, anchor),
            (Children::None, Children::None) => {}
        }
    }

    fn mount_children(&self, children: &[VNode], container: HostNode, anchor: Option<HostNode>) {
        for child in children {
            self.patch(None, child, container, anchor);
        }
    }

    fn unmount_children(&self, children: &[VNode]) {
        for child in children {
            self.unmount(child);
        }
    }

    // ------------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------------

    fn mount_component(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let VNodeType::Component(def) = vnode.ty() else {
            return;
        };

        let instance = ComponentInstance::create(vnode, def);
        instance.set_location(container, anchor);
        vnode.set_component_instance(Some(instance.clone()));
        self.setup_render_effect(&instance);
    }

    /// Wrap the instance's render in an effect whose scheduler queues the
    /// update job, then run it once to mount.
    fn setup_render_effect(&self, instance: &Rc<ComponentInstance>) {
        let job = Job::labeled(format!("render:{}", instance.name()), {
            let instance = Rc::downgrade(instance);
            move || {
                let Some(instance) = instance.upgrade() else {
                    return;
                };
                if instance.is_unmounted() {
                    return;
                }
                if let Some(effect) = instance.effect() {
                    effect.run();
                }
            }
        });

        let effect = Effect::with_options(
            {
                let renderer = self.downgrade();
                let instance = Rc::downgrade(instance);
                move || {
                    if let (Some(inner), Some(instance)) = (renderer.upgrade(), instance.upgrade()) {
                        Renderer { inner }.update_component(&instance);
                    }
                }
            },
            EffectOptions::new().lazy().with_scheduler({
                let job = job.clone();
                move || queue_job(&job)
            }),
        );

        instance.init(effect.clone(), job);
        effect.run();
    }

    /// Render the instance and mount or patch the result.
    fn update_component(&self, instance: &Rc<ComponentInstance>) {
        let next = match panic::catch_unwind(AssertUnwindSafe(|| instance.render())) {
            Ok(next) => next,
            Err(payload) => {
                let err = Error::RenderPanicked {
                    component: instance.name().to_string(),
                    message: panic_message(payload.as_ref()),
                };
                tracing::error!(error = %err, uid = instance.uid(), "render failed, keeping previous tree");
                instance.record_error(Some(err));
                if instance.subtree().is_none() && instance.placeholder().is_none() {
                    self.mount_placeholder(instance);
                }
                return;
            }
        };
        instance.record_error(None);

        match instance.subtree() {
            None => {
                let (container, anchor) = match instance.placeholder() {
                    Some(placeholder) => (self.host().parent_node(placeholder), Some(placeholder)),
                    None => instance.location(),
                };
                let Some(container) = container else {
                    return;
                };
                self.patch(None, &next, container, anchor);
                if let Some(placeholder) = instance.take_placeholder() {
                    self.host().remove(placeholder);
                }
                instance.mark_mounted();
                tracing::debug!(component = %instance.name(), uid = instance.uid(), "component mounted");
            }
            Some(prev) => {
                let container = self
                    .first_host_node(&prev)
                    .and_then(|node| self.host().parent_node(node))
                    .or(instance.location().0);
                let Some(container) = container else {
                    return;
                };
                let anchor = self.next_host_node(&prev);
                self.patch(Some(&prev), &next, container, anchor);
                tracing::debug!(component = %instance.name(), uid = instance.uid(), "component updated");
            }
        }

        if let Some(vnode) = instance.vnode() {
            vnode.set_el(self.first_host_node(&next));
        }
        instance.set_subtree(next);
    }

    /// Hold the instance's place with an empty text node.
    fn mount_placeholder(&self, instance: &ComponentInstance) {
        let (Some(container), anchor) = instance.location() else {
            return;
        };
        let placeholder = self.host().create_text("");
        self.host().insert(placeholder, container, anchor);
        instance.set_placeholder(placeholder);
        tracing::debug!(component = %instance.name(), uid = instance.uid(), "placeholder mounted");
    }

    fn patch_component(&self, old: &VNode, new: &VNode, instance: &Rc<ComponentInstance>) {
        new.set_component_instance(Some(instance.clone()));
        new.set_el(old.el());
        instance.set_vnode(new);

        let next_props = new.props().cloned().unwrap_or_default();
        if instance.props().set(next_props) {
            instance.update_now();
        }
    }

    // ------------------------------------------------------------------------
    // Unmount / move
    // ------------------------------------------------------------------------

    /// Tear down components under `vnode`, then detach its host nodes.
    pub(crate) fn unmount(&self, vnode: &VNode) {
        walk(vnode, &mut Teardown);
        self.remove_host_nodes(vnode);
    }

    fn remove_host_nodes(&self, vnode: &VNode) {
        let host = self.host();
        match vnode.ty() {
            VNodeType::Component(_) => {
                let Some(instance) = vnode.component_instance() else {
                    return;
                };
                if let Some(subtree) = instance.subtree() {
                    self.remove_host_nodes(&subtree);
                } else if let Some(placeholder) = instance.take_placeholder() {
                    host.remove(placeholder);
                }
            }
            VNodeType::Fragment => {
                if let Some(start) = vnode.el() {
                    host.remove(start);
                }
                if let Children::Array(children) = vnode.children() {
                    for child in children {
                        self.remove_host_nodes(child);
                    }
                }
                if let Some(end) = vnode.anchor() {
                    host.remove(end);
                }
            }
            _ => {
                if let Some(el) = vnode.el() {
                    tracing::trace!(%el, "unmount");
                    host.remove(el);
                }
            }
        }
    }

    /// Move all host nodes of `vnode` before `anchor`.
    pub(crate) fn move_node(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let host = self.host();
        match vnode.ty() {
            VNodeType::Component(_) => {
                let Some(instance) = vnode.component_instance() else {
                    return;
                };
                if let Some(subtree) = instance.subtree() {
                    self.move_node(&subtree, container, anchor);
                } else if let Some(placeholder) = instance.placeholder() {
                    host.insert(placeholder, container, anchor);
                }
            }
            VNodeType::Fragment => {
                if let Some(start) = vnode.el() {
                    host.insert(start, container, anchor);
                }
                if let Children::Array(children) = vnode.children() {
                    for child in children {
                        self.move_node(child, container, anchor);
                    }
                }
                if let Some(end) = vnode.anchor() {
                    host.insert(end, container, anchor);
                }
            }
            _ => {
                if let Some(el) = vnode.el() {
                    tracing::trace!(%el, "move");
                    host.insert(el, container, anchor);
                }
            }
        }
    }

    /// First host node of `vnode`, in document order.
    pub(crate) fn first_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match vnode.ty() {
            VNodeType::Component(_) => {
                let instance = vnode.component_instance()?;
                match instance.subtree() {
                    Some(subtree) => self.first_host_node(&subtree),
                    None => instance.placeholder(),
                }
            }
            _ => vnode.el(),
        }
    }

    /// The host node right after everything `vnode` rendered.
    pub(crate) fn next_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match vnode.ty() {
            VNodeType::Component(_) => {
                let instance = vnode.component_instance()?;
                match instance.subtree() {
                    Some(subtree) => self.next_host_node(&subtree),
                    None => instance
                        .placeholder()
                        .and_then(|placeholder| self.host().next_sibling(placeholder)),
                }
            }
            VNodeType::Fragment => vnode.anchor().and_then(|end| self.host().next_sibling(end)),
            _ => vnode.el().and_then(|el| self.host().next_sibling(el)),
        }
    }
}

/// Stops component render effects, children first.
struct Teardown;

impl Visitor for Teardown {
    fn enter_component(&mut self, _node: &VNode, instance: Option<&Rc<ComponentInstance>>) -> Option<Exit> {
        let instance = instance?.clone();
        Some(Box::new(move || instance.teardown()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::memory::{HostOp, MemoryHost};
    use crate::render::vnode::{comment, fragment, h, text};

    fn setup() -> (Rc<MemoryHost>, HostNode, Renderer<Rc<MemoryHost>>) {
        let host = Rc::new(MemoryHost::new());
        let root = host.create_root();
        let renderer = create_renderer(host.clone());
        (host, root, renderer)
    }

    #[test]
    fn mounts_element_tree() {
        let (host, root, renderer) = setup();
        renderer.render(
            h("div", Props::new().attr("id", "app").class(vec!["a", "b"]), vec![
                h("span", None, "x"),
                text("y"),
                comment("c"),
            ]),
            root,
        );

        assert_eq!(
            host.serialize(root),
            "<div id=\"app\" class=\"a b\"><span>x</span>y<!--c--></div>"
        );
    }

    #[test]
    fn patches_props_in_place() {
        let (host, root, renderer) = setup();
        renderer.render(h("div", Props::new().attr("a", 1).attr("b", 2), ()), root);
        let el = renderer.root(root).and_then(|v| v.el()).unwrap();
        host.take_ops();

        renderer.render(h("div", Props::new().attr("a", 1).attr("c", 3), ()), root);
        assert_eq!(renderer.root(root).and_then(|v| v.el()), Some(el));
        assert_eq!(host.serialize(root), "<div a=\"1\" c=\"3\"></div>");

        let stats = host.stats();
        assert_eq!(stats.creates, 0);
        // c added, b removed, a untouched
        assert_eq!(stats.prop_patches, 2);
    }

    #[test]
    fn type_change_remounts() {
        let (host, root, renderer) = setup();
        renderer.render(
            h("section", None, vec![h("div", Props::new().attr("id", "x"), "a"), text("tail")]),
            root,
        );
        host.take_ops();

        renderer.render(
            h("section", None, vec![h("span", Props::new().attr("id", "x"), "a"), text("tail")]),
            root,
        );
        assert_eq!(host.serialize(root), "<section><span id=\"x\">a</span>tail</section>");

        let stats = host.stats();
        assert_eq!(stats.removes, 1);
        assert_eq!(stats.creates, 1);
        assert!(host
            .ops()
            .iter()
            .all(|op| !matches!(op, HostOp::PatchProp { value: None, .. })));
    }

    #[test]
    fn text_and_array_children_transitions() {
        let (host, root, renderer) = setup();
        renderer.render(h("p", None, "one"), root);
        renderer.render(h("p", None, vec![h("b", None, "x"), h("i", None, "y")]), root);
        assert_eq!(host.serialize(root), "<p><b>x</b><i>y</i></p>");

        renderer.render(h("p", None, "two"), root);
        assert_eq!(host.serialize(root), "<p>two</p>");

        renderer.render(h("p", None, ()), root);
        assert_eq!(host.serialize(root), "<p></p>");
    }

    #[test]
    fn fragments_use_anchors() {
        let (host, root, renderer) = setup();
        renderer.render(
            h("div", None, vec![
                h("a", None, ()),
                fragment(vec![h("b", None, ()), h("c", None, ())]),
                h("d", None, ()),
            ]),
            root,
        );
        assert_eq!(host.serialize(root), "<div><a></a><b></b><c></c><d></d></div>");

        renderer.render(
            h("div", None, vec![
                h("a", None, ()),
                fragment(vec![h("b", None, ()), h("c", None, ()), h("e", None, ())]),
                h("d", None, ()),
            ]),
            root,
        );
        assert_eq!(host.serialize(root), "<div><a></a><b></b><c></c><e></e><d></d></div>");

        renderer.render(h("div", None, vec![h("a", None, ()), h("d", None, ())]), root);
        assert_eq!(host.serialize(root), "<div><a></a><d></d></div>");
    }

    #[test]
    fn render_none_unmounts() {
        let (host, root, renderer) = setup();
        renderer.render(h("div", None, "x"), root);
        renderer.render(None, root);
        assert_eq!(host.serialize(root), "");
        assert!(renderer.root(root).is_none());
    }

    #[test]
    fn same_vnode_is_skipped() {
        let (host, root, renderer) = setup();
        let node = h("div", None, "static");
        renderer.render(node.clone(), root);
        host.take_ops();

        renderer.render(node, root);
        assert!(host.ops().is_empty());
    }
}
