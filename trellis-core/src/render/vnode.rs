//! Virtual nodes.
//!
//! A [`VNode`] describes one node of the desired host tree. VNodes are
//! built fresh on every render pass; the renderer diffs the new tree
//! against the previous one and records the realized host node in the new
//! VNode's `el` slot.
//!
//! # Node Kinds
//!
//! | type        | children            | host nodes                       |
//! |-------------|---------------------|----------------------------------|
//! | `Element`   | none, text or array | one element                      |
//! | `Text`      | text                | one text node                    |
//! | `Comment`   | text                | one comment node                 |
//! | `Fragment`  | array               | children between two empty texts |
//! | `Component` | none                | whatever its subtree renders     |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::component::{Component, ComponentInstance};
use super::host::HostNode;
use super::props::{PropValue, Props};
use super::shape::ShapeFlags;

/// What a VNode describes.
#[derive(Clone)]
pub enum VNodeType {
    Element(Rc<str>),
    Component(Component),
    Text,
    Comment,
    Fragment,
}

impl VNodeType {
    /// Same kind, same tag, same component definition.
    pub fn same_as(&self, other: &VNodeType) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            (VNodeType::Text, VNodeType::Text)
            | (VNodeType::Comment, VNodeType::Comment)
            | (VNodeType::Fragment, VNodeType::Fragment) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "<{tag}>"),
            VNodeType::Component(c) => write!(f, "Component({})", c.name()),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Comment => f.write_str("Comment"),
            VNodeType::Fragment => f.write_str("Fragment"),
        }
    }
}

/// The children of a VNode.
#[derive(Clone, Debug, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Array(Vec<VNode>),
}

impl From<&str> for Children {
    fn from(value: &str) -> Self {
        Children::Text(Rc::from(value))
    }
}

impl From<String> for Children {
    fn from(value: String) -> Self {
        Children::Text(Rc::from(value))
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

/// Array items that are strings become text VNodes.
impl<T: Into<VNode>> From<Vec<T>> for Children {
    fn from(value: Vec<T>) -> Self {
        Children::Array(value.into_iter().map(Into::into).collect())
    }
}

/// Reconciliation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<char> for Key {
    fn from(value: char) -> Self {
        Key::Str(Rc::from(value.to_string()))
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

/// Integral numbers become `Int`; anything else keys by its text.
impl From<PropValue> for Key {
    fn from(value: PropValue) -> Self {
        match value {
            PropValue::String(s) => Key::Str(s),
            PropValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Key::Int(n as i64),
            PropValue::Number(n) => Key::Str(Rc::from(n.to_string())),
            PropValue::Bool(b) => Key::Str(Rc::from(b.to_string())),
            PropValue::Handler(h) => Key::Str(Rc::from(format!("{h:?}"))),
        }
    }
}

struct VNodeData {
    ty: VNodeType,
    props: Option<Props>,
    children: Children,
    key: Option<Key>,
    shape: ShapeFlags,
    /// Realized host node. For fragments, the start anchor.
    el: Cell<Option<HostNode>>,
    /// Fragment end anchor.
    anchor: Cell<Option<HostNode>>,
    /// The instance rendering this component node.
    component: RefCell<Option<Rc<ComponentInstance>>>,
}

/// A node of the virtual tree.
///
/// Cloning a `VNode` clones the handle; the `el` slot is shared.
#[derive(Clone)]
pub struct VNode(Rc<VNodeData>);

impl VNode {
    /// Build a VNode. A `key` entry in `props` becomes the VNode key.
    pub fn new(ty: VNodeType, props: Option<Props>, children: Children) -> Self {
        let mut props = props;
        let key = props.as_mut().and_then(Props::take_key);
        let children = match (&ty, children) {
            (VNodeType::Fragment, Children::Text(text)) => Children::Array(vec![VNode::from(text)]),
            (VNodeType::Fragment, Children::None) => Children::Array(Vec::new()),
            (_, children) => children,
        };
        let shape = ShapeFlags::of(&ty, &children);

        Self(Rc::new(VNodeData {
            ty,
            props,
            children,
            key,
            shape,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: RefCell::new(None),
        }))
    }

    pub fn ty(&self) -> &VNodeType {
        &self.0.ty
    }

    pub fn props(&self) -> Option<&Props> {
        self.0.props.as_ref()
    }

    pub fn children(&self) -> &Children {
        &self.0.children
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn shape(&self) -> ShapeFlags {
        self.0.shape
    }

    /// Text content of a text, comment, or text-children element node.
    pub fn text(&self) -> &str {
        match &self.0.children {
            Children::Text(text) => text,
            _ => "",
        }
    }

    /// The realized host node, once mounted.
    pub fn el(&self) -> Option<HostNode> {
        self.0.el.get()
    }

    pub(crate) fn set_el(&self, el: Option<HostNode>) {
        self.0.el.set(el);
    }

    /// Fragment end anchor.
    pub fn anchor(&self) -> Option<HostNode> {
        self.0.anchor.get()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<HostNode>) {
        self.0.anchor.set(anchor);
    }

    /// The component instance behind a mounted component node.
    pub fn component_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.0.component.borrow().clone()
    }

    pub(crate) fn set_component_instance(&self, instance: Option<Rc<ComponentInstance>>) {
        *self.0.component.borrow_mut() = instance;
    }

    pub fn is_component(&self) -> bool {
        self.0.shape.intersects(ShapeFlags::COMPONENT)
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakVNode {
        WeakVNode(Rc::downgrade(&self.0))
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("type", &self.0.ty);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        s.field("children", &self.0.children);
        s.field("el", &self.0.el.get());
        s.finish()
    }
}

impl From<&str> for VNode {
    fn from(value: &str) -> Self {
        text(value)
    }
}

impl From<String> for VNode {
    fn from(value: String) -> Self {
        text(value)
    }
}

impl From<Rc<str>> for VNode {
    fn from(value: Rc<str>) -> Self {
        VNode::new(VNodeType::Text, None, Children::Text(value))
    }
}

/// Weak counterpart of [`VNode`].
#[derive(Clone, Default)]
pub struct WeakVNode(Weak<VNodeData>);

impl WeakVNode {
    pub fn upgrade(&self) -> Option<VNode> {
        self.0.upgrade().map(VNode)
    }
}

/// Build an element VNode.
///
/// ```rust
/// use trellis_core::render::{h, Props};
///
/// let list = h("ul", Props::new().class("list"), vec![
///     h("li", Props::new().key("a"), "A"),
///     h("li", Props::new().key("b"), "B"),
/// ]);
/// assert_eq!(list.tag(), Some("ul"));
/// ```
pub fn h(tag: &str, props: impl Into<Option<Props>>, children: impl Into<Children>) -> VNode {
    VNode::new(VNodeType::Element(Rc::from(tag)), props.into(), children.into())
}

/// Build a text VNode.
pub fn text(content: impl Into<Rc<str>>) -> VNode {
    VNode::new(VNodeType::Text, None, Children::Text(content.into()))
}

/// Build a comment VNode.
pub fn comment(content: impl Into<Rc<str>>) -> VNode {
    VNode::new(VNodeType::Comment, None, Children::Text(content.into()))
}

/// Build a fragment VNode. Fragment children are always an array.
pub fn fragment(children: impl Into<Children>) -> VNode {
    VNode::new(VNodeType::Fragment, None, children.into())
}

/// Build a keyed fragment VNode.
pub fn keyed_fragment(key: impl Into<Key>, children: impl Into<Children>) -> VNode {
    let props = Props::new().key(key);
    VNode::new(VNodeType::Fragment, Some(props), children.into())
}

/// Build a component VNode.
pub fn component(def: &Component, props: impl Into<Option<Props>>) -> VNode {
    VNode::new(VNodeType::Component(def.clone()), props.into(), Children::None)
}

impl VNode {
    /// The element tag, for element nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.ty {
            VNodeType::Element(tag) => Some(tag),
            _ => None,
        }
    }
}

/// Same type and same key. Two unkeyed nodes of the same type match.
pub fn is_same_vnode_type(a: &VNode, b: &VNode) -> bool {
    a.ty().same_as(b.ty()) && a.key() == b.key()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prop_is_lifted_into_vnode() {
        let node = h("li", Props::new().key("a").attr("id", "x"), "A");
        assert_eq!(node.key(), Some(&Key::from("a")));
        assert!(!node.props().unwrap().contains_key("key"));
        assert!(node.props().unwrap().contains_key("id"));
    }

    #[test]
    fn string_children_become_text_nodes() {
        let node = h("p", None, vec!["a", "b"]);
        match node.children() {
            Children::Array(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0].ty(), VNodeType::Text));
                assert_eq!(items[1].text(), "b");
            }
            other => panic!("expected array children, got {other:?}"),
        }
    }

    #[test]
    fn fragment_children_are_always_an_array() {
        let node = fragment("only text");
        assert!(matches!(node.children(), Children::Array(items) if items.len() == 1));
        assert!(matches!(fragment(()).children(), Children::Array(items) if items.is_empty()));
    }

    #[test]
    fn same_type_rules() {
        let a1 = h("div", Props::new().key(1), ());
        let a2 = h("div", Props::new().key(1), "changed");
        let b = h("div", Props::new().key(2), ());
        let span = h("span", Props::new().key(1), ());
        let unkeyed1 = h("div", None, ());
        let unkeyed2 = h("div", None, ());

        assert!(is_same_vnode_type(&a1, &a2));
        assert!(!is_same_vnode_type(&a1, &b));
        assert!(!is_same_vnode_type(&a1, &span));
        assert!(is_same_vnode_type(&unkeyed1, &unkeyed2));
        assert!(!is_same_vnode_type(&a1, &unkeyed1));
        assert!(!is_same_vnode_type(&text("x"), &comment("x")));
    }

    #[test]
    fn numeric_keys_from_props() {
        assert_eq!(Key::from(PropValue::Number(4.0)), Key::Int(4));
        assert_eq!(Key::from(PropValue::Number(1.5)), Key::from("1.5"));
    }
}
