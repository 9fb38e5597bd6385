//! In-memory host adapter.
//!
//! [`MemoryHost`] keeps its nodes in an arena and records every mutation
//! in an operation log. Tests and benchmarks use the log to check what the
//! renderer did to the tree (how many nodes it created, moved, or
//! removed), not just the final shape.
//!
//! Props are stored verbatim; there are no attribute semantics.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;

use super::host::{HostAdapter, HostNode};
use super::props::{event_prop_name, PropValue};

/// Kind of a host node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A container created with [`MemoryHost::create_root`].
    Root,
    Element(Rc<str>),
    Text,
    Comment,
}

/// One recorded host mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Create { node: HostNode, kind: NodeKind },
    /// `moved` is set when the node was already attached somewhere.
    Insert {
        node: HostNode,
        parent: HostNode,
        anchor: Option<HostNode>,
        moved: bool,
    },
    Remove { node: HostNode },
    SetElementText { node: HostNode, text: String },
    SetText { node: HostNode, text: String },
    PatchProp {
        node: HostNode,
        key: String,
        value: Option<PropValue>,
    },
}

/// Counts of recorded operations by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpStats {
    pub creates: usize,
    /// Inserts of detached nodes.
    pub inserts: usize,
    /// Inserts of already attached nodes.
    pub moves: usize,
    pub removes: usize,
    pub text_updates: usize,
    pub prop_patches: usize,
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    text: String,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    props: IndexMap<Rc<str>, PropValue>,
}

/// Arena-backed host adapter with an operation log.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: RefCell<Vec<NodeData>>,
    ops: RefCell<Vec<HostOp>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&self, kind: NodeKind, text: &str) -> HostNode {
        let mut nodes = self.nodes.borrow_mut();
        let node = HostNode::from_raw(nodes.len() as u64);
        nodes.push(NodeData {
            kind,
            text: text.to_string(),
            parent: None,
            children: Vec::new(),
            props: IndexMap::new(),
        });
        node
    }

    fn log(&self, op: HostOp) {
        tracing::trace!(?op, "host");
        self.ops.borrow_mut().push(op);
    }

    fn index(node: HostNode) -> usize {
        node.raw() as usize
    }

    /// Create a container to render into. Not logged.
    pub fn create_root(&self) -> HostNode {
        self.alloc(NodeKind::Root, "")
    }

    pub fn kind(&self, node: HostNode) -> NodeKind {
        self.nodes.borrow()[Self::index(node)].kind.clone()
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.nodes.borrow()[Self::index(node)].children.clone()
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.nodes.borrow()[Self::index(node)].parent
    }

    pub fn prop(&self, node: HostNode, key: &str) -> Option<PropValue> {
        self.nodes.borrow()[Self::index(node)].props.get(key).cloned()
    }

    /// Own text of a text, comment, or text-content element node.
    pub fn text(&self, node: HostNode) -> String {
        self.nodes.borrow()[Self::index(node)].text.clone()
    }

    /// Concatenated text of the node and its descendants, comments excluded.
    pub fn text_content(&self, node: HostNode) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let data = &nodes[Self::index(current)];
            if data.kind != NodeKind::Comment {
                out.push_str(&data.text);
            }
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }

    /// Markup-like rendering of the subtree, for assertions.
    ///
    /// A root renders as its children. Handlers and `false` flags are
    /// omitted; `true` flags render as bare names.
    pub fn serialize(&self, node: HostNode) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        Self::write_node(&nodes, node, &mut out);
        out
    }

    fn write_node(nodes: &[NodeData], node: HostNode, out: &mut String) {
        let data = &nodes[Self::index(node)];
        match &data.kind {
            NodeKind::Root => {
                for child in &data.children {
                    Self::write_node(nodes, *child, out);
                }
            }
            NodeKind::Text => out.push_str(&data.text),
            NodeKind::Comment => {
                let _ = write!(out, "<!--{}-->", data.text);
            }
            NodeKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (key, value) in &data.props {
                    let _ = match value {
                        PropValue::Bool(true) => write!(out, " {key}"),
                        PropValue::Bool(false) | PropValue::Handler(_) => Ok(()),
                        PropValue::Number(n) => write!(out, " {key}=\"{n}\""),
                        PropValue::String(s) => write!(out, " {key}=\"{s}\""),
                    };
                }
                out.push('>');
                out.push_str(&data.text);
                for child in &data.children {
                    Self::write_node(nodes, *child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    /// Invoke the `on<Event>` handler of a node. Returns whether one ran.
    pub fn dispatch(&self, node: HostNode, event: &str) -> bool {
        let key = event_prop_name(event);
        let handler = self
            .prop(node, &key)
            .and_then(|value| value.as_handler().cloned());
        match handler {
            Some(handler) => {
                handler.call();
                true
            }
            None => false,
        }
    }

    /// Every recorded operation so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.borrow().clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    /// Count the recorded operations.
    pub fn stats(&self) -> OpStats {
        let mut stats = OpStats::default();
        for op in self.ops.borrow().iter() {
            match op {
                HostOp::Create { .. } => stats.creates += 1,
                HostOp::Insert { moved: false, .. } => stats.inserts += 1,
                HostOp::Insert { moved: true, .. } => stats.moves += 1,
                HostOp::Remove { .. } => stats.removes += 1,
                HostOp::SetElementText { .. } | HostOp::SetText { .. } => stats.text_updates += 1,
                HostOp::PatchProp { .. } => stats.prop_patches += 1,
            }
        }
        stats
    }

    fn detach(nodes: &mut [NodeData], node: HostNode) -> bool {
        let Some(parent) = nodes[Self::index(node)].parent.take() else {
            return false;
        };
        nodes[Self::index(parent)].children.retain(|child| *child != node);
        true
    }
}

impl HostAdapter for MemoryHost {
    fn create_element(&self, tag: &str) -> HostNode {
        let kind = NodeKind::Element(Rc::from(tag));
        let node = self.alloc(kind.clone(), "");
        self.log(HostOp::Create { node, kind });
        node
    }

    fn create_text(&self, text: &str) -> HostNode {
        let node = self.alloc(NodeKind::Text, text);
        self.log(HostOp::Create {
            node,
            kind: NodeKind::Text,
        });
        node
    }

    fn create_comment(&self, text: &str) -> HostNode {
        let node = self.alloc(NodeKind::Comment, text);
        self.log(HostOp::Create {
            node,
            kind: NodeKind::Comment,
        });
        node
    }

    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        let moved = {
            let mut nodes = self.nodes.borrow_mut();
            let moved = Self::detach(&mut nodes, node);

            let siblings = &mut nodes[Self::index(parent)].children;
            let position = anchor
                .and_then(|anchor| siblings.iter().position(|child| *child == anchor))
                .unwrap_or(siblings.len());
            siblings.insert(position, node);
            nodes[Self::index(node)].parent = Some(parent);
            moved
        };

        self.log(HostOp::Insert {
            node,
            parent,
            anchor,
            moved,
        });
    }

    fn remove(&self, node: HostNode) {
        let removed = Self::detach(&mut self.nodes.borrow_mut(), node);
        if removed {
            self.log(HostOp::Remove { node });
        }
    }

    fn set_element_text(&self, node: HostNode, text: &str) {
        {
            let mut nodes = self.nodes.borrow_mut();
            let children = std::mem::take(&mut nodes[Self::index(node)].children);
            for child in children {
                nodes[Self::index(child)].parent = None;
            }
            nodes[Self::index(node)].text = text.to_string();
        }
        self.log(HostOp::SetElementText {
            node,
            text: text.to_string(),
        });
    }

    fn set_text(&self, node: HostNode, text: &str) {
        self.nodes.borrow_mut()[Self::index(node)].text = text.to_string();
        self.log(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn patch_prop(&self, node: HostNode, key: &str, _prev: Option<&PropValue>, next: Option<&PropValue>) {
        {
            let mut nodes = self.nodes.borrow_mut();
            let props = &mut nodes[Self::index(node)].props;
            match next {
                Some(value) => {
                    props.insert(Rc::from(key), value.clone());
                }
                None => {
                    props.shift_remove(key);
                }
            }
        }
        self.log(HostOp::PatchProp {
            node,
            key: key.to_string(),
            value: next.cloned(),
        });
    }

    fn parent_node(&self, node: HostNode) -> Option<HostNode> {
        self.parent(node)
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let nodes = self.nodes.borrow();
        let parent = nodes[Self::index(node)].parent?;
        let siblings = &nodes[Self::index(parent)].children;
        let position = siblings.iter().position(|child| *child == node)?;
        siblings.get(position + 1).copied()
    }
}
