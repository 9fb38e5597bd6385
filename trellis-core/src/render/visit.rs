//! Two-phase tree visitor.
//!
//! [`walk`] visits a VNode tree depth-first. Entering a node calls the
//! visitor method for its kind, which may return an exit callback. Exit
//! callbacks run after all of the node's descendants have been visited, so
//! they observe the tree in post-order while entry runs in pre-order.
//!
//! The walk uses an explicit frame stack instead of recursion. A mounted
//! component's children are the nodes of its rendered subtree.

use std::rc::Rc;

use super::component::ComponentInstance;
use super::vnode::{Children, VNode, VNodeType};

/// Callback run when leaving a node.
pub type Exit = Box<dyn FnOnce()>;

/// Per-kind entry callbacks. Every method defaults to "no exit callback".
pub trait Visitor {
    fn enter_element(&mut self, _node: &VNode) -> Option<Exit> {
        None
    }

    fn enter_text(&mut self, _node: &VNode) -> Option<Exit> {
        None
    }

    fn enter_comment(&mut self, _node: &VNode) -> Option<Exit> {
        None
    }

    fn enter_fragment(&mut self, _node: &VNode) -> Option<Exit> {
        None
    }

    /// `instance` is `None` for a component node that was never mounted.
    fn enter_component(
        &mut self,
        _node: &VNode,
        _instance: Option<&Rc<ComponentInstance>>,
    ) -> Option<Exit> {
        None
    }
}

enum Frame {
    Enter(VNode),
    Exit(Exit),
}

/// Walk `root` and its descendants.
pub fn walk<V: Visitor + ?Sized>(root: &VNode, visitor: &mut V) {
    let mut stack = vec![Frame::Enter(root.clone())];

    while let Some(frame) = stack.pop() {
        let node = match frame {
            Frame::Exit(exit) => {
                exit();
                continue;
            }
            Frame::Enter(node) => node,
        };

        let exit = match node.ty() {
            VNodeType::Element(_) => visitor.enter_element(&node),
            VNodeType::Text => visitor.enter_text(&node),
            VNodeType::Comment => visitor.enter_comment(&node),
            VNodeType::Fragment => visitor.enter_fragment(&node),
            VNodeType::Component(_) => {
                let instance = node.component_instance();
                visitor.enter_component(&node, instance.as_ref())
            }
        };
        if let Some(exit) = exit {
            stack.push(Frame::Exit(exit));
        }

        // Children are pushed in reverse so they pop in document order.
        match node.ty() {
            VNodeType::Component(_) => {
                if let Some(subtree) = node.component_instance().and_then(|i| i.subtree()) {
                    stack.push(Frame::Enter(subtree));
                }
            }
            _ => {
                if let Children::Array(children) = node.children() {
                    stack.extend(children.iter().rev().cloned().map(Frame::Enter));
                }
            }
        }
    }
}
