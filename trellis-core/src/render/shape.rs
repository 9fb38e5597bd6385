//! Shape flags.
//!
//! VNodes are tagged enums, so matching on [`VNodeType`] and [`Children`]
//! is the primary way to dispatch. The flags are a cached summary of both
//! for cheap combined membership tests.

use super::vnode::{Children, VNodeType};

bitflags::bitflags! {
    /// Kind of node and kind of children, as a bitfield.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u8 {
        const ELEMENT = 1 << 0;
        const STATEFUL_COMPONENT = 1 << 1;
        const TEXT_CHILDREN = 1 << 2;
        const ARRAY_CHILDREN = 1 << 3;
        const COMPONENT = Self::STATEFUL_COMPONENT.bits();
    }
}

impl ShapeFlags {
    /// Derive the flags for a node.
    pub fn of(ty: &VNodeType, children: &Children) -> Self {
        let mut flags = match ty {
            VNodeType::Element(_) => ShapeFlags::ELEMENT,
            VNodeType::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
            _ => ShapeFlags::empty(),
        };

        match children {
            Children::None => {}
            Children::Text(_) => flags |= ShapeFlags::TEXT_CHILDREN,
            Children::Array(_) => flags |= ShapeFlags::ARRAY_CHILDREN,
        }

        flags
    }
}
