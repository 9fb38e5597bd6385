//! Keyed children diff.
//!
//! 1. Patch the common prefix, then the common suffix.
//! 2. If only new nodes remain, mount them; if only old nodes remain,
//!    unmount them.
//! 3. Otherwise match the unknown middle by key. Matched pairs are patched
//!    in place and recorded in `new_to_old` as `old index + 1`. Old nodes
//!    with no match (including unkeyed ones) are unmounted.
//! 4. Walk the new middle backwards, mounting unmatched nodes and moving
//!    matched ones that are not on the longest increasing subsequence of
//!    `new_to_old`.
//!
//! Matching in the middle is by key only. Unkeyed nodes there are
//! unmounted and remounted even when an identical node exists on the
//! other side.

use indexmap::IndexMap;

use super::Renderer;
use crate::render::host::{HostAdapter, HostNode};
use crate::render::sequence::longest_increasing_subsequence;
use crate::render::vnode::{is_same_vnode_type, Key, VNode};

impl<H: HostAdapter + 'static> Renderer<H> {
    pub(super) fn patch_keyed_children(
        &self,
        old: &[VNode],
        new: &[VNode],
        container: HostNode,
        parent_anchor: Option<HostNode>,
    ) {
        let mut i = 0usize;
        let mut e1 = old.len() as isize - 1;
        let mut e2 = new.len() as isize - 1;

        // 1. prefix
        while (i as isize) <= e1 && (i as isize) <= e2 {
            if !is_same_vnode_type(&old[i], &new[i]) {
                break;
            }
            self.patch(Some(&old[i]), &new[i], container, None);
            i += 1;
        }

        // 1. suffix
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let (a, b) = (&old[e1 as usize], &new[e2 as usize]);
            if !is_same_vnode_type(a, b) {
                break;
            }
            self.patch(Some(a), b, container, None);
            e1 -= 1;
            e2 -= 1;
        }

        // 2. pure mount / pure unmount
        if i as isize > e1 {
            if i as isize <= e2 {
                let anchor = self.anchor_after(new, e2 as usize, parent_anchor);
                for node in &new[i..=e2 as usize] {
                    self.patch(None, node, container, anchor);
                }
            }
            return;
        }
        if i as isize > e2 {
            for node in &old[i..=e1 as usize] {
                self.unmount(node);
            }
            return;
        }

        // 3. unknown middle
        let (s1, s2) = (i, i);
        let (e1, e2) = (e1 as usize, e2 as usize);

        let key_to_new: IndexMap<&Key, usize> = (s2..=e2)
            .filter_map(|j| new[j].key().map(|key| (key, j)))
            .collect();

        let to_be_patched = e2 - s2 + 1;
        let mut patched = 0usize;
        let mut new_to_old = vec![0usize; to_be_patched];
        let mut moved = false;
        let mut max_new_so_far = 0usize;

        for (j, prev) in old.iter().enumerate().take(e1 + 1).skip(s1) {
            if patched >= to_be_patched {
                self.unmount(prev);
                continue;
            }

            let new_index = prev
                .key()
                .and_then(|key| key_to_new.get(key).copied())
                .filter(|&ni| new_to_old[ni - s2] == 0 && is_same_vnode_type(prev, &new[ni]));

            let Some(ni) = new_index else {
                self.unmount(prev);
                continue;
            };

            new_to_old[ni - s2] = j + 1;
            if ni >= max_new_so_far {
                max_new_so_far = ni;
            } else {
                moved = true;
            }
            self.patch(Some(prev), &new[ni], container, None);
            patched += 1;
        }

        // 4. place, last to first
        let stable = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };
        let mut lis = stable.len() as isize - 1;
        let mut moves = 0usize;

        for k in (0..to_be_patched).rev() {
            let ni = s2 + k;
            let anchor = self.anchor_after(new, ni, parent_anchor);

            if new_to_old[k] == 0 {
                self.patch(None, &new[ni], container, anchor);
            } else if moved {
                if lis < 0 || stable[lis as usize] != k {
                    self.move_node(&new[ni], container, anchor);
                    moves += 1;
                } else {
                    lis -= 1;
                }
            }
        }

        tracing::trace!(
            old = old.len(),
            new = new.len(),
            matched = patched,
            moves,
            "keyed diff"
        );
    }

    /// Host node to insert before when placing `nodes[index]`: the first
    /// host node of the nearest following sibling that has one.
    fn anchor_after(
        &self,
        nodes: &[VNode],
        index: usize,
        parent_anchor: Option<HostNode>,
    ) -> Option<HostNode> {
        nodes[index + 1..]
            .iter()
            .find_map(|next| self.first_host_node(next))
            .or(parent_anchor)
    }
}
