// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{bit_at, JetId, ObjectId};
use bincode::{Decode, Encode};

#[derive(Debug)]
pub enum TreeErr {
    /// Split target is not a current leaf of the tree
    NotALeaf,
}

#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Default)]
struct TreeNode {
    actual: bool,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    // Children are always created in pairs so the leaves partition the
    // identifier space with no gaps and no overlap.
    fn materialize_children(&mut self) {
        if self.is_leaf() {
            self.left = Some(Box::default());
            self.right = Some(Box::default());
        }
    }
}

/// One pulse generation's binary prefix tree mapping object identifiers to
/// jets. A new generation is produced by cloning the previous one at each
/// pulse boundary; splits are irreversible within a generation.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone)]
pub struct Tree {
    head: TreeNode,
}

impl Tree {
    /// Creates a tree with a single root leaf. `actual` marks the root as
    /// a live, assignable jet (used for the genesis generation).
    #[must_use]
    pub fn new(actual: bool) -> Self {
        Self {
            head: TreeNode {
                actual,
                left: None,
                right: None,
            },
        }
    }

    /// Resolves the jet owning `id` by consuming one prefix bit per level
    /// until a leaf is reached. Returns the jet and its actuality.
    #[must_use]
    pub fn find(&self, id: &ObjectId) -> (JetId, bool) {
        let mut node = &self.head;
        let mut depth: u8 = 0;
        loop {
            let child = if bit_at(&id.hash.0, depth) {
                &node.right
            } else {
                &node.left
            };
            match child {
                Some(next) => {
                    node = next;
                    depth += 1;
                }
                None => return (JetId::new(depth, &id.hash.0), node.actual),
            }
        }
    }

    /// Inserts the path down to `jet` (creating sibling pairs along the
    /// way) and marks the target node's actuality.
    pub fn update(&mut self, jet: &JetId, set_actual: bool) {
        let mut node = &mut self.head;
        for i in 0..jet.depth {
            node.materialize_children();
            node = if jet.bit(i) {
                node.right.as_mut().unwrap()
            } else {
                node.left.as_mut().unwrap()
            };
        }
        node.actual = set_actual;
    }

    /// Replaces the `jet` leaf with two children extending its prefix by
    /// one bit. Fails if the target is not a current leaf.
    pub fn split(&mut self, jet: &JetId) -> Result<(JetId, JetId), TreeErr> {
        let mut node = &mut self.head;
        for i in 0..jet.depth {
            let child = if jet.bit(i) {
                node.right.as_mut()
            } else {
                node.left.as_mut()
            };
            node = child.ok_or(TreeErr::NotALeaf)?;
        }
        if !node.is_leaf() {
            return Err(TreeErr::NotALeaf);
        }
        node.materialize_children();
        node.actual = false;
        node.left.as_mut().unwrap().actual = true;
        node.right.as_mut().unwrap().actual = true;
        Ok(jet.children())
    }

    /// Structural copy for the next pulse generation. With `keep_actual`
    /// unset, actuality is reset and must be re-established by updates.
    #[must_use]
    pub fn clone_tree(&self, keep_actual: bool) -> Self {
        let mut cloned = self.clone();
        if !keep_actual {
            reset_actual(&mut cloned.head);
        }
        cloned
    }

    /// All current leaves: the jets a node has to process this pulse.
    #[must_use]
    pub fn leaf_ids(&self) -> Vec<JetId> {
        let mut out = Vec::new();
        collect_leaves(&self.head, 0, [0u8; 32], &mut out);
        out
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(false)
    }
}

fn reset_actual(node: &mut TreeNode) {
    node.actual = false;
    if let Some(left) = node.left.as_mut() {
        reset_actual(left);
    }
    if let Some(right) = node.right.as_mut() {
        reset_actual(right);
    }
}

fn collect_leaves(node: &TreeNode, depth: u8, prefix: [u8; 32], out: &mut Vec<JetId>) {
    match (&node.left, &node.right) {
        (None, None) => out.push(JetId::new(depth, &prefix)),
        (Some(left), Some(right)) => {
            collect_leaves(left, depth + 1, prefix, out);
            let mut right_prefix = prefix;
            right_prefix[(depth / 8) as usize] |= 0x80 >> (depth % 8);
            collect_leaves(right, depth + 1, right_prefix, out);
        }
        // Single-child nodes cannot be constructed.
        _ => unreachable!("tree children are created in pairs"),
    }
}
