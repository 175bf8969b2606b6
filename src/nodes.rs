// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{NodeRef, PulseNumber, StaticRole};
use crate::storage::StorageErr;
use bincode::{Decode, Encode};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An active network node as snapshotted per pulse.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Copy)]
pub struct Node {
    pub reference: NodeRef,
    pub role: StaticRole,
}

/// Per-pulse snapshots of the active node set. The snapshot for a pulse is
/// written exactly once, together with the pulse itself; the candidate
/// ordering inside a snapshot is what deterministic role selection
/// permutes, so it must be identical on every node.
pub trait NodeStorage: Send + Sync {
    /// Stores the active node snapshot for `pulse`. A second write for the
    /// same pulse is a conflict.
    fn set_active_nodes(&self, pulse: PulseNumber, nodes: Vec<Node>) -> Result<(), StorageErr>;

    fn active_nodes(&self, pulse: PulseNumber) -> Result<Vec<Node>, StorageErr>;

    /// Active nodes holding `role` at `pulse`, in snapshot order.
    fn in_role(&self, pulse: PulseNumber, role: StaticRole) -> Result<Vec<Node>, StorageErr>;
}

#[derive(Default)]
pub struct NodeStorageMemory {
    snapshots: RwLock<HashMap<PulseNumber, Vec<Node>>>,
}

impl NodeStorageMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStorage for NodeStorageMemory {
    fn set_active_nodes(&self, pulse: PulseNumber, nodes: Vec<Node>) -> Result<(), StorageErr> {
        let mut snapshots = self.snapshots.write();
        if snapshots.contains_key(&pulse) {
            return Err(StorageErr::Override);
        }
        snapshots.insert(pulse, nodes);
        Ok(())
    }

    fn active_nodes(&self, pulse: PulseNumber) -> Result<Vec<Node>, StorageErr> {
        self.snapshots
            .read()
            .get(&pulse)
            .cloned()
            .ok_or(StorageErr::NotFound)
    }

    fn in_role(&self, pulse: PulseNumber, role: StaticRole) -> Result<Vec<Node>, StorageErr> {
        Ok(self
            .active_nodes(pulse)?
            .into_iter()
            .filter(|n| n.role == role)
            .collect())
    }
}
