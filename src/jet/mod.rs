// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

mod tree;

pub use tree::{Tree, TreeErr};

use crate::codec;
use crate::primitives::{JetId, ObjectId, PulseNumber, GENESIS_PULSE_NUMBER};
use crate::storage::{self, KvStorage, StorageErr};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Per-pulse jet trees plus the durably persisted set of jets this node
/// has ever owned. The tree map is guarded by a single read/write lock;
/// each generation starts unlocked for its own pulse.
pub struct JetStore<DB: KvStorage> {
    db: Arc<DB>,
    trees: RwLock<HashMap<PulseNumber, Tree>>,
    jet_list_lock: RwLock<()>,
}

impl<DB: KvStorage> JetStore<DB> {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            trees: RwLock::new(HashMap::new()),
            jet_list_lock: RwLock::new(()),
        }
    }

    /// Resolves which jet owns `id` at `pulse`.
    pub fn find_jet(&self, pulse: PulseNumber, id: &ObjectId) -> (JetId, bool) {
        {
            let trees = self.trees.read();
            if let Some(tree) = trees.get(&pulse) {
                return tree.find(id);
            }
        }
        let mut trees = self.trees.write();
        Self::tree_for(&mut trees, pulse).find(id)
    }

    /// Inserts/marks jets in the tree for `pulse`.
    pub fn update_jet_tree(&self, pulse: PulseNumber, set_actual: bool, jets: &[JetId]) {
        let mut trees = self.trees.write();
        let tree = Self::tree_for(&mut trees, pulse);
        for jet in jets {
            tree.update(jet, set_actual);
        }
    }

    /// Splits `jet` in the tree for `pulse` into its two children.
    pub fn split_jet_tree(
        &self,
        pulse: PulseNumber,
        jet: &JetId,
    ) -> Result<(JetId, JetId), TreeErr> {
        let mut trees = self.trees.write();
        Self::tree_for(&mut trees, pulse).split(jet)
    }

    /// Copies the `from` generation into `to` and returns the clone's
    /// leaves. The write lock on the map prevents clobbering concurrent
    /// clones into the same pulse.
    pub fn clone_jet_tree(&self, from: PulseNumber, to: PulseNumber) -> Vec<JetId> {
        let mut trees = self.trees.write();
        let cloned = Self::tree_for(&mut trees, from).clone_tree(true);
        let leaves = cloned.leaf_ids();
        trees.insert(to, cloned);
        leaves
    }

    /// Drops a generation (bounded-history retention).
    pub fn delete_jet_tree(&self, pulse: PulseNumber) {
        self.trees.write().remove(&pulse);
    }

    /// Registers jets in the durable jet list.
    pub fn add_jets(&self, jets: &[JetId]) -> Result<(), StorageErr> {
        let _guard = self.jet_list_lock.write();
        let key = storage::jet_list_key();
        let mut set: BTreeSet<JetId> = match self.db.get(&key)? {
            Some(bytes) => codec::decode(&bytes)?,
            None => BTreeSet::new(),
        };
        set.extend(jets.iter().copied());
        self.db.set(key, codec::encode_to_vec(&set)?)
    }

    /// Returns the durable jet list.
    pub fn get_jets(&self) -> Result<BTreeSet<JetId>, StorageErr> {
        let _guard = self.jet_list_lock.read();
        match self.db.get(&storage::jet_list_key())? {
            Some(bytes) => Ok(codec::decode(&bytes)?),
            None => Ok(BTreeSet::new()),
        }
    }

    fn tree_for(trees: &mut HashMap<PulseNumber, Tree>, pulse: PulseNumber) -> &mut Tree {
        trees
            .entry(pulse)
            .or_insert_with(|| Tree::new(pulse == GENESIS_PULSE_NUMBER))
    }
}
