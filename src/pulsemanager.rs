// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::codec;
use crate::coordinator::{CoordinatorErr, JetCoordinator};
use crate::crypto::CryptoScheme;
use crate::drops::{DropSize, DropStorage, JetDrop};
use crate::jet::{JetStore, TreeErr};
use crate::message::{BusErr, HotData, HotIndex, LedgerMessage, MessageBus, Reply, SendOptions};
use crate::nodes::{Node, NodeStorage};
use crate::primitives::{
    Hash256, JetId, NodeRef, PulseNumber, StaticRole, GENESIS_PULSE_NUMBER,
};
use crate::pulse::{Pulse, PulseStorage, PulseTracker, StoredPulse};
use crate::recent::{RecentStorage, RecentStorageProvider};
use crate::replication::{HeavySyncPool, SyncJob};
use crate::settings::SETTINGS;
use crate::storage::{KvStorage, ObjectStorage, StorageErr};
use log::*;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub enum PulseManagerErr {
    /// The manager has been stopped; transitions are rejected, not queued
    Stopped,

    /// Storage failure
    Storage(StorageErr),

    /// Role resolution failure
    Coordinator(CoordinatorErr),

    /// Jet tree failure
    Tree(TreeErr),

    /// Transport failure during handoff
    Bus(BusErr),
}

impl From<StorageErr> for PulseManagerErr {
    fn from(other: StorageErr) -> Self {
        Self::Storage(other)
    }
}

impl From<CoordinatorErr> for PulseManagerErr {
    fn from(other: CoordinatorErr) -> Self {
        Self::Coordinator(other)
    }
}

impl From<TreeErr> for PulseManagerErr {
    fn from(other: TreeErr) -> Self {
        Self::Tree(other)
    }
}

impl From<BusErr> for PulseManagerErr {
    fn from(other: BusErr) -> Self {
        Self::Bus(other)
    }
}

/// What happens to the remaining jets of a transition once one jet's seal
/// or handoff fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardFailurePolicy {
    /// Abort the transition on the first failure.
    #[default]
    FailFast,

    /// Log the failure and keep processing the remaining jets.
    ContinueRemaining,
}

/// Supplies the currently active node set when a pulse is persisted. The
/// production source is the node network; the core only snapshots it.
pub trait ActiveNodeSource: Send + Sync {
    fn snapshot(&self) -> Vec<Node>;
}

/// Node-wide mutable state owned by the pulse manager: the current pulse
/// cell and the execution lock blocking contract execution while the pulse
/// swaps.
pub struct ClusterState {
    pulses: PulseStorage,
    execution_lock: Mutex<()>,
}

impl ClusterState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pulses: PulseStorage::new(),
            execution_lock: Mutex::new(()),
        }
    }

    /// The pulse the node currently operates in.
    #[must_use]
    pub fn current_pulse(&self) -> Pulse {
        self.pulses.current()
    }

    /// Held by contract execution; a pulse swap takes it exclusively, so
    /// execution stalls only for the brief swap window.
    pub fn execution_guard(&self) -> MutexGuard<'_, ()> {
        self.execution_lock.lock()
    }
}

impl Default for ClusterState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PulseManagerOptions {
    pub light_chain_limit: u32,
    pub split_threshold: u64,
    pub drop_history_size: usize,
    pub enable_sync: bool,
    pub sync_message_limit: usize,
    pub recent_object_ttl: u32,
}

impl PulseManagerOptions {
    #[must_use]
    pub fn from_settings() -> Self {
        Self {
            light_chain_limit: SETTINGS.ledger.light_chain_limit,
            split_threshold: SETTINGS.ledger.split_threshold,
            drop_history_size: SETTINGS.ledger.drop_history_size,
            enable_sync: SETTINGS.ledger.heavy_sync_enabled,
            sync_message_limit: SETTINGS.ledger.heavy_sync_message_limit,
            recent_object_ttl: SETTINGS.ledger.recent_object_ttl,
        }
    }
}

impl Default for PulseManagerOptions {
    fn default() -> Self {
        let ledger = crate::settings::Ledger::default();
        Self {
            light_chain_limit: ledger.light_chain_limit,
            split_threshold: ledger.split_threshold,
            drop_history_size: ledger.drop_history_size,
            enable_sync: ledger.heavy_sync_enabled,
            sync_message_limit: ledger.heavy_sync_message_limit,
            recent_object_ttl: ledger.recent_object_ttl,
        }
    }
}

/// The pulse transition orchestrator. One externally delivered pulse at a
/// time: swap the current-pulse cell, persist the pulse and node snapshot,
/// then for every owned jet seal the ended window into a drop, decide a
/// split, and hand the hot working set to the next window's executor.
pub struct PulseManager<DB: KvStorage + 'static> {
    me: NodeRef,
    role: StaticRole,
    state: Arc<ClusterState>,
    options: PulseManagerOptions,
    failure_policy: ShardFailurePolicy,
    tracker: Arc<dyn PulseTracker>,
    nodes: Arc<dyn NodeStorage>,
    node_source: Arc<dyn ActiveNodeSource>,
    jets: Arc<JetStore<DB>>,
    objects: ObjectStorage<DB>,
    drops: DropStorage<DB>,
    recent: RecentStorageProvider,
    coordinator: JetCoordinator<DB>,
    bus: Arc<dyn MessageBus>,
    sync_pool: HeavySyncPool<DB>,
    /// Serializes transitions against each other and against stop.
    set_lock: Mutex<()>,
    stopped: AtomicBool,
}

impl<DB: KvStorage + 'static> PulseManager<DB> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        me: NodeRef,
        role: StaticRole,
        db: Arc<DB>,
        scheme: Arc<dyn CryptoScheme>,
        tracker: Arc<dyn PulseTracker>,
        nodes: Arc<dyn NodeStorage>,
        node_source: Arc<dyn ActiveNodeSource>,
        bus: Arc<dyn MessageBus>,
        options: PulseManagerOptions,
        failure_policy: ShardFailurePolicy,
    ) -> Self {
        let jets = Arc::new(JetStore::new(db.clone()));
        let coordinator = JetCoordinator::new(
            me,
            options.light_chain_limit,
            tracker.clone(),
            jets.clone(),
            nodes.clone(),
        );
        let sync_pool = HeavySyncPool::new(db.clone(), bus.clone(), options.sync_message_limit);
        Self {
            me,
            role,
            state: Arc::new(ClusterState::new()),
            options,
            failure_policy,
            tracker,
            nodes,
            node_source,
            objects: ObjectStorage::new(db.clone()),
            drops: DropStorage::new(db, scheme, options.drop_history_size),
            recent: RecentStorageProvider::new(options.recent_object_ttl),
            jets,
            coordinator,
            bus,
            sync_pool,
            set_lock: Mutex::new(()),
            stopped: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn cluster_state(&self) -> Arc<ClusterState> {
        self.state.clone()
    }

    #[must_use]
    pub fn jets(&self) -> &Arc<JetStore<DB>> {
        &self.jets
    }

    #[must_use]
    pub fn coordinator(&self) -> &JetCoordinator<DB> {
        &self.coordinator
    }

    /// The hot working set for `jet`. Request handlers register touched
    /// objects and pending requests here.
    #[must_use]
    pub fn recent_storage(&self, jet: &JetId) -> Arc<RecentStorage> {
        self.recent.get_storage(jet)
    }

    /// Prepares the node for its first pulse: seeds the genesis pulse and
    /// node snapshot, starts the replication worker and rehydrates the
    /// working sets from durable indexes still inside the light window.
    pub fn start(&self) -> Result<(), PulseManagerErr> {
        match self.tracker.add_pulse(Pulse::genesis()) {
            // Already seeded on a previous run.
            Ok(()) | Err(StorageErr::BadPulse) => {}
            Err(err) => return Err(err.into()),
        }
        match self
            .nodes
            .set_active_nodes(GENESIS_PULSE_NUMBER, self.node_source.snapshot())
        {
            Ok(()) | Err(StorageErr::Override) => {}
            Err(err) => return Err(err.into()),
        }
        if self.options.enable_sync {
            self.sync_pool.start();
        }
        self.restore_recent_objects()
    }

    /// Rejects further transitions and drains the replication queue. An
    /// in-flight transition finishes first.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let _wait = self.set_lock.lock();
        self.sync_pool.stop();
    }

    /// Drives one pulse transition. With `persist` unset only the
    /// in-memory current-pulse cell is swapped (ephemeral pulse, no
    /// sealing, no handoff).
    pub fn set(&self, new_pulse: Pulse, persist: bool) -> Result<(), PulseManagerErr> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(PulseManagerErr::Stopped);
        }
        let _transition = self.set_lock.lock();
        if self.stopped.load(Ordering::Acquire) {
            return Err(PulseManagerErr::Stopped);
        }

        let ended = {
            let _execution = self.state.execution_lock.lock();

            let ended = match self.tracker.get_latest_pulse() {
                Ok(stored) => Some(stored),
                Err(StorageErr::NotFound) => None,
                Err(err) => return Err(err.into()),
            };
            if persist {
                if let Some(latest) = &ended {
                    if new_pulse.number <= latest.pulse.number {
                        return Err(StorageErr::BadPulse.into());
                    }
                }
            }

            self.state.pulses.set(new_pulse);

            if persist {
                // Node snapshot first: a durable pulse record must never
                // exist without its matching node-set record.
                self.nodes
                    .set_active_nodes(new_pulse.number, self.node_source.snapshot())?;
                self.tracker.add_pulse(new_pulse)?;
            }
            ended
        };

        if !persist {
            return Ok(());
        }

        if self.role == StaticRole::LightMaterial {
            if let Some(ended) = ended {
                self.process_jets(&ended, &new_pulse)?;
            }
        }

        // The swap has committed; a notification failure is not fatal.
        if let Err(err) = self.bus.on_pulse(new_pulse) {
            error!("pulse {} notification failed: {err:?}", new_pulse.number);
        }
        Ok(())
    }

    fn process_jets(&self, ended: &StoredPulse, new_pulse: &Pulse) -> Result<(), PulseManagerErr> {
        let ended_number = ended.pulse.number;
        let leaves = self.jets.clone_jet_tree(ended_number, new_pulse.number);

        let mut sealed = Vec::new();
        for jet in leaves {
            match self.process_jet(&jet, ended_number, ended.prev, new_pulse.number) {
                Ok(true) => sealed.push(jet),
                // Another node's jet; it does the sealing.
                Ok(false) => {}
                Err(err) => match self.failure_policy {
                    ShardFailurePolicy::FailFast => return Err(err),
                    ShardFailurePolicy::ContinueRemaining => {
                        error!(
                            "jet {jet} failed during transition to pulse {}: {err:?}",
                            new_pulse.number
                        );
                    }
                },
            }
        }

        if self.options.enable_sync {
            for jet in sealed {
                if let Err(err) = self.sync_pool.enqueue(SyncJob {
                    jet,
                    pulse: ended_number,
                }) {
                    warn!("heavy sync enqueue failed for jet {jet}: {err:?}");
                }
            }
        }

        // Tree generations past the light window route to heavy storage
        // and are never consulted again.
        match self
            .tracker
            .get_nth_prev_pulse(self.options.light_chain_limit + 1, new_pulse.number)
        {
            Ok(old) => self.jets.delete_jet_tree(old.pulse.number),
            Err(StorageErr::InsufficientHistory) => {}
            Err(err) => warn!("jet tree eviction skipped: {err:?}"),
        }
        Ok(())
    }

    /// Seals and hands off one jet. `Ok(false)` means this node was not
    /// the jet's executor for the ended window.
    fn process_jet(
        &self,
        jet: &JetId,
        ended: PulseNumber,
        prev: Option<PulseNumber>,
        next: PulseNumber,
    ) -> Result<bool, PulseManagerErr> {
        // Sealing authority follows the outgoing assignment, not the
        // incoming one.
        let executor = self.coordinator.light_executor_for_jet(jet, ended)?;
        if executor != self.me {
            return Ok(false);
        }

        let prev_hash = match prev {
            Some(prev) => self.previous_drop_hash(jet, prev)?,
            None => Hash256::zero(),
        };
        let (drop, _, size) = self.drops.create_drop(jet, ended, prev_hash)?;
        match self.drops.set_drop(&drop) {
            // Already sealed identically by an earlier attempt.
            Ok(()) | Err(StorageErr::Override) => {}
            Err(err) => return Err(err.into()),
        }
        self.drops.add_drop_size(jet, ended, size)?;
        let history = self.drops.get_drop_size_history(jet)?;

        if self.drops.should_split(&history, self.options.split_threshold) {
            let (left, right) = self.jets.split_jet_tree(next, jet)?;
            self.jets.add_jets(&[left, right])?;
            info!("jet {jet} split into {left} and {right} at pulse {next}");
            self.recent.clone_storage(jet, &left);
            self.recent.clone_storage(jet, &right);
            for child in [left, right] {
                self.send_hot_data(jet, &child, next, &drop, &history)?;
            }
        } else {
            self.send_hot_data(jet, jet, next, &drop, &history)?;
        }

        let recent = self.recent.get_storage(jet);
        recent.decrement_ttl();
        recent.clear_zero_ttl_objects();
        Ok(true)
    }

    /// The hash the new drop chains to: the jet's own drop for the prior
    /// window, or the parent's when the jet was just created by a split.
    /// No drop on either level is a hard error, never an empty fallback.
    fn previous_drop_hash(&self, jet: &JetId, prev: PulseNumber) -> Result<Hash256, StorageErr> {
        match self.drops.get_drop(jet, prev) {
            Ok(drop) => Ok(drop.hash),
            Err(StorageErr::NotFound) if jet.depth > 0 => {
                Ok(self.drops.get_drop(&jet.parent(), prev)?.hash)
            }
            Err(err) => Err(err),
        }
    }

    /// Packages `drop_jet`'s working set for `target_jet` (they differ
    /// right after a split) and sends it pinned to the executor owning
    /// `target_jet` in the new window.
    fn send_hot_data(
        &self,
        drop_jet: &JetId,
        target_jet: &JetId,
        next: PulseNumber,
        drop: &JetDrop,
        history: &[DropSize],
    ) -> Result<(), PulseManagerErr> {
        let recent = self.recent.get_storage(drop_jet);
        let split = target_jet != drop_jet;

        let mut recent_objects = HashMap::new();
        for (id, ttl) in recent.get_objects() {
            if split && !target_jet.contains(&id) {
                continue;
            }
            match self.objects.get_object_index(drop_jet, &id) {
                Ok(index) => {
                    let index = codec::encode_to_vec(&index).map_err(StorageErr::from)?;
                    recent_objects.insert(id, HotIndex { ttl, index });
                }
                Err(StorageErr::NotFound) => {
                    warn!("recent object {id:?} has no index, dropped from handoff");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let mut pending_requests = HashMap::new();
        for (object, requests) in recent.get_requests() {
            if split && !target_jet.contains(&object) {
                continue;
            }
            let mut serialized = HashMap::new();
            for request in requests.keys() {
                match self.objects.get_record(drop_jet, request) {
                    Ok(record) => {
                        let bytes = codec::encode_to_vec(&record).map_err(StorageErr::from)?;
                        serialized.insert(*request, bytes);
                    }
                    Err(StorageErr::NotFound) => {
                        warn!("pending request {request:?} has no record, dropped from handoff");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            if !serialized.is_empty() {
                pending_requests.insert(object, serialized);
            }
        }

        let receiver = self.coordinator.light_executor_for_jet(target_jet, next)?;
        let hot = HotData {
            drop_jet: *drop_jet,
            jet: *target_jet,
            pulse: next,
            drop: drop.clone(),
            recent_objects,
            pending_requests,
            drop_size_history: history.to_vec(),
        };
        let reply = self.bus.send(
            LedgerMessage::HotData(hot),
            SendOptions {
                receiver: Some(receiver),
            },
        )?;
        match reply {
            Reply::Ok => Ok(()),
            Reply::Error(err) => Err(PulseManagerErr::Bus(BusErr::Transport(err))),
        }
    }

    /// Refills the working sets from durable indexes whose object pulse is
    /// still inside the light retention window.
    fn restore_recent_objects(&self) -> Result<(), PulseManagerErr> {
        let current = self.state.pulses.current().number;
        let horizon = current.saturating_sub(self.options.light_chain_limit);

        let mut jets = self.jets.get_jets()?;
        jets.insert(JetId::root());
        for jet in jets {
            let recent = self.recent.get_storage(&jet);
            self.objects.iterate_index_ids(&jet, &mut |id| {
                if id.pulse >= horizon {
                    recent.add_object(id);
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl<DB: KvStorage + 'static> Drop for PulseManager<DB> {
    fn drop(&mut self) {
        self.sync_pool.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PlatformScheme;
    use crate::message::testbus::RecordingBus;
    use crate::primitives::{Entropy, ObjectId};
    use crate::pulse::PulseTrackerMemory;
    use crate::storage::{Lifeline, MemoryStorage, Record};

    struct FixedNodeSource(Vec<Node>);

    impl ActiveNodeSource for FixedNodeSource {
        fn snapshot(&self) -> Vec<Node> {
            self.0.clone()
        }
    }

    struct Fixture {
        db: Arc<MemoryStorage>,
        tracker: Arc<PulseTrackerMemory>,
        nodes: Arc<crate::nodes::NodeStorageMemory>,
        bus: Arc<RecordingBus>,
        me: NodeRef,
        manager: PulseManager<MemoryStorage>,
    }

    fn options() -> PulseManagerOptions {
        PulseManagerOptions {
            light_chain_limit: 5,
            split_threshold: 1_000_000,
            drop_history_size: 3,
            enable_sync: false,
            sync_message_limit: 10,
            recent_object_ttl: 3,
        }
    }

    fn fixture(options: PulseManagerOptions, policy: ShardFailurePolicy) -> Fixture {
        fixture_with_role(options, policy, StaticRole::LightMaterial)
    }

    fn fixture_with_role(
        options: PulseManagerOptions,
        policy: ShardFailurePolicy,
        role: StaticRole,
    ) -> Fixture {
        let db = Arc::new(MemoryStorage::new());
        let tracker = Arc::new(PulseTrackerMemory::new());
        let nodes = Arc::new(crate::nodes::NodeStorageMemory::new());
        let bus = Arc::new(RecordingBus::new());
        let me = NodeRef([0xaa; 32]);
        let source = Arc::new(FixedNodeSource(vec![
            Node {
                reference: me,
                role: StaticRole::LightMaterial,
            },
            Node {
                reference: NodeRef([0xbb; 32]),
                role: StaticRole::HeavyMaterial,
            },
        ]));
        let manager = PulseManager::new(
            me,
            role,
            db.clone(),
            Arc::new(PlatformScheme::default()),
            tracker.clone(),
            nodes.clone(),
            source,
            bus.clone(),
            options,
            policy,
        );
        Fixture {
            db,
            tracker,
            nodes,
            bus,
            me,
            manager,
        }
    }

    fn pulse(number: PulseNumber) -> Pulse {
        Pulse::new(number, Entropy([number as u8; 64]))
    }

    #[test]
    fn ephemeral_pulse_swaps_without_processing() {
        let f = fixture(options(), ShardFailurePolicy::default());
        f.manager.start().unwrap();
        f.manager.set(pulse(1), false).unwrap();

        assert_eq!(f.manager.cluster_state().current_pulse().number, 1);
        // Chain and bus untouched.
        assert_eq!(f.tracker.get_latest_pulse().unwrap().pulse.number, 0);
        assert!(f.bus.sent.lock().is_empty());
        assert!(f.bus.pulses.lock().is_empty());
    }

    #[test]
    fn transition_seals_drop_and_hands_off() {
        let f = fixture(options(), ShardFailurePolicy::default());
        f.manager.start().unwrap();

        let objects = ObjectStorage::new(f.db.clone());
        let state = objects
            .set_record(
                &JetId::root(),
                0,
                &Record::Activate {
                    memory: vec![1, 2, 3],
                },
            )
            .unwrap();
        let id = ObjectId::new(0, Hash256([9; 32]));
        objects
            .set_object_index(&JetId::root(), &id, &Lifeline::activated(state, 0))
            .unwrap();
        f.manager.recent_storage(&JetId::root()).add_object(id);

        f.manager.set(pulse(1), true).unwrap();

        let sent = f.bus.sent_hot_data();
        assert_eq!(sent.len(), 1);
        let (hot, opts) = &sent[0];
        assert_eq!(opts.receiver, Some(f.me));
        assert_eq!(hot.jet, JetId::root());
        assert_eq!(hot.pulse, 1);
        assert_eq!(hot.drop.pulse, 0);
        assert_eq!(hot.drop.prev_hash, Hash256::zero());
        assert!(hot.drop.size > 0);
        assert_eq!(hot.recent_objects[&id].ttl, 3);
        assert_eq!(hot.drop_size_history.len(), 1);
        assert_eq!(f.bus.pulses.lock().len(), 1);

        // Sealed durably, second window chains to it.
        let drops = DropStorage::new(
            f.db.clone(),
            Arc::new(PlatformScheme::default()) as Arc<dyn CryptoScheme>,
            3,
        );
        let first = drops.get_drop(&JetId::root(), 0).unwrap();

        f.manager.set(pulse(2), true).unwrap();
        let sent = f.bus.sent_hot_data();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].0.drop.prev_hash, first.hash);
    }

    #[test]
    fn non_light_node_skips_processing_but_notifies() {
        let f = fixture_with_role(
            options(),
            ShardFailurePolicy::default(),
            StaticRole::Virtual,
        );
        f.manager.start().unwrap();
        f.manager.set(pulse(1), true).unwrap();
        assert!(f.bus.sent.lock().is_empty());
        assert_eq!(f.bus.pulses.lock().len(), 1);
    }

    #[test]
    fn oversized_jet_splits_and_sends_two_payloads() {
        let mut opts = options();
        opts.split_threshold = 0;
        opts.drop_history_size = 1;
        let f = fixture(opts, ShardFailurePolicy::default());
        f.manager.start().unwrap();

        let objects = ObjectStorage::new(f.db.clone());
        objects
            .set_record(
                &JetId::root(),
                0,
                &Record::Activate {
                    memory: vec![7; 16],
                },
            )
            .unwrap();

        f.manager.set(pulse(1), true).unwrap();

        let sent = f.bus.sent_hot_data();
        assert_eq!(sent.len(), 2);
        let (left, right) = JetId::root().children();
        assert_eq!(sent[0].0.jet, left);
        assert_eq!(sent[1].0.jet, right);
        for (hot, opts) in &sent {
            assert_eq!(hot.drop_jet, JetId::root());
            assert_eq!(opts.receiver, Some(f.me));
        }
        // Both children registered durably.
        let jets = JetStore::new(f.db.clone()).get_jets().unwrap();
        assert!(jets.contains(&left) && jets.contains(&right));
    }

    #[test]
    fn split_child_chains_to_parent_drop() {
        let mut opts = options();
        opts.split_threshold = 0;
        opts.drop_history_size = 1;
        let f = fixture(opts, ShardFailurePolicy::default());
        f.manager.start().unwrap();

        let objects = ObjectStorage::new(f.db.clone());
        objects
            .set_record(
                &JetId::root(),
                0,
                &Record::Activate {
                    memory: vec![7; 16],
                },
            )
            .unwrap();

        // Splits the root at pulse 1.
        f.manager.set(pulse(1), true).unwrap();
        // The children seal their first own windows; neither has a drop at
        // pulse 0, both fall back to the root's.
        f.manager.set(pulse(2), true).unwrap();

        let drops = DropStorage::new(
            f.db.clone(),
            Arc::new(PlatformScheme::default()) as Arc<dyn CryptoScheme>,
            1,
        );
        let root_drop = drops.get_drop(&JetId::root(), 0).unwrap();
        let (left, right) = JetId::root().children();
        for child in [left, right] {
            let child_drop = drops.get_drop(&child, 1).unwrap();
            assert_eq!(child_drop.prev_hash, root_drop.hash);
        }
    }

    #[test]
    fn missing_parent_drop_fails_the_jet() {
        let f = fixture(options(), ShardFailurePolicy::default());
        f.manager.start().unwrap();
        f.manager.set(pulse(1), true).unwrap();

        // Forge a child leaf for generation 1 and erase the drop history
        // it would fall back to.
        let (left, _) = JetId::root().children();
        f.manager.jets().update_jet_tree(1, true, &[left]);
        f.db
            .delete(&crate::storage::drop_key(&JetId::root(), 0))
            .unwrap();

        let err = f.manager.set(pulse(2), true).unwrap_err();
        assert!(matches!(
            err,
            PulseManagerErr::Storage(StorageErr::NotFound)
        ));
    }

    #[test]
    fn continue_remaining_processes_later_jets_after_a_failure() {
        let f = fixture(options(), ShardFailurePolicy::ContinueRemaining);
        f.manager.start().unwrap();
        f.manager.set(pulse(1), true).unwrap();
        let handed_off = f.bus.sent_hot_data().len();

        let (left, right) = JetId::root().children();
        f.manager.jets().update_jet_tree(1, true, &[left, right]);
        f.db
            .delete(&crate::storage::drop_key(&JetId::root(), 0))
            .unwrap();
        // Give the right child its own pulse-0 drop so only the left one
        // is missing history.
        let drops = DropStorage::new(
            f.db.clone(),
            Arc::new(PlatformScheme::default()) as Arc<dyn CryptoScheme>,
            3,
        );
        let (right_drop, _, _) = drops.create_drop(&right, 0, Hash256::zero()).unwrap();
        drops.set_drop(&right_drop).unwrap();

        f.manager.set(pulse(2), true).unwrap();
        let sent = f.bus.sent_hot_data();
        assert_eq!(sent.len(), handed_off + 1);
        assert_eq!(sent.last().unwrap().0.jet, right);
    }

    #[test]
    fn fail_fast_halts_remaining_jets() {
        let f = fixture(options(), ShardFailurePolicy::FailFast);
        f.manager.start().unwrap();
        f.manager.set(pulse(1), true).unwrap();
        let handed_off = f.bus.sent_hot_data().len();

        let (left, right) = JetId::root().children();
        f.manager.jets().update_jet_tree(1, true, &[left, right]);
        f.db
            .delete(&crate::storage::drop_key(&JetId::root(), 0))
            .unwrap();
        let drops = DropStorage::new(
            f.db.clone(),
            Arc::new(PlatformScheme::default()) as Arc<dyn CryptoScheme>,
            3,
        );
        let (right_drop, _, _) = drops.create_drop(&right, 0, Hash256::zero()).unwrap();
        drops.set_drop(&right_drop).unwrap();

        assert!(f.manager.set(pulse(2), true).is_err());
        // The right child was never reached.
        assert_eq!(f.bus.sent_hot_data().len(), handed_off);
    }

    #[test]
    fn post_stop_transitions_are_rejected() {
        let f = fixture(options(), ShardFailurePolicy::default());
        f.manager.start().unwrap();
        f.manager.stop();
        assert!(matches!(
            f.manager.set(pulse(1), true).unwrap_err(),
            PulseManagerErr::Stopped
        ));
    }

    #[test]
    fn stale_pulse_is_rejected_before_any_durable_write() {
        let f = fixture(options(), ShardFailurePolicy::default());
        f.manager.start().unwrap();
        f.manager.set(pulse(5), true).unwrap();

        assert!(matches!(
            f.manager.set(pulse(3), true).unwrap_err(),
            PulseManagerErr::Storage(StorageErr::BadPulse)
        ));
        // No stray node snapshot for the rejected pulse.
        assert!(matches!(
            f.nodes.active_nodes(3).unwrap_err(),
            StorageErr::NotFound
        ));
    }

    #[test]
    fn heavy_sync_enqueues_sealed_jets() {
        let mut opts = options();
        opts.enable_sync = true;
        opts.sync_message_limit = 10;
        let f = fixture(opts, ShardFailurePolicy::default());
        f.manager.start().unwrap();

        let objects = ObjectStorage::new(f.db.clone());
        objects
            .set_record(
                &JetId::root(),
                0,
                &Record::Activate {
                    memory: vec![4; 8],
                },
            )
            .unwrap();

        f.manager.set(pulse(1), true).unwrap();
        f.manager.stop();

        let sent = f.bus.sent.lock();
        let replicated: Vec<_> = sent
            .iter()
            .filter(|(msg, _)| matches!(msg, LedgerMessage::HeavyPayload { .. }))
            .collect();
        assert_eq!(replicated.len(), 1);
    }

    #[test]
    fn tree_generations_beyond_light_window_are_evicted() {
        let mut opts = options();
        opts.light_chain_limit = 1;
        let f = fixture(opts, ShardFailurePolicy::default());
        f.manager.start().unwrap();
        f.manager
            .jets()
            .split_jet_tree(0, &JetId::root())
            .unwrap();

        let id = ObjectId::new(0, Hash256([0xff; 32]));

        f.manager.set(pulse(1), true).unwrap();
        // Still inside the window: generation 0 keeps its split.
        assert_eq!(f.manager.jets().find_jet(0, &id).0.depth, 1);

        f.manager.set(pulse(2), true).unwrap();
        // Generation 0 aged out; routing it now yields a fresh root tree.
        assert_eq!(f.manager.jets().find_jet(0, &id).0, JetId::root());
    }

    #[test]
    fn startup_restores_working_set_within_window() {
        let f = fixture(options(), ShardFailurePolicy::default());

        let objects = ObjectStorage::new(f.db.clone());
        let fresh = ObjectId::new(0, Hash256([1; 32]));
        let state = ObjectId::new(0, Hash256([2; 32]));
        objects
            .set_object_index(&JetId::root(), &fresh, &Lifeline::activated(state, 0))
            .unwrap();

        f.manager.start().unwrap();
        let restored = f.manager.recent_storage(&JetId::root()).get_objects();
        assert!(restored.contains_key(&fresh));
    }
}
