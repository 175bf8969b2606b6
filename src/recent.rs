// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{JetId, ObjectId, RecordId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A pending request entry. Active entries represent requests still
/// awaiting execution on this node; inactive ones the node merely knows
/// about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingContext {
    pub active: bool,
}

#[derive(Default)]
struct WorkingSet {
    /// Recently touched object indexes with their time-to-live counters.
    objects: HashMap<ObjectId, u32>,
    /// Pending requests per object.
    requests: HashMap<ObjectId, HashMap<RecordId, PendingContext>>,
}

/// Per-jet working set: the hot, not-yet-sealed data handed to the next
/// window's executor. One lock guards both maps; every check-then-delete
/// goes through [`RecentStorage::filter_not_exist_with_lock`] so cleanup
/// cannot race index creation.
pub struct RecentStorage {
    inner: Mutex<WorkingSet>,
    default_ttl: u32,
}

impl RecentStorage {
    #[must_use]
    pub fn new(default_ttl: u32) -> Self {
        Self {
            inner: Mutex::new(WorkingSet::default()),
            default_ttl,
        }
    }

    /// Registers or refreshes a touched object with the default TTL.
    pub fn add_object(&self, id: ObjectId) {
        self.add_object_with_ttl(id, self.default_ttl);
    }

    /// Registers or refreshes a touched object. The counter is replaced,
    /// never accumulated.
    pub fn add_object_with_ttl(&self, id: ObjectId, ttl: u32) {
        self.inner.lock().objects.insert(id, ttl);
    }

    /// Snapshot of the touched-object set for handoff packaging.
    #[must_use]
    pub fn get_objects(&self) -> HashMap<ObjectId, u32> {
        self.inner.lock().objects.clone()
    }

    /// Decrements every TTL counter, saturating at zero.
    pub fn decrement_ttl(&self) {
        let mut inner = self.inner.lock();
        for ttl in inner.objects.values_mut() {
            *ttl = ttl.saturating_sub(1);
        }
    }

    /// Removes objects whose TTL has run out.
    pub fn clear_zero_ttl_objects(&self) {
        self.inner.lock().objects.retain(|_, ttl| *ttl > 0);
    }

    /// Drops the whole working set. Used when a fresh set is adopted after
    /// a handoff.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.objects.clear();
        inner.requests.clear();
    }

    pub fn add_pending_request(&self, object: ObjectId, request: RecordId) {
        self.inner
            .lock()
            .requests
            .entry(object)
            .or_default()
            .entry(request)
            .or_insert(PendingContext { active: false });
    }

    pub fn remove_pending_request(&self, object: ObjectId, request: RecordId) {
        let mut inner = self.inner.lock();
        if let Some(requests) = inner.requests.get_mut(&object) {
            requests.remove(&request);
            if requests.is_empty() {
                inner.requests.remove(&object);
            }
        }
    }

    /// Marks whether pending entries for `object` await execution here.
    pub fn set_context_to_object(&self, object: ObjectId, context: PendingContext) {
        let mut inner = self.inner.lock();
        if let Some(requests) = inner.requests.get_mut(&object) {
            for ctx in requests.values_mut() {
                *ctx = context;
            }
        }
    }

    /// Outstanding request ids for `object`.
    #[must_use]
    pub fn get_requests_for_object(&self, object: ObjectId) -> Vec<RecordId> {
        self.inner
            .lock()
            .requests
            .get(&object)
            .map(|reqs| reqs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Full pending-request snapshot for handoff packaging.
    #[must_use]
    pub fn get_requests(&self) -> HashMap<ObjectId, HashMap<RecordId, PendingContext>> {
        self.inner.lock().requests.clone()
    }

    /// Safe-removal primitive: invokes `f` with the subset of `candidates`
    /// that are not in the working set, while holding the set's lock. An
    /// `add_object` that happened before the lock was taken is therefore
    /// never deleted by `f`.
    pub fn filter_not_exist_with_lock(&self, candidates: &[ObjectId], f: impl FnOnce(&[ObjectId])) {
        let inner = self.inner.lock();
        let known: HashSet<&ObjectId> = inner.objects.keys().collect();
        let filtered: Vec<ObjectId> = candidates
            .iter()
            .filter(|id| !known.contains(id))
            .copied()
            .collect();
        f(&filtered);
    }
}

/// Hands out the per-jet working sets.
pub struct RecentStorageProvider {
    storages: DashMap<JetId, Arc<RecentStorage>>,
    default_ttl: u32,
}

impl RecentStorageProvider {
    #[must_use]
    pub fn new(default_ttl: u32) -> Self {
        Self {
            storages: DashMap::new(),
            default_ttl,
        }
    }

    pub fn get_storage(&self, jet: &JetId) -> Arc<RecentStorage> {
        self.storages
            .entry(*jet)
            .or_insert_with(|| Arc::new(RecentStorage::new(self.default_ttl)))
            .clone()
    }

    /// Re-homes a working set after a split: both children start from a
    /// copy of the parent's set. The parent keeps its own copy until its
    /// TTLs run out.
    pub fn clone_storage(&self, from: &JetId, to: &JetId) {
        let source = self.get_storage(from);
        let target = self.get_storage(to);
        for (id, ttl) in source.get_objects() {
            target.add_object_with_ttl(id, ttl);
        }
        for (object, requests) in source.get_requests() {
            for (request, ctx) in requests {
                target.add_pending_request(object, request);
                target.set_context_to_object(object, ctx);
            }
        }
    }
}
