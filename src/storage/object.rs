// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::codec;
use crate::primitives::{Hash256, JetId, ObjectId, PulseNumber, RecordId};
use crate::storage::{self, KvStorage, StorageErr};
use bincode::{Decode, Encode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Ledger record. Records are write-once: the id is derived from content,
/// re-insertion under the same id is a conflict.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone)]
pub enum Record {
    /// Incoming request awaiting execution
    Request { object: ObjectId, payload: Vec<u8> },

    /// First state of an object
    Activate { memory: Vec<u8> },

    /// State update
    Amend {
        memory: Vec<u8>,
        prev_state: RecordId,
    },

    /// Object retired
    Deactivate { prev_state: RecordId },

    /// Result closing a pending request
    Result {
        request: RecordId,
        payload: Vec<u8>,
    },
}

/// Lifecycle tag tracked on an object index.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Copy)]
pub enum LifelineState {
    Activated,
    Amended,
    Deactivated,
}

/// Per-object index: the only mutable record class. `latest_update_pulse`
/// only moves forward; mutations are serialized per id by [`IdLocker`].
#[derive(Debug, PartialEq, Encode, Decode, Clone)]
pub struct Lifeline {
    pub latest_state: RecordId,
    pub latest_update_pulse: PulseNumber,
    pub child_pointer: Option<RecordId>,
    pub delegates: HashMap<Hash256, ObjectId>,
    pub state: LifelineState,
}

impl Lifeline {
    #[must_use]
    pub fn activated(state: RecordId, pulse: PulseNumber) -> Self {
        Self {
            latest_state: state,
            latest_update_pulse: pulse,
            child_pointer: None,
            delegates: HashMap::new(),
            state: LifelineState::Activated,
        }
    }
}

/// Serializes read-modify-write cycles per object id.
#[derive(Default)]
pub struct IdLocker {
    locks: Mutex<HashMap<ObjectId, Arc<Mutex<()>>>>,
}

impl IdLocker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, id: &ObjectId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(*id).or_default().clone()
    }

    /// Runs `f` while holding the lock for `id`.
    pub fn with_lock<R>(&self, id: &ObjectId, f: impl FnOnce() -> R) -> R {
        let mutex = self.mutex_for(id);
        let _guard = mutex.lock();
        f()
    }
}

/// Record and object-index storage over the key-value seam.
pub struct ObjectStorage<DB: KvStorage> {
    db: Arc<DB>,
    id_locker: IdLocker,
}

impl<DB: KvStorage> ObjectStorage<DB> {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            id_locker: IdLocker::new(),
        }
    }

    /// Persists a record under its content-derived id. Records are
    /// write-once; an existing id is a conflict, never an overwrite.
    pub fn set_record(
        &self,
        jet: &JetId,
        pulse: PulseNumber,
        record: &Record,
    ) -> Result<RecordId, StorageErr> {
        let serialized = codec::encode_to_vec(record)?;
        let id = RecordId::new(pulse, Hash256::hash_from_slice(&serialized, "record"));
        let key = storage::record_key(jet, &id);
        if self.db.get(&key)?.is_some() {
            return Err(StorageErr::Override);
        }
        self.db.set(key, serialized)?;
        Ok(id)
    }

    pub fn get_record(&self, jet: &JetId, id: &RecordId) -> Result<Record, StorageErr> {
        let bytes = self
            .db
            .get(&storage::record_key(jet, id))?
            .ok_or(StorageErr::NotFound)?;
        Ok(codec::decode(&bytes)?)
    }

    pub fn get_object_index(&self, jet: &JetId, id: &ObjectId) -> Result<Lifeline, StorageErr> {
        let bytes = self
            .db
            .get(&storage::index_key(jet, id))?
            .ok_or(StorageErr::NotFound)?;
        Ok(codec::decode(&bytes)?)
    }

    pub fn set_object_index(
        &self,
        jet: &JetId,
        id: &ObjectId,
        index: &Lifeline,
    ) -> Result<(), StorageErr> {
        let serialized = codec::encode_to_vec(index)?;
        self.db.set(storage::index_key(jet, id), serialized)
    }

    /// Read-modify-write of an object index under the per-id lock. Rejects
    /// updates that would move `latest_update_pulse` backwards.
    pub fn update_object_index(
        &self,
        jet: &JetId,
        id: &ObjectId,
        f: impl FnOnce(&mut Lifeline) -> Result<(), StorageErr>,
    ) -> Result<Lifeline, StorageErr> {
        self.id_locker.with_lock(id, || {
            let mut index = self.get_object_index(jet, id)?;
            let prior_pulse = index.latest_update_pulse;
            f(&mut index)?;
            if index.latest_update_pulse < prior_pulse {
                return Err(StorageErr::BadPulse);
            }
            self.set_object_index(jet, id, &index)?;
            Ok(index)
        })
    }

    /// Enumerates object ids with an index in this jet.
    pub fn iterate_index_ids(
        &self,
        jet: &JetId,
        handler: &mut dyn FnMut(ObjectId) -> Result<(), StorageErr>,
    ) -> Result<(), StorageErr> {
        self.db
            .iterate(&storage::index_prefix(jet), &mut |key, _| {
                let id = storage::object_id_from_key(key).ok_or(StorageErr::CorruptData)?;
                handler(id)
            })
    }

    /// Cleanup-horizon sweep: removes indexes whose object pulse is older
    /// than `until`. Returns the number of removed entries.
    pub fn remove_jet_indexes_until(
        &self,
        jet: &JetId,
        until: PulseNumber,
    ) -> Result<usize, StorageErr> {
        let mut doomed = Vec::new();
        self.db
            .iterate(&storage::index_prefix(jet), &mut |key, _| {
                let id = storage::object_id_from_key(key).ok_or(StorageErr::CorruptData)?;
                if id.pulse < until {
                    doomed.push(key.to_vec());
                }
                Ok(())
            })?;
        let removed = doomed.len();
        for key in doomed {
            self.db.delete(&key)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn make_storage() -> ObjectStorage<MemoryStorage> {
        ObjectStorage::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn records_are_write_once() {
        let store = make_storage();
        let jet = JetId::root();
        let rec = Record::Activate {
            memory: vec![1, 2, 3],
        };
        let id = store.set_record(&jet, 1, &rec).unwrap();
        assert_eq!(store.get_record(&jet, &id).unwrap(), rec);

        // Same content, same id: rejected, not silently replaced.
        let err = store.set_record(&jet, 1, &rec).unwrap_err();
        assert!(matches!(err, StorageErr::Override));
    }

    #[test]
    fn index_update_pulse_only_moves_forward() {
        let store = make_storage();
        let jet = JetId::root();
        let id = ObjectId::new(1, Hash256([1; 32]));
        let state = RecordId::new(1, Hash256([2; 32]));
        store
            .set_object_index(&jet, &id, &Lifeline::activated(state, 1))
            .unwrap();

        let updated = store
            .update_object_index(&jet, &id, |idx| {
                idx.latest_update_pulse = 5;
                idx.state = LifelineState::Amended;
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.latest_update_pulse, 5);

        let err = store
            .update_object_index(&jet, &id, |idx| {
                idx.latest_update_pulse = 2;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StorageErr::BadPulse));
    }

    #[test]
    fn iterate_index_ids_sees_all_objects() {
        let store = make_storage();
        let jet = JetId::root();
        for i in 0..4u8 {
            let id = ObjectId::new(u32::from(i), Hash256([i; 32]));
            let state = RecordId::new(u32::from(i), Hash256([i + 100; 32]));
            store
                .set_object_index(&jet, &id, &Lifeline::activated(state, u32::from(i)))
                .unwrap();
        }
        let mut seen = 0;
        store
            .iterate_index_ids(&jet, &mut |_| {
                seen += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, 4);
    }

    #[test]
    fn remove_indexes_until_respects_horizon() {
        let store = make_storage();
        let jet = JetId::root();
        for i in 0..6u8 {
            let id = ObjectId::new(u32::from(i), Hash256([i; 32]));
            let state = RecordId::new(u32::from(i), Hash256([i + 100; 32]));
            store
                .set_object_index(&jet, &id, &Lifeline::activated(state, u32::from(i)))
                .unwrap();
        }
        let removed = store.remove_jet_indexes_until(&jet, 3).unwrap();
        assert_eq!(removed, 3);
        let old = ObjectId::new(0, Hash256([0; 32]));
        assert!(matches!(
            store.get_object_index(&jet, &old).unwrap_err(),
            StorageErr::NotFound
        ));
        let kept = ObjectId::new(3, Hash256([3; 32]));
        assert!(store.get_object_index(&jet, &kept).is_ok());
    }
}
