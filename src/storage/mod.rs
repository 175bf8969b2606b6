// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{JetId, ObjectId, PulseNumber};
use bincode::error::{DecodeError as BincodeDecodeErr, EncodeError as BincodeEncodeErr};

pub mod memory;
pub mod object;

pub use memory::MemoryStorage;
pub use object::{IdLocker, Lifeline, LifelineState, ObjectStorage, Record};

#[derive(Debug)]
pub enum StorageErr {
    /// Requested key does not exist
    NotFound,

    /// Key already exists with write-once semantics
    Override,

    /// Pulse number is not greater than the latest known pulse
    BadPulse,

    /// Pulse chain is shorter than the requested walk-back distance
    InsufficientHistory,

    /// Backend data is corrupted
    CorruptData,

    /// Bincode encode error
    BincodeEncode(BincodeEncodeErr),

    /// Bincode decode error
    BincodeDecode(BincodeDecodeErr),

    /// Generic error
    Error(&'static str),
}

impl From<BincodeEncodeErr> for StorageErr {
    fn from(other: BincodeEncodeErr) -> Self {
        Self::BincodeEncode(other)
    }
}

impl From<BincodeDecodeErr> for StorageErr {
    fn from(other: BincodeDecodeErr) -> Self {
        Self::BincodeDecode(other)
    }
}

/// Transactional key-value seam over the physical storage engine. Keys are
/// composite (scope tag, jet prefix, pulse, record id) so that prefix scans
/// enumerate everything for a jet within a pulse.
pub trait KvStorage: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageErr>;
    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageErr>;
    fn delete(&self, key: &[u8]) -> Result<(), StorageErr>;

    /// Invokes `handler` for every key starting with `prefix`, in key order.
    fn iterate(
        &self,
        prefix: &[u8],
        handler: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StorageErr>,
    ) -> Result<(), StorageErr>;
}

/// Key scope tags. A single ordered keyspace holds every record class.
pub mod scope {
    pub const RECORD: u8 = 1;
    pub const INDEX: u8 = 2;
    pub const DROP: u8 = 3;
    pub const DROP_SIZE: u8 = 4;
    pub const JET_LIST: u8 = 5;
    pub const NODE_LIST: u8 = 6;
}

#[must_use]
pub fn record_key(jet: &JetId, id: &ObjectId) -> Vec<u8> {
    let mut key = vec![scope::RECORD];
    key.extend_from_slice(&jet.to_bytes());
    key.extend_from_slice(&id.to_bytes());
    key
}

#[must_use]
pub fn records_prefix(jet: &JetId, pulse: PulseNumber) -> Vec<u8> {
    let mut key = vec![scope::RECORD];
    key.extend_from_slice(&jet.to_bytes());
    key.extend_from_slice(&pulse.to_be_bytes());
    key
}

#[must_use]
pub fn index_key(jet: &JetId, id: &ObjectId) -> Vec<u8> {
    let mut key = vec![scope::INDEX];
    key.extend_from_slice(&jet.to_bytes());
    key.extend_from_slice(&id.to_bytes());
    key
}

#[must_use]
pub fn index_prefix(jet: &JetId) -> Vec<u8> {
    let mut key = vec![scope::INDEX];
    key.extend_from_slice(&jet.to_bytes());
    key
}

#[must_use]
pub fn drop_key(jet: &JetId, pulse: PulseNumber) -> Vec<u8> {
    let mut key = vec![scope::DROP];
    key.extend_from_slice(&jet.to_bytes());
    key.extend_from_slice(&pulse.to_be_bytes());
    key
}

#[must_use]
pub fn drop_size_key(jet: &JetId) -> Vec<u8> {
    let mut key = vec![scope::DROP_SIZE];
    key.extend_from_slice(&jet.to_bytes());
    key
}

#[must_use]
pub fn jet_list_key() -> Vec<u8> {
    vec![scope::JET_LIST]
}

#[must_use]
pub fn node_list_key(pulse: PulseNumber) -> Vec<u8> {
    let mut key = vec![scope::NODE_LIST];
    key.extend_from_slice(&pulse.to_be_bytes());
    key
}

/// Recovers the object id suffix of a record or index key. Scans rely on
/// the id bytes being the key tail.
#[must_use]
pub fn object_id_from_key(key: &[u8]) -> Option<ObjectId> {
    use crate::primitives::Hash256;
    if key.len() < 36 {
        return None;
    }
    let tail = &key[key.len() - 36..];
    let mut pn = [0u8; 4];
    pn.copy_from_slice(&tail[..4]);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&tail[4..]);
    Some(ObjectId::new(PulseNumber::from_be_bytes(pn), Hash256(hash)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Hash256;

    #[test]
    fn record_key_has_pulse_after_jet_for_range_scans() {
        let jet = JetId::root();
        let id = ObjectId::new(7, Hash256([3; 32]));
        let key = record_key(&jet, &id);
        let prefix = records_prefix(&jet, 7);
        assert!(key.starts_with(&prefix));
        let other = records_prefix(&jet, 8);
        assert!(!key.starts_with(&other));
    }

    #[test]
    fn object_id_roundtrips_through_key_tail() {
        let jet = JetId::new(3, &[0b1010_0000]);
        let id = ObjectId::new(12, Hash256([9; 32]));
        let key = index_key(&jet, &id);
        assert_eq!(object_id_from_key(&key), Some(id));
    }
}
