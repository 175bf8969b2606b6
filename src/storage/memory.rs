// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::storage::{KvStorage, StorageErr};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Ordered in-memory backend. One composite keyspace, mirroring how the
/// durable engine is keyed, instead of tiered jet/pulse/object maps.
#[derive(Default)]
pub struct MemoryStorage {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStorage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageErr> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageErr> {
        self.map.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageErr> {
        self.map.write().remove(key);
        Ok(())
    }

    fn iterate(
        &self,
        prefix: &[u8],
        handler: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StorageErr>,
    ) -> Result<(), StorageErr> {
        // Snapshot matching pairs first so the handler may call back into
        // storage without holding the map lock.
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .map
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (k, v) in &snapshot {
            handler(k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterate_visits_only_prefix_in_order() {
        let db = MemoryStorage::new();
        db.set(vec![1, 2], b"b".to_vec()).unwrap();
        db.set(vec![1, 1], b"a".to_vec()).unwrap();
        db.set(vec![2, 0], b"c".to_vec()).unwrap();

        let mut seen = Vec::new();
        db.iterate(&[1], &mut |k, v| {
            seen.push((k.to_vec(), v.to_vec()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (vec![1, 1], b"a".to_vec()),
                (vec![1, 2], b"b".to_vec()),
            ]
        );
    }

    #[test]
    fn handler_may_reenter_storage() {
        let db = MemoryStorage::new();
        db.set(vec![1, 1], b"a".to_vec()).unwrap();
        db.iterate(&[1], &mut |k, _| {
            db.delete(k)?;
            Ok(())
        })
        .unwrap();
        assert!(db.get(&[1, 1]).unwrap().is_none());
    }
}
