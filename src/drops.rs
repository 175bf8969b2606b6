// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::codec;
use crate::crypto::{CryptoScheme, Signature};
use crate::primitives::{Hash256, JetId, PulseNumber};
use crate::storage::{self, KvStorage, StorageErr};
use bincode::{Decode, Encode};
use std::sync::Arc;

/// Immutable, hash-chained seal of one jet's records for one pulse window.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone)]
pub struct JetDrop {
    pub jet: JetId,
    pub pulse: PulseNumber,
    pub prev_hash: Hash256,
    pub hash: Hash256,
    pub size: u64,
}

/// Signed attestation of a drop's size, appended to the per-jet history
/// that drives split decisions.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone)]
pub struct DropSize {
    pub jet: JetId,
    pub pulse: PulseNumber,
    pub size: u64,
    pub signature: Signature,
}

impl DropSize {
    /// Bytes covered by the signature.
    #[must_use]
    pub fn hash_data(&self, scheme: &dyn CryptoScheme) -> Hash256 {
        let mut hasher = scheme.integrity_hasher();
        hasher.write(&self.jet.to_bytes());
        hasher.write(&self.pulse.to_be_bytes());
        hasher.write(&self.size.to_be_bytes());
        hasher.finish()
    }
}

/// Drop persistence and the split-threshold bookkeeping.
pub struct DropStorage<DB: KvStorage> {
    db: Arc<DB>,
    scheme: Arc<dyn CryptoScheme>,
    /// How many size-history entries are retained per jet.
    history_depth: usize,
}

impl<DB: KvStorage> DropStorage<DB> {
    pub fn new(db: Arc<DB>, scheme: Arc<dyn CryptoScheme>, history_depth: usize) -> Self {
        Self {
            db,
            scheme,
            history_depth,
        }
    }

    /// Seals the records written for `(jet, pulse)` into a drop chained to
    /// `prev_hash`. Returns the drop, the serialized records it covers and
    /// their total byte size.
    pub fn create_drop(
        &self,
        jet: &JetId,
        pulse: PulseNumber,
        prev_hash: Hash256,
    ) -> Result<(JetDrop, Vec<Vec<u8>>, u64), StorageErr> {
        let mut messages = Vec::new();
        let mut size: u64 = 0;
        let mut hasher = self.scheme.reference_hasher();
        hasher.write(prev_hash.as_bytes());

        self.db
            .iterate(&storage::records_prefix(jet, pulse), &mut |_, value| {
                hasher.write(value);
                size += value.len() as u64;
                messages.push(value.to_vec());
                Ok(())
            })?;

        let drop = JetDrop {
            jet: *jet,
            pulse,
            prev_hash,
            hash: hasher.finish(),
            size,
        };
        Ok((drop, messages, size))
    }

    /// Persists a drop. Exactly one drop exists per (jet, pulse): sealing
    /// the identical drop again succeeds, a divergent one is a conflict
    /// and never silently replaces the first.
    pub fn set_drop(&self, drop: &JetDrop) -> Result<(), StorageErr> {
        let key = storage::drop_key(&drop.jet, drop.pulse);
        let serialized = codec::encode_to_vec(drop)?;
        if let Some(existing) = self.db.get(&key)? {
            if existing == serialized {
                return Ok(());
            }
            return Err(StorageErr::Override);
        }
        self.db.set(key, serialized)
    }

    pub fn get_drop(&self, jet: &JetId, pulse: PulseNumber) -> Result<JetDrop, StorageErr> {
        let bytes = self
            .db
            .get(&storage::drop_key(jet, pulse))?
            .ok_or(StorageErr::NotFound)?;
        Ok(codec::decode(&bytes)?)
    }

    /// Signs and appends a size entry, trimming the history to the
    /// configured depth.
    pub fn add_drop_size(&self, jet: &JetId, pulse: PulseNumber, size: u64) -> Result<(), StorageErr> {
        let mut entry = DropSize {
            jet: *jet,
            pulse,
            size,
            signature: Signature::default(),
        };
        let digest = entry.hash_data(self.scheme.as_ref());
        entry.signature = self.scheme.sign(digest.as_bytes());

        let key = storage::drop_size_key(jet);
        let mut history: Vec<DropSize> = match self.db.get(&key)? {
            Some(bytes) => codec::decode(&bytes)?,
            None => Vec::new(),
        };
        history.push(entry);
        if history.len() > self.history_depth {
            let excess = history.len() - self.history_depth;
            history.drain(..excess);
        }
        self.db.set(key, codec::encode_to_vec(&history)?)
    }

    pub fn get_drop_size_history(&self, jet: &JetId) -> Result<Vec<DropSize>, StorageErr> {
        match self.db.get(&storage::drop_size_key(jet))? {
            Some(bytes) => Ok(codec::decode(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Split triggers only when the history is full and every retained
    /// entry exceeds the byte threshold. One-off spikes never split.
    #[must_use]
    pub fn should_split(&self, history: &[DropSize], threshold: u64) -> bool {
        history.len() >= self.history_depth && history.iter().all(|e| e.size > threshold)
    }
}
