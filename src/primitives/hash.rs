// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use bincode::{Decode, Encode};
use std::fmt;

pub const HASH_KEY_PREFIX: &str = "jetledger.hash";

#[derive(PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Clone, Copy, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn zero() -> Self {
        Self([0; 32])
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Domain-separated hash of an arbitrary slice.
    #[inline]
    pub fn hash_from_slice<T: AsRef<[u8]>>(slice: T, key: &str) -> Self {
        let key = format!("{HASH_KEY_PREFIX}.{key}");
        let mut hasher = blake3::Hasher::new_derive_key(&key);
        hasher.update(slice.as_ref());
        Self(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_from_slice_is_stable() {
        let a = Hash256::hash_from_slice(b"hello", "test");
        let b = Hash256::hash_from_slice(b"hello", "test");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_from_slice_is_domain_separated() {
        let a = Hash256::hash_from_slice(b"hello", "test.a");
        let b = Hash256::hash_from_slice(b"hello", "test.b");
        assert_ne!(a, b);
    }
}
