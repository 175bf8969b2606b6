// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::Hash256;
use bincode::{Decode, Encode};
use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;

/// Opaque signature bytes produced by the platform scheme.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Default)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Incremental hasher handed out by a [`CryptoScheme`].
pub trait Hasher {
    fn write(&mut self, bytes: &[u8]);
    fn finish(&mut self) -> Hash256;
}

/// Injectable cryptography seam. The core never names algorithms; it asks
/// the scheme for a reference hasher (record and drop hashing), an
/// integrity hasher plus signing (drop-size attestations) and verification.
pub trait CryptoScheme: Send + Sync {
    fn reference_hasher(&self) -> Box<dyn Hasher>;
    fn integrity_hasher(&self) -> Box<dyn Hasher>;
    fn sign(&self, data: &[u8]) -> Signature;
    fn verify(&self, signature: &Signature, data: &[u8]) -> bool;
}

/// Default platform scheme: blake3 for reference hashing, blake2b for
/// integrity hashing, keyed blake3 as a MAC-style signature.
pub struct PlatformScheme {
    signing_key: [u8; 32],
}

impl PlatformScheme {
    #[must_use]
    pub fn new(signing_key: [u8; 32]) -> Self {
        Self { signing_key }
    }
}

impl Default for PlatformScheme {
    fn default() -> Self {
        Self::new([0; 32])
    }
}

struct ReferenceHasher(blake3::Hasher);

impl Hasher for ReferenceHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&mut self) -> Hash256 {
        Hash256(*self.0.finalize().as_bytes())
    }
}

struct IntegrityHasher(Vec<u8>);

impl Hasher for IntegrityHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn finish(&mut self) -> Hash256 {
        let mut hasher = Blake2bVar::new(32).unwrap();
        hasher.update(&self.0);
        let mut out = [0u8; 32];
        hasher.finalize_variable(&mut out).unwrap();
        Hash256(out)
    }
}

impl CryptoScheme for PlatformScheme {
    fn reference_hasher(&self) -> Box<dyn Hasher> {
        Box::new(ReferenceHasher(blake3::Hasher::new_derive_key(
            "jetledger.reference",
        )))
    }

    fn integrity_hasher(&self) -> Box<dyn Hasher> {
        Box::new(IntegrityHasher(Vec::new()))
    }

    fn sign(&self, data: &[u8]) -> Signature {
        let mut hasher = blake3::Hasher::new_keyed(&self.signing_key);
        hasher.update(data);
        Signature(hasher.finalize().as_bytes().to_vec())
    }

    fn verify(&self, signature: &Signature, data: &[u8]) -> bool {
        self.sign(data) == *signature
    }
}
