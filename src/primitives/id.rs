// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::Hash256;
use bincode::{Decode, Encode};
use std::fmt;

/// Logical time-window number. Monotonic and gap-tolerant; ordering is what
/// matters, not density.
pub type PulseNumber = u32;

/// The sentinel genesis pulse. Never deleted, fixed entropy.
pub const GENESIS_PULSE_NUMBER: PulseNumber = 0;

pub const ENTROPY_SIZE: usize = 64;

/// Fresh randomness delivered with every pulse, reseeding deterministic
/// role assignment.
#[derive(PartialEq, Eq, Encode, Decode, Clone, Copy)]
pub struct Entropy(pub [u8; ENTROPY_SIZE]);

impl Entropy {
    #[must_use]
    pub fn zero() -> Self {
        Self([0; ENTROPY_SIZE])
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entropy({})", hex::encode(&self.0[..8]))
    }
}

/// Identifier of a stored object or record. The hash part is content
/// derived for records, so re-insertion under the same id is detectable.
#[derive(PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Clone, Copy, Hash, Default)]
pub struct ObjectId {
    pub pulse: PulseNumber,
    pub hash: Hash256,
}

/// Records share the id shape with objects.
pub type RecordId = ObjectId;

impl ObjectId {
    #[must_use]
    pub fn new(pulse: PulseNumber, hash: Hash256) -> Self {
        Self { pulse, hash }
    }

    /// Bytes used for jet routing and composite storage keys.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32);
        out.extend_from_slice(&self.pulse.to_be_bytes());
        out.extend_from_slice(self.hash.as_bytes());
        out
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pulse, &self.hash.to_hex()[..12])
    }
}

/// Opaque identity of a network node.
#[derive(PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Clone, Copy, Hash, Default)]
pub struct NodeRef(pub [u8; 32]);

impl NodeRef {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", &hex::encode(self.0)[..12])
    }
}

pub const JET_PREFIX_SIZE: usize = 32;

/// Depth travels in a single byte, so the deepest usable prefix is 255 of
/// the 256 identifier bits.
pub const JET_MAX_DEPTH: u8 = u8::MAX;

/// A jet is a bit-string prefix over the object identifier space: `depth`
/// leading bits of `prefix` are significant, the rest are zero.
#[derive(PartialEq, Eq, PartialOrd, Ord, Encode, Decode, Clone, Copy, Hash)]
pub struct JetId {
    pub depth: u8,
    pub prefix: [u8; JET_PREFIX_SIZE],
}

impl JetId {
    /// Builds a jet id, masking out any bits beyond `depth` so that equal
    /// prefixes always compare equal.
    #[must_use]
    pub fn new(depth: u8, prefix_bits: &[u8]) -> Self {
        let mut prefix = [0u8; JET_PREFIX_SIZE];
        let n = prefix_bits.len().min(JET_PREFIX_SIZE);
        prefix[..n].copy_from_slice(&prefix_bits[..n]);
        mask_beyond(&mut prefix, depth);
        Self { depth, prefix }
    }

    /// The root jet covering the whole identifier space.
    #[must_use]
    pub fn root() -> Self {
        Self::new(0, &[])
    }

    /// Parent jet, one bit shorter. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        if self.depth == 0 {
            return *self;
        }
        Self::new(self.depth - 1, &self.prefix)
    }

    /// Child jets extending this prefix by a `0` and a `1` bit.
    #[must_use]
    pub fn children(&self) -> (Self, Self) {
        debug_assert!(self.depth < JET_MAX_DEPTH);
        let left = Self::new(self.depth + 1, &self.prefix);
        let mut right_prefix = self.prefix;
        set_bit(&mut right_prefix, self.depth);
        let right = Self::new(self.depth + 1, &right_prefix);
        (left, right)
    }

    /// Value of the prefix bit at position `i` (big-endian bit order).
    #[must_use]
    pub fn bit(&self, i: u8) -> bool {
        bit_at(&self.prefix, i)
    }

    /// True when `id` routes into this jet's prefix.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        (0..self.depth).all(|i| bit_at(&id.hash.0, i) == self.bit(i))
    }

    /// Bytes used in composite storage keys: depth byte followed by the
    /// masked prefix.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + JET_PREFIX_SIZE);
        out.push(self.depth);
        out.extend_from_slice(&self.prefix);
        out
    }
}

impl fmt::Debug for JetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[JET {}: ", self.depth)?;
        for i in 0..self.depth {
            write!(f, "{}", u8::from(self.bit(i)))?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for JetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Value of bit `i` in a big-endian bit-addressed byte slice.
#[must_use]
pub fn bit_at(bytes: &[u8], i: u8) -> bool {
    let byte = (i / 8) as usize;
    if byte >= bytes.len() {
        return false;
    }
    bytes[byte] & (0x80 >> (i % 8)) != 0
}

fn set_bit(bytes: &mut [u8], i: u8) {
    let byte = (i / 8) as usize;
    bytes[byte] |= 0x80 >> (i % 8);
}

fn mask_beyond(bytes: &mut [u8], depth: u8) {
    let full_bytes = (depth / 8) as usize;
    let rem = depth % 8;
    if full_bytes < bytes.len() && rem != 0 {
        bytes[full_bytes] &= !(0xffu8 >> rem);
    }
    let start = if rem == 0 { full_bytes } else { full_bytes + 1 };
    for b in bytes.iter_mut().skip(start) {
        *b = 0;
    }
}
