// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

mod tracker;

pub use tracker::{PulseTracker, PulseTrackerMemory, StoredPulse};

use crate::primitives::{Entropy, PulseNumber, GENESIS_PULSE_NUMBER};
use bincode::{Decode, Encode};
use parking_lot::RwLock;
use rand::RngCore;

/// A platform-wide time-window marker delivered by the external pulse
/// source.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Copy)]
pub struct Pulse {
    pub number: PulseNumber,
    pub entropy: Entropy,
    /// Unix epoch seconds at which the pulse was produced.
    pub epoch: i64,
}

impl Pulse {
    #[must_use]
    pub fn new(number: PulseNumber, entropy: Entropy) -> Self {
        Self {
            number,
            entropy,
            epoch: chrono::Utc::now().timestamp(),
        }
    }

    /// The genesis sentinel: pulse 0 with fixed entropy.
    #[must_use]
    pub fn genesis() -> Self {
        Self {
            number: GENESIS_PULSE_NUMBER,
            entropy: Entropy::zero(),
            epoch: 0,
        }
    }
}

/// Generates the fresh per-pulse randomness. The production source runs on
/// the pulsar side; nodes only consume the result.
pub trait EntropyGenerator {
    fn generate(&self) -> Entropy;
}

/// OS randomness backed generator.
#[derive(Default)]
pub struct StandardEntropyGenerator;

impl EntropyGenerator for StandardEntropyGenerator {
    fn generate(&self) -> Entropy {
        let mut entropy = Entropy::zero();
        rand::thread_rng().fill_bytes(&mut entropy.0);
        entropy
    }
}

/// The node's in-memory "current pulse" cell. Owned by the cluster state
/// and injected where needed; never a package-level global.
pub struct PulseStorage {
    current: RwLock<Pulse>,
}

impl PulseStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Pulse::genesis()),
        }
    }

    #[must_use]
    pub fn current(&self) -> Pulse {
        *self.current.read()
    }

    pub fn set(&self, pulse: Pulse) {
        *self.current.write() = pulse;
    }
}

impl Default for PulseStorage {
    fn default() -> Self {
        Self::new()
    }
}
