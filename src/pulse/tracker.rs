// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::PulseNumber;
use crate::pulse::Pulse;
use crate::storage::StorageErr;
use bincode::{Decode, Encode};
use log::error;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A pulse as kept by the tracker: the pulse itself plus its position in
/// the doubly-linked chain and its dense serial rank.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Copy)]
pub struct StoredPulse {
    pub pulse: Pulse,
    /// Dense, strictly increasing rank. Serial distance between two pulses
    /// is the age measure used by the light chain limit.
    pub serial: u64,
    pub prev: Option<PulseNumber>,
    pub next: Option<PulseNumber>,
}

/// Append-only chain of pulses.
pub trait PulseTracker: Send + Sync {
    /// Appends a pulse. Fails with [`StorageErr::BadPulse`] unless the
    /// number is strictly greater than the latest known pulse; rejected
    /// pulses leave the chain untouched.
    fn add_pulse(&self, pulse: Pulse) -> Result<(), StorageErr>;

    fn get_pulse(&self, number: PulseNumber) -> Result<StoredPulse, StorageErr>;

    /// Walks the `prev` chain `n` times starting at `from`. Fails with
    /// [`StorageErr::InsufficientHistory`] when the chain is shorter than
    /// `n`.
    fn get_nth_prev_pulse(&self, n: u32, from: PulseNumber) -> Result<StoredPulse, StorageErr>;

    fn get_latest_pulse(&self) -> Result<StoredPulse, StorageErr>;

    /// Best-effort removal for bounded-history retention. Deleting an
    /// absent pulse is logged and ignored.
    fn delete_pulse(&self, number: PulseNumber) -> Result<(), StorageErr>;
}

/// In-memory tracker realization.
#[derive(Default)]
pub struct PulseTrackerMemory {
    inner: RwLock<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    memory: HashMap<PulseNumber, StoredPulse>,
    latest: Option<PulseNumber>,
}

impl PulseTrackerMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackerInner {
    fn get(&self, number: PulseNumber) -> Result<StoredPulse, StorageErr> {
        self.memory.get(&number).copied().ok_or(StorageErr::NotFound)
    }
}

impl PulseTracker for PulseTrackerMemory {
    fn add_pulse(&self, pulse: Pulse) -> Result<(), StorageErr> {
        let mut inner = self.inner.write();

        let (prev, serial) = match inner.latest {
            Some(latest) if pulse.number <= latest => return Err(StorageErr::BadPulse),
            Some(latest) => {
                let prev = inner.get(latest)?;
                (Some(prev), prev.serial + 1)
            }
            None => (None, 1),
        };

        if let Some(mut prev) = prev {
            prev.next = Some(pulse.number);
            inner.memory.insert(prev.pulse.number, prev);
        }

        let number = pulse.number;
        inner.memory.insert(
            number,
            StoredPulse {
                pulse,
                serial,
                prev: prev.map(|p| p.pulse.number),
                next: None,
            },
        );
        inner.latest = Some(number);
        Ok(())
    }

    fn get_pulse(&self, number: PulseNumber) -> Result<StoredPulse, StorageErr> {
        self.inner.read().get(number)
    }

    fn get_nth_prev_pulse(&self, n: u32, from: PulseNumber) -> Result<StoredPulse, StorageErr> {
        let inner = self.inner.read();
        let mut pulse = inner.get(from)?;
        for _ in 0..n {
            let prev = pulse.prev.ok_or(StorageErr::InsufficientHistory)?;
            pulse = inner.get(prev)?;
        }
        Ok(pulse)
    }

    fn get_latest_pulse(&self) -> Result<StoredPulse, StorageErr> {
        let inner = self.inner.read();
        let latest = inner.latest.ok_or(StorageErr::NotFound)?;
        inner.get(latest)
    }

    fn delete_pulse(&self, number: PulseNumber) -> Result<(), StorageErr> {
        let mut inner = self.inner.write();
        if inner.memory.remove(&number).is_none() {
            error!("can't delete non-existing pulse {number}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Entropy;

    fn pulse(number: PulseNumber) -> Pulse {
        Pulse::new(number, Entropy::zero())
    }

    #[test]
    fn add_pulse_links_chain_and_assigns_serials() {
        let tracker = PulseTrackerMemory::new();
        tracker.add_pulse(pulse(0)).unwrap();
        tracker.add_pulse(pulse(1)).unwrap();
        tracker.add_pulse(pulse(5)).unwrap();

        let p0 = tracker.get_pulse(0).unwrap();
        let p1 = tracker.get_pulse(1).unwrap();
        let p5 = tracker.get_pulse(5).unwrap();

        assert_eq!((p0.serial, p1.serial, p5.serial), (1, 2, 3));
        assert_eq!(p0.next, Some(1));
        assert_eq!(p1.prev, Some(0));
        assert_eq!(p1.next, Some(5));
        assert_eq!(p5.prev, Some(1));
        assert_eq!(p5.next, None);
        assert_eq!(tracker.get_latest_pulse().unwrap().pulse.number, 5);
    }

    #[test]
    fn stale_or_duplicate_pulse_is_rejected_without_mutation() {
        let tracker = PulseTrackerMemory::new();
        tracker.add_pulse(pulse(3)).unwrap();
        tracker.add_pulse(pulse(4)).unwrap();

        assert!(matches!(
            tracker.add_pulse(pulse(4)).unwrap_err(),
            StorageErr::BadPulse
        ));
        assert!(matches!(
            tracker.add_pulse(pulse(2)).unwrap_err(),
            StorageErr::BadPulse
        ));

        // Chain untouched by the rejected adds.
        let latest = tracker.get_latest_pulse().unwrap();
        assert_eq!(latest.pulse.number, 4);
        assert_eq!(latest.serial, 2);
        assert_eq!(latest.next, None);
    }

    #[test]
    fn nth_prev_pulse_walks_chain() {
        let tracker = PulseTrackerMemory::new();
        for n in [0, 1, 2] {
            tracker.add_pulse(pulse(n)).unwrap();
        }

        let found = tracker.get_nth_prev_pulse(2, 2).unwrap();
        assert_eq!(found.pulse.number, 0);
    }

    #[test]
    fn nth_prev_pulse_fails_on_short_chain() {
        let tracker = PulseTrackerMemory::new();
        for n in [0, 1, 2] {
            tracker.add_pulse(pulse(n)).unwrap();
        }

        assert!(matches!(
            tracker.get_nth_prev_pulse(3, 2).unwrap_err(),
            StorageErr::InsufficientHistory
        ));
    }

    #[test]
    fn delete_pulse_is_idempotent() {
        let tracker = PulseTrackerMemory::new();
        tracker.add_pulse(pulse(1)).unwrap();
        tracker.delete_pulse(1).unwrap();
        // Second delete logs and succeeds.
        tracker.delete_pulse(1).unwrap();
        assert!(matches!(
            tracker.get_pulse(1).unwrap_err(),
            StorageErr::NotFound
        ));
    }
}
