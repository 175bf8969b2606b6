// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::drops::{DropSize, JetDrop};
use crate::primitives::{JetId, NodeRef, ObjectId, PulseNumber, RecordId};
use crate::pulse::Pulse;
use bincode::{Decode, Encode};
use std::collections::HashMap;

/// A recently touched object index as carried in a hot-data payload. The
/// index itself travels serialized so receivers on newer schema versions
/// can decode what they understand.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone)]
pub struct HotIndex {
    pub ttl: u32,
    pub index: Vec<u8>,
}

/// The hot-data handoff payload: everything the next window's executor
/// needs to keep serving a jet without a cold start. A receiver finding an
/// object in `recent_objects` that is absent from local storage must fetch
/// it from the previous owner, not treat it as nonexistent.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone)]
pub struct HotData {
    /// Jet the drop was sealed for.
    pub drop_jet: JetId,
    /// Jet this payload is addressed to (differs from `drop_jet` right
    /// after a split).
    pub jet: JetId,
    pub pulse: PulseNumber,
    pub drop: JetDrop,
    pub recent_objects: HashMap<ObjectId, HotIndex>,
    pub pending_requests: HashMap<ObjectId, HashMap<RecordId, Vec<u8>>>,
    pub drop_size_history: Vec<DropSize>,
}

/// Messages the ledger core sends through the bus.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone)]
pub enum LedgerMessage {
    /// Hot working set handed to the next executor.
    HotData(HotData),

    /// Sealed drop broadcast for validation.
    JetDropNotification {
        jet: JetId,
        pulse: PulseNumber,
        drop: Vec<u8>,
        messages: Vec<Vec<u8>>,
    },

    /// Batch of sealed records replicated to heavy storage.
    HeavyPayload {
        jet: JetId,
        pulse: PulseNumber,
        records: Vec<(Vec<u8>, Vec<u8>)>,
    },

    /// Jet tree snapshot replicated to heavy storage.
    HeavyJetTree { pulse: PulseNumber, tree: Vec<u8> },
}

/// Options for a bus send; `receiver` pins the destination node instead of
/// letting the bus route by role.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct SendOptions {
    pub receiver: Option<NodeRef>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Reply {
    Ok,
    Error(String),
}

#[derive(Debug)]
pub enum BusErr {
    /// Send failed or timed out
    Transport(String),

    /// The bus is shutting down
    Closed,
}

/// The message-bus collaborator. Synchronous request/reply; connection
/// management and wire framing live outside the core.
pub trait MessageBus: Send + Sync {
    fn send(&self, message: LedgerMessage, options: SendOptions) -> Result<Reply, BusErr>;

    /// Notifies downstream subsystems that the pulse advanced.
    fn on_pulse(&self, pulse: Pulse) -> Result<(), BusErr>;
}
