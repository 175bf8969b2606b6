// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! # Jetledger
//! Core ledger machinery for a permissioned distributed ledger platform that
//! partitions its keyspace into jets (shards) redistributed across nodes on a
//! fixed cadence called a pulse.
//!
//! ## Features
//! * **Jet tree**: per-pulse binary prefix tree mapping object identifiers to
//!   jet ownership, with point lookup, irreversible splits and generational
//!   cloning at every pulse boundary.
//! * **Pulse tracker**: append-only, doubly-linked chain of pulses with dense
//!   serial numbers, used for staleness decisions and history walks.
//! * **Deterministic coordination**: entropy-seeded role assignment that every
//!   node reproduces bit-for-bit without extra communication, plus the
//!   light/heavy storage age threshold (the light chain limit).
//! * **Drop sealing**: each pulse window is sealed per jet into an immutable,
//!   hash-chained drop with signed size history driving split decisions.
//! * **Hot data handoff**: the live working set (recently touched object
//!   indexes and pending requests) is packaged and sent to the next window's
//!   executor on every pulse transition.
//! * **Heavy replication**: an explicit background queue escalates sealed
//!   windows to long-term storage without blocking pulse completion.
//!
//! Contract execution, network transport, cryptographic primitives and the
//! physical key-value engine are consumed through traits and are out of scope
//! for this crate.

pub mod codec;
pub mod coordinator;
pub mod crypto;
pub mod drops;
pub mod jet;
pub mod message;
pub mod nodes;
pub mod primitives;
pub mod pulse;
pub mod pulsemanager;
pub mod recent;
pub mod replication;
pub mod settings;
pub mod storage;

/// Initializes logging at the configured verbosity. Call once, before any
/// other crate entry point.
pub fn init_logging() {
    let level = match settings::SETTINGS.node.verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", level);
    }
    pretty_env_logger::init();
}
