// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::message::{LedgerMessage, MessageBus, SendOptions};
use crate::primitives::{JetId, PulseNumber};
use crate::storage::{self, KvStorage};
use crossbeam_channel::{unbounded, Sender};
use log::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One unit of background replication: every record sealed for `jet`
/// during `pulse` is shipped to heavy storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncJob {
    pub jet: JetId,
    pub pulse: PulseNumber,
}

#[derive(Debug)]
pub enum SyncErr {
    /// The pool is not running
    NotStarted,
}

/// Background replication queue. Jobs are enqueued by the pulse
/// orchestrator after a drop seals and drained by a single worker so
/// replication never blocks a pulse transition. A failed job is logged
/// and dropped; the heavy holder re-requests missing ranges on its own.
pub struct HeavySyncPool<DB: KvStorage> {
    db: Arc<DB>,
    bus: Arc<dyn MessageBus>,
    message_limit: usize,
    sender: Mutex<Option<Sender<SyncJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<DB: KvStorage + 'static> HeavySyncPool<DB> {
    pub fn new(db: Arc<DB>, bus: Arc<dyn MessageBus>, message_limit: usize) -> Self {
        Self {
            db,
            bus,
            message_limit,
            sender: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the worker. Idempotent.
    pub fn start(&self) {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return;
        }
        let (tx, rx) = unbounded::<SyncJob>();
        *sender = Some(tx);

        let db = self.db.clone();
        let bus = self.bus.clone();
        let message_limit = self.message_limit;
        let handle = thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                if let Err(err) = Self::replicate(&db, bus.as_ref(), message_limit, job) {
                    warn!(
                        "heavy sync failed for jet {:?} pulse {}: {}",
                        job.jet, job.pulse, err
                    );
                }
            }
        });
        *self.worker.lock() = Some(handle);
    }

    /// Queues a replication job.
    pub fn enqueue(&self, job: SyncJob) -> Result<(), SyncErr> {
        match self.sender.lock().as_ref() {
            Some(tx) => {
                // Unbounded channel, send only fails once the worker side
                // is gone.
                tx.send(job).map_err(|_| SyncErr::NotStarted)
            }
            None => Err(SyncErr::NotStarted),
        }
    }

    /// Closes the queue and blocks until every queued job has been
    /// drained. Idempotent.
    pub fn stop(&self) {
        self.sender.lock().take();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("heavy sync worker panicked");
            }
        }
    }

    fn replicate(
        db: &Arc<DB>,
        bus: &dyn MessageBus,
        message_limit: usize,
        job: SyncJob,
    ) -> Result<(), String> {
        let mut records: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        db.iterate(
            &storage::records_prefix(&job.jet, job.pulse),
            &mut |key, value| {
                records.push((key.to_vec(), value.to_vec()));
                Ok(())
            },
        )
        .map_err(|err| format!("{err:?}"))?;

        for batch in records.chunks(message_limit.max(1)) {
            let message = LedgerMessage::HeavyPayload {
                jet: job.jet,
                pulse: job.pulse,
                records: batch.to_vec(),
            };
            bus.send(message, SendOptions::default())
                .map_err(|err| format!("{err:?}"))?;
        }
        debug!(
            "replicated {} records for jet {:?} pulse {}",
            records.len(),
            job.jet,
            job.pulse
        );
        Ok(())
    }
}

impl<DB: KvStorage> Drop for HeavySyncPool<DB> {
    fn drop(&mut self) {
        self.sender.lock().take();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}
