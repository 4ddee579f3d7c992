mod assignment;
mod capability;
mod conflict;
mod error;
mod extension;
mod mutations;
mod queries;
mod reservations;
mod rotation;
mod status;
mod store;
mod waiting;

pub use assignment::Unassigned;
pub use capability::{can_perform, service_tags, tier_allows, CapabilityTag, TagSet};
pub use conflict::{Commitment, Conflict};
pub(crate) use conflict::validate_service;
pub use error::{EngineError, EntityRef};
pub use extension::AddOnKind;
pub use rotation::{rotation_cmp, rotation_order};
pub use store::DayStore;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::snapshot::{self, Snapshot};

// ── Coalescing snapshot writer ───────────────────────────

pub(super) struct SnapshotWrite {
    snapshot: Snapshot,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the day's snapshot file.
/// 1. Block until the first write request arrives.
/// 2. Drain every request already queued behind it.
/// 3. Write only the newest snapshot (each one supersedes the ones before it).
/// 4. Answer every waiter with the result of that single write.
async fn snapshot_writer_loop(path: PathBuf, mut rx: mpsc::Receiver<SnapshotWrite>) {
    while let Some(SnapshotWrite { snapshot, response }) = rx.recv().await {
        let mut latest = snapshot;
        let mut waiters = vec![response];
        while let Ok(SnapshotWrite { snapshot, response }) = rx.try_recv() {
            latest = snapshot;
            waiters.push(response);
        }

        metrics::histogram!(observability::SNAPSHOT_WRITE_BATCH_SIZE).record(waiters.len() as f64);
        let write_start = std::time::Instant::now();
        let result = snapshot::write(&path, &latest);
        metrics::histogram!(observability::SNAPSHOT_WRITE_DURATION_SECONDS)
            .record(write_start.elapsed().as_secs_f64());

        for tx in waiters {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }
    }
}

/// One operating day: its store, its clock, and its snapshot writer.
///
/// Every mutation takes the store lock, runs to completion, and queues its snapshot
/// before releasing. The lock is FIFO, so operations apply in submission order.
pub struct Engine {
    day: String,
    pub(super) store: Mutex<DayStore>,
    pub(super) clock: Arc<dyn Clock>,
    pub notify: Arc<NotifyHub>,
    snapshot_tx: mpsc::Sender<SnapshotWrite>,
    /// Set when the last snapshot write failed; the ticker retries.
    dirty: AtomicBool,
}

impl Engine {
    /// Open a day, rehydrating from `path` if a snapshot exists there.
    /// `catalog` seeds a fresh day (or a snapshot that carries no services).
    pub fn open(
        day: &str,
        path: &Path,
        catalog: Vec<Service>,
        clock: Arc<dyn Clock>,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let store = match snapshot::load(path)? {
            Some(mut snap) => {
                if snap.services.is_empty() {
                    snap.services = catalog;
                }
                info!(
                    "day {day}: restored {} technicians, {} bookings, {} waiting batches",
                    snap.employees.len(),
                    snap.bookings.len(),
                    snap.waiting.len()
                );
                DayStore::from_snapshot(snap)
            }
            None => DayStore::new(catalog),
        };

        let (snapshot_tx, snapshot_rx) = mpsc::channel(1024);
        tokio::spawn(snapshot_writer_loop(path.to_path_buf(), snapshot_rx));

        Ok(Self {
            day: day.to_string(),
            store: Mutex::new(store),
            clock,
            notify,
            snapshot_tx,
            dirty: AtomicBool::new(false),
        })
    }

    pub fn day(&self) -> &str {
        &self.day
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Nothing left for the ticker: no backlog, no pending reservation, nothing
    /// unsaved, and no command holding the lock.
    pub fn is_idle(&self) -> bool {
        !self.is_dirty()
            && self
                .store
                .try_lock()
                .is_ok_and(|store| store.waiting.is_empty() && store.pending_reservations() == 0)
    }

    /// Queue a snapshot behind every one handed over before it.
    async fn queue_snapshot(
        &self,
        snapshot: Snapshot,
    ) -> Result<oneshot::Receiver<io::Result<()>>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.snapshot_tx
            .send(SnapshotWrite {
                snapshot,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Store("snapshot writer shut down".into()))?;
        Ok(rx)
    }

    /// Best-effort persistence. Memory is already updated; a failed write only marks
    /// the day dirty so the next tick can retry without replaying anything.
    ///
    /// The snapshot is queued while the lock is held, so writes land in mutation order.
    /// The lock is released before the write completes, letting the next mutation queue
    /// behind it and the writer fold both into one file write.
    pub(super) async fn persist(&self, store: MutexGuard<'_, DayStore>) {
        self.record_backlog(&store);
        let queued = self.queue_snapshot(store.to_snapshot()).await;
        drop(store);

        let result = match queued {
            Ok(rx) => rx
                .await
                .map_err(|_| EngineError::Store("snapshot writer dropped response".into()))
                .and_then(|r| r.map_err(|e| EngineError::Store(e.to_string()))),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.dirty.store(false, Ordering::Release),
            Err(e) => {
                warn!("day {}: {e}; will retry", self.day);
                metrics::counter!(observability::SNAPSHOT_FAILURES_TOTAL).increment(1);
                self.dirty.store(true, Ordering::Release);
            }
        }
    }

    /// Fan events out to each technician's channel.
    pub(super) fn publish(&self, events: &[Event]) {
        for event in events {
            self.notify.send(event.technician(), event);
        }
    }

    fn record_backlog(&self, store: &DayStore) {
        metrics::gauge!(observability::WAITING_CUSTOMERS, "day" => self.day.clone())
            .set(f64::from(store.waiting_customers()));
        metrics::gauge!(observability::PENDING_RESERVATIONS, "day" => self.day.clone())
            .set(store.pending_reservations() as f64);
    }
}
