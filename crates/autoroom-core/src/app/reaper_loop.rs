//! Reaper loop: periodic sweep that deletes empty managed rooms.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::claim::ClaimScheduler;
use crate::ledger::RoomLedger;
use crate::lifecycle::RoomLocks;
use crate::ports::Clock;

/// Default sweep period.
pub const DEFAULT_REAP_PERIOD: Duration = Duration::from_secs(30);

/// A room reads as empty between its creation and the moment its creator is
/// moved in; rooms younger than this are left alone.
pub const CREATION_GRACE: Duration = Duration::from_secs(2);

/// The sweep itself, separated from the loop so it can run on demand.
pub struct Reaper {
    ledger: Arc<RoomLedger>,
    scheduler: Arc<ClaimScheduler>,
    locks: Arc<RoomLocks>,
    clock: Arc<dyn Clock>,
    grace: chrono::Duration,
}

impl Reaper {
    pub fn new(
        ledger: Arc<RoomLedger>,
        scheduler: Arc<ClaimScheduler>,
        locks: Arc<RoomLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            scheduler,
            locks,
            clock,
            grace: chrono::Duration::from_std(CREATION_GRACE)
                .unwrap_or_else(|_| chrono::Duration::seconds(2)),
        }
    }

    /// One pass over every managed room: delete the empty ones together
    /// with their grants, cancel their timers. Returns how many rooms were
    /// deleted.
    ///
    /// Rooms still inside [`CREATION_GRACE`] are skipped, so a sweep landing
    /// between a room's creation and the creator's move cannot delete it.
    /// Failures are isolated per room; the sweep continues and the next
    /// tick retries whatever is left.
    pub async fn sweep(&self) -> usize {
        // Surface newly opened claim windows (lazy min-heap poll).
        for timer in self.scheduler.poll_due() {
            debug!(room = %timer.room, previous_owner = %timer.previous_owner, "claim window open");
        }

        let now = self.clock.now();
        let mut deleted = 0;
        for room in self.ledger.rooms() {
            if now.signed_duration_since(room.created_at) < self.grace {
                continue;
            }
            let id = room.id;
            let region = self.locks.lock(id).await;

            let occupancy = match self.ledger.occupancy_of(id).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(room = %id, error = %e, "sweep: occupancy read failed");
                    continue;
                }
            };
            if occupancy > 0 {
                continue;
            }

            match self.ledger.delete(id).await {
                Ok(()) => {
                    self.scheduler.cancel(id);
                    drop(region);
                    self.locks.forget_if_unused(id);
                    deleted += 1;
                    debug!(room = %id, "sweep: deleted empty room");
                }
                Err(e) => {
                    warn!(room = %id, error = %e, "sweep: delete failed, will retry next tick");
                }
            }
        }
        deleted
    }
}

/// Handle to the running reaper loop.
pub struct ReaperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

/// Spawn the periodic sweep.
pub fn spawn(reaper: Reaper, period: Duration) -> ReaperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // 最初の tick は即時に発火するので読み捨てる
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let n = reaper.sweep().await;
                    if n > 0 {
                        debug!(deleted = n, "sweep finished");
                    }
                }
            }
        }
        info!("reaper loop stopped");
    });

    ReaperHandle { shutdown_tx, join }
}
