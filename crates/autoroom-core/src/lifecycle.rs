//! Lifecycle controller: the event-driven orchestrator.
//!
//! One handler per event type. All owner/grant mutations for a room pass
//! through that room's entry in [`RoomLocks`], so a claim and a concurrent
//! owner-leave (or two concurrent claims) cannot both succeed; exactly one
//! wins and the loser observes a stale-state rejection.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::claim::{ClaimOutcome, ClaimScheduler, NotEligibleReason};
use crate::domain::errors::AutoroomError;
use crate::domain::ids::{GroupId, RoomId, UserId};
use crate::domain::room::ManagedRoom;
use crate::ledger::RoomLedger;
use crate::limiter::RateLimiter;
use crate::ports::platform::Platform;
use crate::registry::SourceRegistry;

/// Arena of per-room mutexes: the serialization region for room
/// mutations.
///
/// Waiters keep the inner `Arc` alive, so an entry may only be dropped from
/// the map when nothing else references it.
#[derive(Default)]
pub struct RoomLocks {
    locks: Mutex<HashMap<RoomId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the room's mutual-exclusion region.
    pub async fn lock(&self, room: RoomId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry(room)
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }

    /// Drop the room's entry if no one holds or awaits it (after deletion).
    pub fn forget_if_unused(&self, room: RoomId) {
        let mut locks = self.locks.lock().unwrap();
        if let Some(mutex) = locks.get(&room)
            && Arc::strong_count(mutex) == 1
        {
            locks.remove(&room);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

/// Reacts to join/leave/claim events and drives creation, permission setup,
/// ownership transfer and timer bookkeeping.
pub struct LifecycleController {
    registry: Arc<SourceRegistry>,
    limiter: RateLimiter,
    ledger: Arc<RoomLedger>,
    scheduler: Arc<ClaimScheduler>,
    platform: Arc<dyn Platform>,
    locks: Arc<RoomLocks>,

    /// Users with a creation currently in flight; a second join event from
    /// the same user while the first is still being processed is dropped
    /// instead of creating a duplicate room.
    in_flight: Mutex<HashSet<UserId>>,
}

/// Removes the user from the in-flight set on every exit path.
struct InFlightGuard<'a> {
    controller: &'a LifecycleController,
    user: UserId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.controller
            .in_flight
            .lock()
            .unwrap()
            .remove(&self.user);
    }
}

impl LifecycleController {
    pub fn new(
        registry: Arc<SourceRegistry>,
        limiter: RateLimiter,
        ledger: Arc<RoomLedger>,
        scheduler: Arc<ClaimScheduler>,
        platform: Arc<dyn Platform>,
        locks: Arc<RoomLocks>,
    ) -> Self {
        Self {
            registry,
            limiter,
            ledger,
            scheduler,
            platform,
            locks,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// A member joined a room. Creates a new managed room when the joined
    /// room is a configured trigger.
    ///
    /// Returns the created room, or `None` when the event is not ours to
    /// handle (bot, unconfigured trigger, duplicate in-flight creation).
    pub async fn on_join(
        &self,
        user: UserId,
        room: RoomId,
        group: GroupId,
        display_name: &str,
        is_bot: bool,
    ) -> Result<Option<ManagedRoom>, AutoroomError> {
        if is_bot {
            return Ok(None);
        }
        let Some(descriptor) = self.registry.lookup(group, room) else {
            // Not a trigger room: nothing to do, silently.
            return Ok(None);
        };

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(user) {
                debug!(%user, "creation already in flight, dropping duplicate join");
                return Ok(None);
            }
        }
        let _guard = InFlightGuard {
            controller: self,
            user,
        };

        if !self.limiter.admit(user) {
            self.notify(
                user,
                "You're creating rooms too quickly. Wait a moment before creating another one.",
            )
            .await;
            return Err(AutoroomError::RateLimited(user));
        }

        let target_group = descriptor.resolve_group(group);
        let base = self.registry.base_policy(group);
        let record = self
            .ledger
            .create(&descriptor, target_group, base, user, display_name)
            .await?;

        if let Err(e) = self.platform.move_member(user, record.id).await {
            // The room exists and is committed; if the member never arrives
            // the reaper deletes it as empty on the next sweep.
            warn!(%user, room = %record.id, error = %e, "failed to move member into new room");
        }

        Ok(Some(record))
    }

    /// A member left a room. Clears ownership and starts the vacancy timer,
    /// or cancels it when the room emptied out.
    pub async fn on_leave(&self, user: UserId, room: RoomId) -> Result<(), AutoroomError> {
        if self.ledger.get(room).is_none() {
            return Ok(());
        }

        let _region = self.locks.lock(room).await;

        let occupancy = self.ledger.occupancy_of(room).await?;
        if occupancy == 0 {
            // Straight to eligible-for-deletion: never start a timer for an
            // empty room, and cancel any running one in the same region.
            self.scheduler.cancel(room);
            debug!(%room, "room emptied, awaiting sweep");
            return Ok(());
        }

        // Re-read now that we hold the region; the record may have changed
        // while we awaited the occupancy read.
        let Some(record) = self.ledger.get(room) else {
            return Ok(());
        };
        if record.is_owned_by(user) {
            self.ledger.clear_ownership(room, user).await?;
            let timer = self.scheduler.start_vacancy(room, user);
            debug!(%room, %user, eligible_at = %timer.eligible_at, "owner left, vacancy timer started");
        }
        Ok(())
    }

    /// A member asked to claim a vacant room.
    ///
    /// On success returns the room with its new owner. Every rejection
    /// notifies the claimant first and then surfaces as the matching error,
    /// which the dispatcher logs and swallows.
    pub async fn on_claim_request(
        &self,
        user: UserId,
        room: RoomId,
    ) -> Result<ManagedRoom, AutoroomError> {
        if self.ledger.get(room).is_none() {
            self.notify(user, "That room is not managed here.").await;
            return Err(AutoroomError::NoSuchTimer(room));
        }

        let _region = self.locks.lock(room).await;

        let occupants = self.platform.occupants(room).await?;
        match self.scheduler.try_claim(room, user, &occupants) {
            ClaimOutcome::Accepted => {
                let expected = self.ledger.get(room).and_then(|r| r.owner);
                let record = self.ledger.transfer_ownership(room, expected, user).await?;
                // Cancel inside the same region, observed-before any later
                // claim attempt.
                self.scheduler.cancel(room);
                self.notify(user, "The room is yours now.").await;
                Ok(record)
            }
            ClaimOutcome::NotEligible(reason) => {
                let message = match &reason {
                    NotEligibleReason::GracePeriod { remaining_secs } => format!(
                        "You must wait {remaining_secs} more seconds before claiming this room."
                    ),
                    NotEligibleReason::NotPresent => {
                        "You must be in the room to claim it.".to_string()
                    }
                };
                self.notify(user, &message).await;
                Err(AutoroomError::NotEligible {
                    room,
                    reason: reason.to_string(),
                })
            }
            ClaimOutcome::NoSuchTimer => {
                self.notify(user, "This room is not available for claiming.")
                    .await;
                Err(AutoroomError::NoSuchTimer(room))
            }
        }
    }

    /// Best-effort direct notification; delivery failures are only logged.
    async fn notify(&self, user: UserId, message: &str) {
        if let Err(e) = self.platform.notify_user(user, message).await {
            debug!(%user, error = %e, "notification failed");
        }
    }
}
