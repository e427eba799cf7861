//! Room ledger: the authoritative record of every managed room.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::app::status::LedgerCounts;
use crate::domain::errors::AutoroomError;
use crate::domain::ids::{GroupId, RoomId, UserId};
use crate::domain::room::{ManagedRoom, RoomKind};
use crate::domain::source::{BasePolicy, SourceDescriptor, room_name_for};
use crate::ports::clock::Clock;
use crate::ports::platform::{CreateRoom, Platform};

struct LedgerState {
    /// All managed rooms (single source of truth).
    rooms: HashMap<RoomId, ManagedRoom>,
}

/// Authoritative in-memory record of manager-created rooms and their
/// temporary grants.
///
/// Design:
/// - The inner lock guards plain map access and is never held across an
///   await; platform calls happen between short critical sections.
/// - A mutation commits to the map only after the platform confirmed the
///   corresponding call, and re-validates its expectation at commit time;
///   a mismatch is [`AutoroomError::StaleState`].
/// - Callers serialize mutations per room through the controller's room
///   regions; the ledger's own re-validation is the backstop, not the lock.
pub struct RoomLedger {
    platform: Arc<dyn Platform>,
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
}

impl RoomLedger {
    pub fn new(platform: Arc<dyn Platform>, clock: Arc<dyn Clock>) -> Self {
        Self {
            platform,
            clock,
            state: Mutex::new(LedgerState {
                rooms: HashMap::new(),
            }),
        }
    }

    /// Create a room from a descriptor, on behalf of `creator`.
    ///
    /// For `Personal`/`Private` kinds the creator becomes owner and receives
    /// a temporary grant in the same operation. If grant issuance fails the
    /// freshly created platform room is rolled back (best effort) and the
    /// whole creation reports [`AutoroomError::CreationFailed`].
    pub async fn create(
        &self,
        descriptor: &SourceDescriptor,
        group: GroupId,
        base: BasePolicy,
        creator: UserId,
        display_name: &str,
    ) -> Result<ManagedRoom, AutoroomError> {
        let req = CreateRoom {
            name: room_name_for(display_name),
            group,
            visibility: descriptor.kind.visibility(),
            base,
        };
        let room_id = self
            .platform
            .create_room(req)
            .await
            .map_err(|e| AutoroomError::CreationFailed(e.to_string()))?;

        let mut record = ManagedRoom::new(
            room_id,
            descriptor.kind,
            descriptor.trigger,
            group,
            self.clock.now(),
        );

        if descriptor.kind.is_owned() {
            match self.platform.create_grant(room_id, creator).await {
                Ok(grant) => record.assign_owner(creator, grant),
                Err(e) => {
                    // Roll the room back; a failure here leaves an orphan on
                    // the platform but nothing in the ledger.
                    if let Err(del) = self.platform.delete_room(room_id).await {
                        warn!(room = %room_id, error = %del, "rollback delete failed");
                    }
                    return Err(AutoroomError::CreationFailed(e.to_string()));
                }
            }
        }

        let mut state = self.state.lock().unwrap();
        state.rooms.insert(room_id, record.clone());
        Ok(record)
    }

    /// Atomically move ownership (and the grant) to `new_owner`.
    ///
    /// `expected_owner` is the owner the caller observed; if the room changed
    /// underneath, the mutation aborts with `StaleState` and the new grant is
    /// revoked again.
    pub async fn transfer_ownership(
        &self,
        room: RoomId,
        expected_owner: Option<UserId>,
        new_owner: UserId,
    ) -> Result<ManagedRoom, AutoroomError> {
        let snapshot = self.get(room).ok_or(AutoroomError::InvalidTransfer(room))?;
        if !snapshot.kind.is_owned() {
            return Err(AutoroomError::InvalidTransfer(room));
        }
        if snapshot.owner != expected_owner {
            return Err(AutoroomError::StaleState(room));
        }

        if let Some(old_grant) = snapshot.grant
            && let Err(e) = self.platform.revoke_grant(old_grant).await
        {
            // Best effort: a dangling platform grant is preferable to a
            // blocked transfer.
            warn!(room = %room, grant = %old_grant, error = %e, "old grant revoke failed");
        }

        let new_grant = self
            .platform
            .create_grant(room, new_owner)
            .await
            .map_err(|e| AutoroomError::CreationFailed(e.to_string()))?;

        let committed = {
            let mut state = self.state.lock().unwrap();
            match state.rooms.get_mut(&room) {
                Some(rec) if rec.owner == expected_owner => {
                    rec.assign_owner(new_owner, new_grant);
                    Some(rec.clone())
                }
                _ => None,
            }
        };

        match committed {
            Some(rec) => Ok(rec),
            None => {
                // Re-validation failed after the suspend; undo the new grant.
                if let Err(e) = self.platform.revoke_grant(new_grant).await {
                    warn!(room = %room, grant = %new_grant, error = %e, "grant undo failed");
                }
                Err(AutoroomError::StaleState(room))
            }
        }
    }

    /// Owner left: revoke the grant and clear the owner, leaving the room
    /// alive. `StaleState` unless `leaver` is the current owner.
    pub async fn clear_ownership(&self, room: RoomId, leaver: UserId) -> Result<(), AutoroomError> {
        let snapshot = self.get(room).ok_or(AutoroomError::StaleState(room))?;
        if snapshot.owner != Some(leaver) {
            return Err(AutoroomError::StaleState(room));
        }

        if let Some(grant) = snapshot.grant
            && let Err(e) = self.platform.revoke_grant(grant).await
        {
            warn!(room = %room, grant = %grant, error = %e, "grant revoke failed");
        }

        let mut state = self.state.lock().unwrap();
        match state.rooms.get_mut(&room) {
            Some(rec) if rec.owner == Some(leaver) => {
                rec.clear_owner();
                Ok(())
            }
            _ => Err(AutoroomError::StaleState(room)),
        }
    }

    /// Delete the room and its grant. Absent records are a no-op success,
    /// which makes the reaper/controller race on deletion harmless.
    ///
    /// If the platform refuses the room delete the record is kept, so the
    /// next sweep retries; nothing is ever marked permanently undeletable.
    pub async fn delete(&self, room: RoomId) -> Result<(), AutoroomError> {
        let Some(snapshot) = self.get(room) else {
            return Ok(());
        };

        if let Some(grant) = snapshot.grant
            && let Err(e) = self.platform.revoke_grant(grant).await
        {
            warn!(room = %room, grant = %grant, error = %e, "grant revoke failed");
        }

        self.platform.delete_room(room).await?;

        let mut state = self.state.lock().unwrap();
        state.rooms.remove(&room);
        Ok(())
    }

    /// Current occupant count, straight from the platform.
    pub async fn occupancy_of(&self, room: RoomId) -> Result<usize, AutoroomError> {
        Ok(self.platform.occupants(room).await?.len())
    }

    pub fn get(&self, room: RoomId) -> Option<ManagedRoom> {
        let state = self.state.lock().unwrap();
        state.rooms.get(&room).cloned()
    }

    /// Snapshot of every managed room.
    pub fn rooms(&self) -> Vec<ManagedRoom> {
        let state = self.state.lock().unwrap();
        state.rooms.values().cloned().collect()
    }

    /// Counts by kind for observability.
    pub fn counts(&self) -> LedgerCounts {
        let state = self.state.lock().unwrap();
        let mut counts = LedgerCounts::default();
        for room in state.rooms.values() {
            counts.total += 1;
            match room.kind {
                RoomKind::Public => counts.public += 1,
                RoomKind::Personal => counts.personal += 1,
                RoomKind::Private => counts.private += 1,
            }
            if room.kind.is_owned() && room.owner.is_none() {
                counts.vacant += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryPlatform;
    use crate::ports::SystemClock;

    fn setup() -> (Arc<InMemoryPlatform>, RoomLedger) {
        let platform = Arc::new(InMemoryPlatform::new());
        let ledger = RoomLedger::new(platform.clone(), Arc::new(SystemClock));
        (platform, ledger)
    }

    fn descriptor(kind: RoomKind) -> SourceDescriptor {
        SourceDescriptor::new(RoomId::new(1), kind, None)
    }

    const GROUP: GroupId = GroupId::new(100);

    #[tokio::test]
    async fn public_room_never_gets_an_owner() {
        let (platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Public),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        assert_eq!(room.kind, RoomKind::Public);
        assert!(room.owner.is_none());
        assert!(room.grant.is_none());
        assert_eq!(platform.grant_count(), 0);
    }

    #[tokio::test]
    async fn owned_room_gets_owner_and_grant_together() {
        let (platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Private),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        assert_eq!(room.owner, Some(UserId::new(7)));
        assert!(room.grant.is_some());
        assert!(platform.grant_exists(room.grant.unwrap()));
    }

    #[tokio::test]
    async fn grant_failure_rolls_back_the_room() {
        let (platform, ledger) = setup();
        platform.fail_next_create_grant();

        let err = ledger
            .create(
                &descriptor(RoomKind::Personal),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AutoroomError::CreationFailed(_)));
        assert!(ledger.rooms().is_empty());
        assert_eq!(platform.grant_count(), 0);
    }

    #[tokio::test]
    async fn transfer_on_public_room_is_invalid() {
        let (_platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Public),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        let err = ledger
            .transfer_ownership(room.id, None, UserId::new(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AutoroomError::InvalidTransfer(_)));
    }

    #[tokio::test]
    async fn transfer_on_missing_room_is_invalid() {
        let (_platform, ledger) = setup();
        let err = ledger
            .transfer_ownership(RoomId::new(404), None, UserId::new(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AutoroomError::InvalidTransfer(_)));
    }

    #[tokio::test]
    async fn transfer_replaces_owner_and_grant() {
        let (platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Private),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();
        let old_grant = room.grant.unwrap();

        let updated = ledger
            .transfer_ownership(room.id, Some(UserId::new(7)), UserId::new(8))
            .await
            .unwrap();

        assert_eq!(updated.owner, Some(UserId::new(8)));
        assert_ne!(updated.grant, Some(old_grant));
        assert!(!platform.grant_exists(old_grant));
        assert!(platform.grant_exists(updated.grant.unwrap()));
        assert_eq!(platform.grant_count(), 1);
    }

    #[tokio::test]
    async fn transfer_with_stale_expectation_is_rejected() {
        let (platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Private),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        // Caller believed the room was vacant; it is not.
        let err = ledger
            .transfer_ownership(room.id, None, UserId::new(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AutoroomError::StaleState(_)));

        // Owner unchanged, still exactly one grant.
        assert_eq!(ledger.get(room.id).unwrap().owner, Some(UserId::new(7)));
        assert_eq!(platform.grant_count(), 1);
    }

    #[tokio::test]
    async fn clear_ownership_revokes_grant_and_keeps_room() {
        let (platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Personal),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        ledger.clear_ownership(room.id, UserId::new(7)).await.unwrap();

        let rec = ledger.get(room.id).unwrap();
        assert!(rec.owner.is_none());
        assert!(rec.grant.is_none());
        assert_eq!(platform.grant_count(), 0);
        assert!(platform.room_exists(room.id));
    }

    #[tokio::test]
    async fn clear_ownership_by_non_owner_is_stale() {
        let (_platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Personal),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        let err = ledger
            .clear_ownership(room.id, UserId::new(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AutoroomError::StaleState(_)));
        assert_eq!(ledger.get(room.id).unwrap().owner, Some(UserId::new(7)));
    }

    #[tokio::test]
    async fn delete_removes_room_and_grant_and_is_idempotent() {
        let (platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Private),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        ledger.delete(room.id).await.unwrap();
        assert!(ledger.get(room.id).is_none());
        assert!(!platform.room_exists(room.id));
        assert_eq!(platform.grant_count(), 0);

        // Second delete is a no-op success.
        ledger.delete(room.id).await.unwrap();
    }

    #[tokio::test]
    async fn failed_platform_delete_keeps_the_record_for_retry() {
        let (platform, ledger) = setup();
        let room = ledger
            .create(
                &descriptor(RoomKind::Public),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(7),
                "Ada",
            )
            .await
            .unwrap();

        platform.fail_next_delete_room();
        assert!(ledger.delete(room.id).await.is_err());
        assert!(ledger.get(room.id).is_some());

        // Next attempt succeeds and clears the record.
        ledger.delete(room.id).await.unwrap();
        assert!(ledger.get(room.id).is_none());
    }

    #[tokio::test]
    async fn counts_reflect_kinds_and_vacancy() {
        let (_platform, ledger) = setup();
        ledger
            .create(
                &descriptor(RoomKind::Public),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(1),
                "a",
            )
            .await
            .unwrap();
        let private = ledger
            .create(
                &descriptor(RoomKind::Private),
                GROUP,
                BasePolicy::Everyone,
                UserId::new(2),
                "b",
            )
            .await
            .unwrap();
        ledger
            .clear_ownership(private.id, UserId::new(2))
            .await
            .unwrap();

        let counts = ledger.counts();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.public, 1);
        assert_eq!(counts.private, 1);
        assert_eq!(counts.vacant, 1);
    }
}
