//! Managed room record: kind, lineage, owner, grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{GrantId, GroupId, RoomId, UserId};

/// Kind of a managed room, fixed at creation time.
///
/// The kind decides the default visibility policy and whether the room
/// carries an owner at all:
/// - `Public`: base role can view and connect; never has an owner.
/// - `Personal`: base role can view and connect; owner may override.
/// - `Private`: base role denied view; owner may grant exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Public,
    Personal,
    Private,
}

impl RoomKind {
    /// Does this kind carry an owner (and therefore a temporary grant)?
    pub fn is_owned(self) -> bool {
        matches!(self, RoomKind::Personal | RoomKind::Private)
    }
}

impl std::fmt::Display for RoomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RoomKind::Public => "public",
            RoomKind::Personal => "personal",
            RoomKind::Private => "private",
        };
        f.write_str(s)
    }
}

/// A room created and tracked by the lifecycle manager.
///
/// Design:
/// - This is the "single source of truth" for a room's owner/grant state.
/// - The ledger owns these records; everything else works on clones.
/// - Invariant: `kind == Public` implies `owner == None` for the whole life
///   of the record, and `grant.is_some() == owner.is_some()` always; both
///   fields change in the same ledger commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRoom {
    pub id: RoomId,

    /// Kind copied from the source descriptor at creation time.
    pub kind: RoomKind,

    /// The trigger room this room was created from.
    pub trigger: RoomId,

    /// The group the room was created under (resolved at creation time).
    pub group: GroupId,

    /// Current owner. Always `None` for `Public` rooms.
    pub owner: Option<UserId>,

    /// The temporary grant bound to the current owner, if any.
    pub grant: Option<GrantId>,

    pub created_at: DateTime<Utc>,
}

impl ManagedRoom {
    pub fn new(
        id: RoomId,
        kind: RoomKind,
        trigger: RoomId,
        group: GroupId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            trigger,
            group,
            owner: None,
            grant: None,
            created_at,
        }
    }

    /// Set owner and grant together (same commit, keeps the iff invariant).
    pub fn assign_owner(&mut self, owner: UserId, grant: GrantId) {
        debug_assert!(self.kind.is_owned());
        self.owner = Some(owner);
        self.grant = Some(grant);
    }

    /// Clear owner and grant together.
    pub fn clear_owner(&mut self) {
        self.owner = None;
        self.grant = None;
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }
}
