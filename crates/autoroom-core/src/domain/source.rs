//! Source descriptors: which trigger rooms create which kind of room.

use serde::{Deserialize, Serialize};

use super::ids::{GroupId, RoleId, RoomId};
use super::room::RoomKind;

/// Configuration of one trigger room.
///
/// A join on `trigger` creates a new room of `kind` under `group` (or under
/// the trigger's own group when `group` is `None`). Created rooms copy the
/// kind and the resolved group at creation time, so later edits to the
/// descriptor never touch existing rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub trigger: RoomId,
    pub kind: RoomKind,
    pub group: Option<GroupId>,
}

impl SourceDescriptor {
    pub fn new(trigger: RoomId, kind: RoomKind, group: Option<GroupId>) -> Self {
        Self {
            trigger,
            kind,
            group,
        }
    }

    /// Group new rooms are created under, given the trigger's own group.
    pub fn resolve_group(&self, trigger_group: GroupId) -> GroupId {
        self.group.unwrap_or(trigger_group)
    }
}

/// The permission base a room's visibility is expressed against.
///
/// Explicit policy input to room/grant creation, never inferred at call
/// sites: either the platform-wide default audience or a configured role
/// (the "member role" override).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasePolicy {
    Everyone,
    Role(RoleId),
}

impl Default for BasePolicy {
    fn default() -> Self {
        BasePolicy::Everyone
    }
}

/// Default visibility applied at room creation, derived from the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Base role can view and connect.
    Open,
    /// Base role denied view; the owner grants exceptions.
    Hidden,
}

impl RoomKind {
    /// Kind's default visibility policy. Public and Personal rooms are
    /// open to the base role; Private rooms are hidden from it.
    pub fn visibility(self) -> Visibility {
        match self {
            RoomKind::Public | RoomKind::Personal => Visibility::Open,
            RoomKind::Private => Visibility::Hidden,
        }
    }
}

/// Build a room name from the creator's display name.
///
/// Mirrors what users expect to see in the room list: lowercased, spaces
/// collapsed to dashes, truncated so platform name limits are never hit.
pub fn room_name_for(display_name: &str) -> String {
    let mut base: String = display_name
        .trim()
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .take(20)
        .collect();
    if base.is_empty() {
        base.push_str("someone");
    }
    format!("{base}'s room")
}
