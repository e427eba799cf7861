//! Room events: what the platform's push feed turns into.

use super::ids::{GroupId, RoomId, UserId};

/// One notification from the hosting platform, normalized for dispatch.
///
/// Events flow through a bounded queue into a single dispatch loop, which
/// preserves arrival order and keeps the failure boundary in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A member joined a room.
    Joined {
        user: UserId,
        room: RoomId,
        group: GroupId,
        /// Display name of the joiner, used to name created rooms.
        display_name: String,
        /// Automated/non-human identities are filtered out by the handler.
        is_bot: bool,
    },

    /// A member left a room.
    Left { user: UserId, room: RoomId },

    /// A member asked to claim ownership of a vacant room.
    ClaimRequested { user: UserId, room: RoomId },
}

impl RoomEvent {
    /// The room this event is about (used for logging).
    pub fn room(&self) -> RoomId {
        match self {
            RoomEvent::Joined { room, .. }
            | RoomEvent::Left { room, .. }
            | RoomEvent::ClaimRequested { room, .. } => *room,
        }
    }
}
