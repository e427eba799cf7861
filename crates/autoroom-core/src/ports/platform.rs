//! Platform port - the hosting platform the manager drives.
//!
//! Everything the lifecycle manager does to the outside world goes through
//! this trait: room primitives, grant primitives, membership movement and
//! direct notification. The push-event feed arrives separately as
//! [`RoomEvent`](crate::domain::RoomEvent)s on the dispatch queue.
//!
//! Design intent:
//! - Calls are asynchronous I/O and may suspend the calling task.
//! - `delete_room` is idempotent: deleting an already-gone room succeeds,
//!   which makes the reaper/controller deletion race harmless.
//! - Ledger state only commits after a call confirms, so a stalled call
//!   delays but never corrupts the ledger.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ids::{GrantId, GroupId, RoomId, UserId};
use crate::domain::source::{BasePolicy, Visibility};

/// Errors surfaced by the platform client.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// The platform refused the operation (missing permission, policy).
    #[error("platform denied the operation: {0}")]
    Denied(String),

    /// Transport-level or otherwise unexpected failure.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Request to create one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoom {
    pub name: String,
    pub group: GroupId,
    /// Default visibility derived from the room kind.
    pub visibility: Visibility,
    /// The role the visibility is expressed against.
    pub base: BasePolicy,
}

/// Capabilities consumed from the hosting platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a room with initial permission overwrites; returns its id.
    async fn create_room(&self, req: CreateRoom) -> Result<RoomId, PlatformError>;

    /// Delete a room by id. Deleting an absent room is a no-op success.
    async fn delete_room(&self, room: RoomId) -> Result<(), PlatformError>;

    /// Identities currently present in the room. Absent rooms read as empty.
    async fn occupants(&self, room: RoomId) -> Result<Vec<UserId>, PlatformError>;

    /// Create a scoped capability binding `owner` to `room`.
    async fn create_grant(&self, room: RoomId, owner: UserId) -> Result<GrantId, PlatformError>;

    /// Revoke a grant by id. Revoking an absent grant is a no-op success.
    async fn revoke_grant(&self, grant: GrantId) -> Result<(), PlatformError>;

    /// Move an identity into a specific room.
    async fn move_member(&self, user: UserId, room: RoomId) -> Result<(), PlatformError>;

    /// Direct/ephemeral notification to a single identity.
    async fn notify_user(&self, user: UserId, message: &str) -> Result<(), PlatformError>;
}
