use thiserror::Error;

use super::ids::{RoomId, UserId};
use crate::ports::platform::PlatformError;

/// Error taxonomy of the lifecycle manager.
///
/// Only `CreationFailed` and `Platform` represent real failures; the rest
/// are policy denials or unmet preconditions that the dispatcher reports to
/// the user and otherwise swallows.
#[derive(Debug, Error)]
pub enum AutoroomError {
    /// Per-user creation rate limit hit. The user is notified, no retry.
    #[error("creation rate limit exceeded for {0}")]
    RateLimited(UserId),

    /// The platform rejected room/grant creation. Partial artifacts have
    /// been rolled back; the triggering event is dropped.
    #[error("room creation failed: {0}")]
    CreationFailed(String),

    /// The room has no owner concept (Public) or does not exist.
    #[error("room {0} has no transferable ownership")]
    InvalidTransfer(RoomId),

    /// Claim preconditions unmet (grace period, claimant not present).
    #[error("claim on {room} not eligible: {reason}")]
    NotEligible { room: RoomId, reason: String },

    /// No vacancy timer exists for the room.
    #[error("no vacancy timer for room {0}")]
    NoSuchTimer(RoomId),

    /// A serialized mutation observed the room changed underneath it.
    /// The caller must re-read current state, not blindly retry.
    #[error("state of room {0} changed underneath the mutation")]
    StaleState(RoomId),

    #[error("platform: {0}")]
    Platform(#[from] PlatformError),
}
