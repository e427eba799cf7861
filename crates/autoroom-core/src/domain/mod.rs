//! Domain model (IDs, rooms, sources, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod room;
pub mod source;

pub use errors::AutoroomError;
pub use events::RoomEvent;
pub use ids::{GrantId, GroupId, RoleId, RoomId, UserId};
pub use room::{ManagedRoom, RoomKind};
pub use source::{BasePolicy, SourceDescriptor, Visibility, room_name_for};
