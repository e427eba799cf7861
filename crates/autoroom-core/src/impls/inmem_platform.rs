//! InMemoryPlatform - 開発・テスト用のプラットフォーム実装
//!
//! 実プラットフォームの部屋・権限・在室状態をメモリ上で再現します。
//! テストはここで join/leave を起こし、イベントとプラットフォーム状態の
//! 両方を自由に駆動できます。失敗注入もサポートします。

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::ids::{GrantId, GroupId, RoomId, UserId};
use crate::domain::source::{BasePolicy, Visibility};
use crate::ports::platform::{CreateRoom, Platform, PlatformError};

#[derive(Debug, Clone)]
struct PlatformRoom {
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    group: GroupId,
    #[allow(dead_code)]
    visibility: Visibility,
    #[allow(dead_code)]
    base: BasePolicy,
    occupants: Vec<UserId>,
}

#[derive(Default)]
struct FailNext {
    create_room: bool,
    create_grant: bool,
    delete_room: bool,
    move_member: bool,
}

#[derive(Default)]
struct PlatformState {
    rooms: HashMap<RoomId, PlatformRoom>,
    grants: HashMap<GrantId, (RoomId, UserId)>,
    notices: Vec<(UserId, String)>,
    next_room_id: u64,
    next_grant_id: u64,
    fail_next: FailNext,
}

/// In-memory platform: rooms, grants, occupancy and notices.
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState {
                // Leave low ids free for test-seeded trigger rooms.
                next_room_id: 1000,
                next_grant_id: 5000,
                ..PlatformState::default()
            }),
        }
    }

    /// Seed a pre-existing room (e.g. a trigger room).
    pub fn register_room(&self, room: RoomId, group: GroupId) {
        let mut state = self.state.lock().unwrap();
        state.rooms.insert(
            room,
            PlatformRoom {
                name: format!("{room}"),
                group,
                visibility: Visibility::Open,
                base: BasePolicy::Everyone,
                occupants: Vec::new(),
            },
        );
    }

    /// Platform-side join: puts `user` into `room`, leaving any other room.
    pub fn join(&self, user: UserId, room: RoomId) {
        let mut state = self.state.lock().unwrap();
        for r in state.rooms.values_mut() {
            r.occupants.retain(|u| *u != user);
        }
        if let Some(r) = state.rooms.get_mut(&room) {
            r.occupants.push(user);
        }
    }

    /// Platform-side leave.
    pub fn leave(&self, user: UserId, room: RoomId) {
        let mut state = self.state.lock().unwrap();
        if let Some(r) = state.rooms.get_mut(&room) {
            r.occupants.retain(|u| *u != user);
        }
    }

    pub fn room_exists(&self, room: RoomId) -> bool {
        self.state.lock().unwrap().rooms.contains_key(&room)
    }

    pub fn grant_count(&self) -> usize {
        self.state.lock().unwrap().grants.len()
    }

    pub fn grant_exists(&self, grant: GrantId) -> bool {
        self.state.lock().unwrap().grants.contains_key(&grant)
    }

    /// Direct notifications sent so far, oldest first.
    pub fn notices(&self) -> Vec<(UserId, String)> {
        self.state.lock().unwrap().notices.clone()
    }

    pub fn fail_next_create_room(&self) {
        self.state.lock().unwrap().fail_next.create_room = true;
    }

    pub fn fail_next_create_grant(&self) {
        self.state.lock().unwrap().fail_next.create_grant = true;
    }

    pub fn fail_next_delete_room(&self) {
        self.state.lock().unwrap().fail_next.delete_room = true;
    }

    pub fn fail_next_move_member(&self) {
        self.state.lock().unwrap().fail_next.move_member = true;
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn create_room(&self, req: CreateRoom) -> Result<RoomId, PlatformError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next.create_room) {
            return Err(PlatformError::Denied("injected create_room failure".into()));
        }
        let id = RoomId::new(state.next_room_id);
        state.next_room_id += 1;
        state.rooms.insert(
            id,
            PlatformRoom {
                name: req.name,
                group: req.group,
                visibility: req.visibility,
                base: req.base,
                occupants: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn delete_room(&self, room: RoomId) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next.delete_room) {
            return Err(PlatformError::Unavailable(
                "injected delete_room failure".into(),
            ));
        }
        // Idempotent: deleting an absent room is a no-op success.
        state.rooms.remove(&room);
        Ok(())
    }

    async fn occupants(&self, room: RoomId) -> Result<Vec<UserId>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .get(&room)
            .map(|r| r.occupants.clone())
            .unwrap_or_default())
    }

    async fn create_grant(&self, room: RoomId, owner: UserId) -> Result<GrantId, PlatformError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next.create_grant) {
            return Err(PlatformError::Denied("injected create_grant failure".into()));
        }
        if !state.rooms.contains_key(&room) {
            return Err(PlatformError::Denied(format!("no such room {room}")));
        }
        let id = GrantId::new(state.next_grant_id);
        state.next_grant_id += 1;
        state.grants.insert(id, (room, owner));
        Ok(id)
    }

    async fn revoke_grant(&self, grant: GrantId) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        // Idempotent, like delete_room.
        state.grants.remove(&grant);
        Ok(())
    }

    async fn move_member(&self, user: UserId, room: RoomId) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next.move_member) {
            return Err(PlatformError::Unavailable(
                "injected move_member failure".into(),
            ));
        }
        if !state.rooms.contains_key(&room) {
            return Err(PlatformError::Denied(format!("no such room {room}")));
        }
        for r in state.rooms.values_mut() {
            r.occupants.retain(|u| *u != user);
        }
        if let Some(r) = state.rooms.get_mut(&room) {
            r.occupants.push(user);
        }
        Ok(())
    }

    async fn notify_user(&self, user: UserId, message: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.notices.push((user, message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(group: GroupId) -> CreateRoom {
        CreateRoom {
            name: "test room".into(),
            group,
            visibility: Visibility::Open,
            base: BasePolicy::Everyone,
        }
    }

    #[tokio::test]
    async fn create_and_delete_room() {
        let platform = InMemoryPlatform::new();
        let room = platform.create_room(req(GroupId::new(1))).await.unwrap();
        assert!(platform.room_exists(room));

        platform.delete_room(room).await.unwrap();
        assert!(!platform.room_exists(room));

        // Idempotent on the second delete.
        platform.delete_room(room).await.unwrap();
    }

    #[tokio::test]
    async fn move_member_leaves_previous_room() {
        let platform = InMemoryPlatform::new();
        let a = platform.create_room(req(GroupId::new(1))).await.unwrap();
        let b = platform.create_room(req(GroupId::new(1))).await.unwrap();
        let user = UserId::new(7);

        platform.move_member(user, a).await.unwrap();
        platform.move_member(user, b).await.unwrap();

        assert!(platform.occupants(a).await.unwrap().is_empty());
        assert_eq!(platform.occupants(b).await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn grants_track_rooms_and_owners() {
        let platform = InMemoryPlatform::new();
        let room = platform.create_room(req(GroupId::new(1))).await.unwrap();

        let grant = platform.create_grant(room, UserId::new(7)).await.unwrap();
        assert!(platform.grant_exists(grant));

        platform.revoke_grant(grant).await.unwrap();
        assert!(!platform.grant_exists(grant));
        platform.revoke_grant(grant).await.unwrap(); // no-op
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let platform = InMemoryPlatform::new();
        platform.fail_next_create_room();

        assert!(platform.create_room(req(GroupId::new(1))).await.is_err());
        assert!(platform.create_room(req(GroupId::new(1))).await.is_ok());
    }
}
