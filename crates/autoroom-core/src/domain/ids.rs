//! Domain identifiers (strongly-typed IDs).
//!
//! # プラットフォーム発行の ID + ジェネリック実装
//! 部屋・ユーザー・グループなどの ID はホスティングプラットフォームが発行する
//! 64-bit 整数です。Phantom type パターンでコードの重複を排除しつつ、
//! コンパイル時の型安全性を提供します（RoomId と UserId は混同できない）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"room-", "user-", ...）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "room-", "user-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// コンパイル時に型安全性を提供します。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    value: u64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Wrap a platform-issued raw id.
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// Raw platform id.
    pub fn as_u64(&self) -> u64 {
        self.value
    }
}

impl<T: IdMarker> From<u64> for Id<T> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Room のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {}

impl IdMarker for Room {
    fn prefix() -> &'static str {
        "room-"
    }
}

/// User のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {}

impl IdMarker for User {
    fn prefix() -> &'static str {
        "user-"
    }
}

/// Group のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {}

impl IdMarker for Group {
    fn prefix() -> &'static str {
        "group-"
    }
}

/// Grant のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grant {}

impl IdMarker for Grant {
    fn prefix() -> &'static str {
        "grant-"
    }
}

/// Role のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {}

impl IdMarker for Role {
    fn prefix() -> &'static str {
        "role-"
    }
}

// ========================================
// Type Alias（使いやすさのため）
// ========================================

/// Identifier of a room (trigger rooms and managed rooms alike).
pub type RoomId = Id<Room>;

/// Identifier of a user (a human or automated identity).
pub type UserId = Id<User>;

/// Identifier of a group (the container rooms are created under).
pub type GroupId = Id<Group>;

/// Identifier of a temporary permission grant.
pub type GrantId = Id<Grant>;

/// Identifier of a platform role usable as a permission base.
pub type RoleId = Id<Role>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let room = RoomId::new(1);
        let user = UserId::new(2);
        let grant = GrantId::new(3);

        assert_eq!(room.as_u64(), 1);
        assert_eq!(user.as_u64(), 2);
        assert_eq!(grant.as_u64(), 3);

        // Display のプレフィックスが正しいことを確認
        assert_eq!(room.to_string(), "room-1");
        assert_eq!(user.to_string(), "user-2");
        assert_eq!(grant.to_string(), "grant-3");

        // The whole point: you can't accidentally mix these types.
        // (This is a compile-time property, so we just keep it as a comment.)
        // let _: RoomId = user; // <- does not compile
    }

    #[test]
    fn ids_can_be_serialized() {
        let room = RoomId::new(42);

        let serialized = serde_json::to_string(&room).unwrap();
        let deserialized: RoomId = serde_json::from_str(&serialized).unwrap();

        assert_eq!(room, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        // Id<T> のサイズは u64 と同じ（8 bytes）
        assert_eq!(size_of::<RoomId>(), size_of::<u64>());
        assert_eq!(size_of::<UserId>(), size_of::<u64>());
    }
}
