//! Ports - 抽象化レイヤー
//!
//! このモジュールは外部システムへのインターフェースを定義します。
//! 各 trait は実装の詳細を隠蔽し、テストでは in-memory 実装に差し替えます。
//!
//! - **Platform**: ホスティングプラットフォーム（部屋・権限・移動・通知）
//! - **ConfigStore**: グループごとの永続設定
//! - **Clock**: 時刻（テストでは FixedClock）

pub mod clock;
pub mod config_store;
pub mod platform;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::config_store::{ConfigError, ConfigStore};
pub use self::platform::{CreateRoom, Platform, PlatformError};
