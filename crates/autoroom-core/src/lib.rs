//! autoroom-core
//!
//! Core building blocks for the autoroom lifecycle manager: ephemeral
//! group-communication rooms that are created when someone joins a
//! configured trigger room and deleted when they empty out.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, room, source, events, errors）
//! - **ports**: 抽象化レイヤー（Platform, ConfigStore, Clock）
//! - **registry**: トリガー部屋の設定（SourceRegistry）
//! - **limiter**: 作成レート制限（sliding window）
//! - **ledger**: 管理下の部屋の台帳（RoomLedger）
//! - **claim**: オーナー不在タイマーとクレーム判定（ClaimScheduler）
//! - **lifecycle**: イベントハンドラ本体（LifecycleController）
//! - **app**: 配線と常駐ループ（AppBuilder, dispatch_loop, reaper_loop）
//! - **impls**: in-memory 実装（開発・テスト用）

pub mod app;
pub mod claim;
pub mod domain;
pub mod impls;
pub mod ledger;
pub mod lifecycle;
pub mod limiter;
pub mod ports;
pub mod registry;
