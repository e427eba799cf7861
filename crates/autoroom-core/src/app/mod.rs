//! App - アプリケーションレイヤー
//!
//! - **builder**: AppBuilder による配線と起動
//! - **dispatch_loop**: イベントキューと単一コンシューマ
//! - **reaper_loop**: 空室掃除の定期ループ
//! - **status**: 台帳の集計ビュー

pub mod builder;
pub mod dispatch_loop;
pub mod reaper_loop;
pub mod status;

pub use self::builder::{App, AppBuilder};
pub use self::dispatch_loop::{DEFAULT_QUEUE_CAPACITY, DispatcherHandle};
pub use self::reaper_loop::{CREATION_GRACE, DEFAULT_REAP_PERIOD, Reaper, ReaperHandle};
pub use self::status::LedgerCounts;
