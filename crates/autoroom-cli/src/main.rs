use std::sync::Arc;
use tokio::time::{Duration, sleep};

use autoroom_core::app::AppBuilder;
use autoroom_core::domain::events::RoomEvent;
use autoroom_core::domain::ids::{GroupId, RoomId, UserId};
use autoroom_core::domain::room::RoomKind;
use autoroom_core::domain::source::SourceDescriptor;
use autoroom_core::impls::{InMemoryConfigStore, InMemoryPlatform};
use autoroom_core::registry::SourceRegistry;

const GROUP: GroupId = GroupId::new(100);
const TRIGGER: RoomId = RoomId::new(1);
const ALICE: UserId = UserId::new(7);
const BOB: UserId = UserId::new(8);

/// Queue processing is asynchronous; give the dispatch loop a beat.
async fn settle() {
    sleep(Duration::from_millis(50)).await;
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // (A) in-memory のプラットフォームと設定ストアを用意
    let platform = Arc::new(InMemoryPlatform::new());
    platform.register_room(TRIGGER, GROUP);

    let store = Arc::new(InMemoryConfigStore::new());
    let seed = SourceRegistry::new(store.clone());
    seed.add(
        GROUP,
        SourceDescriptor::new(TRIGGER, RoomKind::Personal, None),
    )
    .await
    .expect("in-memory store never fails");

    // (B) App を起動（デモなので claim 待ちと掃除周期を短くする）
    let app = AppBuilder::new(platform.clone(), store)
        .serve_group(GROUP)
        .claim_wait(Duration::from_secs(2))
        .reap_period(Duration::from_secs(1))
        .build()
        .await
        .expect("in-memory store never fails");
    let events = app.events();
    tracing::info!(group = %GROUP, trigger = %TRIGGER, "autoroom demo running");

    // (C) Alice がトリガー部屋に入る → 個人部屋が作られ、Alice が移動する
    platform.join(ALICE, TRIGGER);
    events
        .send(RoomEvent::Joined {
            user: ALICE,
            room: TRIGGER,
            group: GROUP,
            display_name: "Alice".into(),
            is_bot: false,
        })
        .await
        .unwrap();
    settle().await;

    let room = app.ledger().rooms().pop().expect("room was created");
    println!("created: {} ({}) owner={:?}", room.id, room.kind, room.owner);

    // (D) Bob が合流し、Alice（オーナー）が退出 → 空席タイマーが走る
    platform.join(BOB, room.id);
    platform.leave(ALICE, room.id);
    events
        .send(RoomEvent::Left {
            user: ALICE,
            room: room.id,
        })
        .await
        .unwrap();
    settle().await;

    let timer = app.scheduler().timer_of(room.id).expect("vacancy timer");
    println!(
        "owner left: claimable at {} (previous owner {})",
        timer.eligible_at, timer.previous_owner
    );

    // (E) 待ち時間の前後で Bob がクレームする
    events
        .send(RoomEvent::ClaimRequested {
            user: BOB,
            room: room.id,
        })
        .await
        .unwrap();
    settle().await;
    let last_notice = platform
        .notices()
        .into_iter()
        .rev()
        .find(|(user, _)| *user == BOB)
        .map(|(_, text)| text);
    println!("too early: {:?}", last_notice);

    sleep(Duration::from_secs(2)).await;
    events
        .send(RoomEvent::ClaimRequested {
            user: BOB,
            room: room.id,
        })
        .await
        .unwrap();
    settle().await;

    let room = app.ledger().get(room.id).expect("room still exists");
    println!("claimed: owner={:?}", room.owner);

    // (F) Bob も退出 → 次の掃除で部屋が消える
    platform.leave(BOB, room.id);
    events
        .send(RoomEvent::Left {
            user: BOB,
            room: room.id,
        })
        .await
        .unwrap();

    let mut waited = Duration::ZERO;
    while app.ledger().get(room.id).is_some() && waited < Duration::from_secs(5) {
        sleep(Duration::from_millis(100)).await;
        waited += Duration::from_millis(100);
    }
    println!("reaped after {:?}; counts: {:?}", waited, app.counts());

    app.shutdown().await;
}
