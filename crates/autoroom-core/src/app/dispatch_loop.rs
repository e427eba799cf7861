//! Event dispatch loop: bounded queue, single consumer, failure boundary.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::errors::AutoroomError;
use crate::domain::events::RoomEvent;
use crate::lifecycle::LifecycleController;

/// Default bound of the event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Handle to the running dispatch loop.
/// - dropping `shutdown_tx`'s peer or sending `true` stops the loop
/// - `shutdown_and_join()` waits for in-flight event handling to finish
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Request shutdown. In-flight handler execution is not canceled; the
    /// loop just stops taking new events.
    pub fn request_shutdown(&self) {
        // ignore send error: receiver may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

/// Spawn the dispatch loop; returns the producer side of the bounded queue
/// and the loop handle.
///
/// All events of the category flow through one consumer, so handler bodies
/// for the same room never interleave from this side; per-room regions in
/// the controller cover the reaper's concurrent mutations.
pub fn spawn(
    controller: Arc<LifecycleController>,
    capacity: usize,
) -> (mpsc::Sender<RoomEvent>, DispatcherHandle) {
    let (tx, mut rx) = mpsc::channel::<RoomEvent>(capacity);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        loop {
            if *shutdown_rx.borrow() {
                // Drain events that were already queued, then stop.
                while let Ok(event) = rx.try_recv() {
                    dispatch(&controller, event).await;
                }
                break;
            }

            // recv は待つ可能性があるので select で shutdown と競合させる
            let event = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                event = rx.recv() => event,
            };
            let Some(event) = event else {
                break; // all senders dropped
            };

            dispatch(&controller, event).await;
        }
        info!("event dispatch loop stopped");
    });

    (tx, DispatcherHandle { shutdown_tx, join })
}

/// The failure boundary: no handler error may take down the loop.
async fn dispatch(controller: &LifecycleController, event: RoomEvent) {
    let room = event.room();
    let result = match event {
        RoomEvent::Joined {
            user,
            room,
            group,
            display_name,
            is_bot,
        } => controller
            .on_join(user, room, group, &display_name, is_bot)
            .await
            .map(|_| ()),
        RoomEvent::Left { user, room } => controller.on_leave(user, room).await,
        RoomEvent::ClaimRequested { user, room } => {
            controller.on_claim_request(user, room).await.map(|_| ())
        }
    };

    match result {
        Ok(()) => {}
        // Policy denials and unmet preconditions: the user already got a
        // notice, nothing to escalate.
        Err(AutoroomError::RateLimited(user)) => {
            info!(%user, "room creation rate limited");
        }
        Err(
            e @ (AutoroomError::InvalidTransfer(_)
            | AutoroomError::NotEligible { .. }
            | AutoroomError::NoSuchTimer(_)
            | AutoroomError::StaleState(_)),
        ) => {
            debug!(%room, error = %e, "event dropped");
        }
        // Real failures: logged and swallowed, the event is dropped.
        Err(e @ (AutoroomError::CreationFailed(_) | AutoroomError::Platform(_))) => {
            warn!(%room, error = %e, "event handling failed");
        }
    }
}
