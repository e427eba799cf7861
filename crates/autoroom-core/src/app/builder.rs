//! AppBuilder - wiring of the component graph and background loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::app::dispatch_loop::{self, DEFAULT_QUEUE_CAPACITY, DispatcherHandle};
use crate::app::reaper_loop::{self, DEFAULT_REAP_PERIOD, Reaper, ReaperHandle};
use crate::app::status::LedgerCounts;
use crate::claim::{ClaimScheduler, DEFAULT_CLAIM_WAIT};
use crate::domain::events::RoomEvent;
use crate::domain::ids::GroupId;
use crate::ledger::RoomLedger;
use crate::lifecycle::{LifecycleController, RoomLocks};
use crate::limiter::{DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW, RateLimiter};
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::config_store::{ConfigError, ConfigStore};
use crate::ports::platform::Platform;
use crate::registry::SourceRegistry;

/// Builds the lifecycle manager around a platform client and a config
/// store, then spawns the dispatch and reaper loops.
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(platform, store)
///     .serve_group(group)
///     .build()
///     .await?;
/// app.events().send(event).await?;
/// ```
pub struct AppBuilder {
    platform: Arc<dyn Platform>,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    groups: Vec<GroupId>,
    queue_capacity: usize,
    reap_period: Duration,
    claim_wait: Duration,
    rate_max: usize,
    rate_window: Duration,
}

impl AppBuilder {
    pub fn new(platform: Arc<dyn Platform>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            platform,
            store,
            clock: Arc::new(SystemClock),
            groups: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reap_period: DEFAULT_REAP_PERIOD,
            claim_wait: DEFAULT_CLAIM_WAIT,
            rate_max: DEFAULT_MAX_PER_WINDOW,
            rate_window: DEFAULT_WINDOW,
        }
    }

    /// Replace the clock (tests use `FixedClock`).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Hydrate this group's configuration at build time. Call once per
    /// group the manager serves.
    pub fn serve_group(mut self, group: GroupId) -> Self {
        self.groups.push(group);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn reap_period(mut self, period: Duration) -> Self {
        self.reap_period = period;
        self
    }

    pub fn claim_wait(mut self, wait: Duration) -> Self {
        self.claim_wait = wait;
        self
    }

    pub fn rate_limit(mut self, max_per_window: usize, window: Duration) -> Self {
        self.rate_max = max_per_window;
        self.rate_window = window;
        self
    }

    /// Wire everything, load configuration and start the loops.
    pub async fn build(self) -> Result<App, ConfigError> {
        let registry = Arc::new(SourceRegistry::new(self.store));
        for group in &self.groups {
            registry.load_group(*group).await?;
        }

        let ledger = Arc::new(RoomLedger::new(self.platform.clone(), self.clock.clone()));
        let scheduler = Arc::new(ClaimScheduler::with_wait(self.clock.clone(), self.claim_wait));
        let locks = Arc::new(RoomLocks::new());

        let controller = Arc::new(LifecycleController::new(
            registry.clone(),
            RateLimiter::with_policy(self.clock.clone(), self.rate_max, self.rate_window),
            ledger.clone(),
            scheduler.clone(),
            self.platform.clone(),
            locks.clone(),
        ));

        let (events, dispatcher) = dispatch_loop::spawn(controller, self.queue_capacity);
        let reaper = reaper_loop::spawn(
            Reaper::new(ledger.clone(), scheduler.clone(), locks, self.clock.clone()),
            self.reap_period,
        );

        Ok(App {
            events,
            registry,
            ledger,
            scheduler,
            dispatcher,
            reaper,
        })
    }
}

/// The running lifecycle manager.
pub struct App {
    events: mpsc::Sender<RoomEvent>,
    registry: Arc<SourceRegistry>,
    ledger: Arc<RoomLedger>,
    scheduler: Arc<ClaimScheduler>,
    dispatcher: DispatcherHandle,
    reaper: ReaperHandle,
}

impl App {
    /// Producer handle for platform events.
    pub fn events(&self) -> mpsc::Sender<RoomEvent> {
        self.events.clone()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &RoomLedger {
        &self.ledger
    }

    pub fn scheduler(&self) -> &ClaimScheduler {
        &self.scheduler
    }

    pub fn counts(&self) -> LedgerCounts {
        self.ledger.counts()
    }

    /// Stop both loops and wait for them.
    pub async fn shutdown(self) {
        drop(self.events);
        self.dispatcher.shutdown_and_join().await;
        self.reaper.shutdown_and_join().await;
    }
}
