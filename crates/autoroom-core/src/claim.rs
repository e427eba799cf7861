//! Claim scheduler: vacancy timers and claim eligibility.
//!
//! Per-room states: `Owned` (no timer), `VacantOccupied` (timer present) and
//! `VacantEmpty` (timer canceled, the reaper deletes). The scheduler owns
//! every timer record; it never changes a room's owner itself; accepted
//! claims go through [`RoomLedger::transfer_ownership`] and the caller
//! cancels the timer inside the same per-room region, so cancellation is
//! observed-before any later claim attempt.
//!
//! [`RoomLedger::transfer_ownership`]: crate::ledger::RoomLedger::transfer_ownership

use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::ids::{RoomId, UserId};
use crate::ports::Clock;

/// Grace period after an owner leaves before the room can be claimed.
pub const DEFAULT_CLAIM_WAIT: Duration = Duration::from_secs(300);

/// Countdown attached to a room whose owner left while it was occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VacancyTimer {
    pub room: RoomId,
    pub previous_owner: UserId,
    pub owner_left_at: DateTime<Utc>,
    pub eligible_at: DateTime<Utc>,
}

/// Heap entry. Reverse ordering so `BinaryHeap` acts as a min-heap
/// (earliest eligible instant first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct VacancyEntry {
    eligible_at: DateTime<Utc>,
    room: RoomId,
}

impl PartialOrd for VacancyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VacancyEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering: earlier instants have higher priority.
        other
            .eligible_at
            .cmp(&self.eligible_at)
            .then_with(|| other.room.cmp(&self.room))
    }
}

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Accepted,
    NotEligible(NotEligibleReason),
    NoSuchTimer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotEligibleReason {
    /// Grace period not over yet.
    GracePeriod { remaining_secs: i64 },
    /// The claimant is not currently in the room.
    NotPresent,
}

impl std::fmt::Display for NotEligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotEligibleReason::GracePeriod { remaining_secs } => {
                write!(f, "grace period has {remaining_secs}s remaining")
            }
            NotEligibleReason::NotPresent => f.write_str("claimant is not in the room"),
        }
    }
}

struct SchedulerState {
    /// Live timers (single source of truth).
    timers: HashMap<RoomId, VacancyTimer>,

    /// Wake-up order. May hold stale entries for canceled or replaced
    /// timers; they are validated against `timers` on pop.
    queue: BinaryHeap<VacancyEntry>,
}

/// Tracks per-room ownership-vacancy timers and resolves claim eligibility.
///
/// One heap for all rooms instead of one OS timer per room keeps resource
/// use bounded at scale.
pub struct ClaimScheduler {
    clock: Arc<dyn Clock>,
    wait: chrono::Duration,
    state: Mutex<SchedulerState>,
}

impl ClaimScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_wait(clock, DEFAULT_CLAIM_WAIT)
    }

    pub fn with_wait(clock: Arc<dyn Clock>, wait: Duration) -> Self {
        Self {
            clock,
            wait: chrono::Duration::from_std(wait)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
            state: Mutex::new(SchedulerState {
                timers: HashMap::new(),
                queue: BinaryHeap::new(),
            }),
        }
    }

    /// Owner left an occupied room: start (or restart) its vacancy timer.
    pub fn start_vacancy(&self, room: RoomId, previous_owner: UserId) -> VacancyTimer {
        let now = self.clock.now();
        let timer = VacancyTimer {
            room,
            previous_owner,
            owner_left_at: now,
            eligible_at: now + self.wait,
        };

        let mut state = self.state.lock().unwrap();
        state.queue.push(VacancyEntry {
            eligible_at: timer.eligible_at,
            room,
        });
        // Any previous timer's heap entry turns stale and is dropped on pop.
        state.timers.insert(room, timer.clone());
        timer
    }

    /// Remove the room's timer, if any. Returns whether one existed.
    pub fn cancel(&self, room: RoomId) -> bool {
        let mut state = self.state.lock().unwrap();
        state.timers.remove(&room).is_some()
    }

    pub fn timer_of(&self, room: RoomId) -> Option<VacancyTimer> {
        let state = self.state.lock().unwrap();
        state.timers.get(&room).cloned()
    }

    pub fn timer_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.timers.len()
    }

    /// Resolve a claim attempt against the room's timer.
    ///
    /// Accepted only if a timer exists, its eligible instant has passed and
    /// the claimant is among `occupants` (freshly read by the caller, which
    /// rules out remote claiming). The timer stays in place until the caller
    /// commits the ownership transfer and cancels it, both inside the same
    /// per-room region, so only one of N concurrent claimants can win.
    pub fn try_claim(&self, room: RoomId, claimant: UserId, occupants: &[UserId]) -> ClaimOutcome {
        let now = self.clock.now();
        let state = self.state.lock().unwrap();

        let Some(timer) = state.timers.get(&room) else {
            return ClaimOutcome::NoSuchTimer;
        };
        if now < timer.eligible_at {
            let remaining_secs = (timer.eligible_at - now).num_seconds().max(1);
            return ClaimOutcome::NotEligible(NotEligibleReason::GracePeriod { remaining_secs });
        }
        if !occupants.contains(&claimant) {
            return ClaimOutcome::NotEligible(NotEligibleReason::NotPresent);
        }
        ClaimOutcome::Accepted
    }

    /// Pop timers whose eligible instant has arrived.
    ///
    /// Stale heap entries (canceled or restarted timers) are discarded here,
    /// validated lazily against the live timer map instead of being removed
    /// from the heap eagerly. Each live timer is reported once; it stays
    /// claimable afterwards.
    pub fn poll_due(&self) -> Vec<VacancyTimer> {
        let now = self.clock.now();
        let mut due = Vec::new();

        let mut state = self.state.lock().unwrap();
        while let Some(entry) = state.queue.peek() {
            if entry.eligible_at > now {
                break; // Heap is sorted, nothing further is due.
            }
            let entry = entry.clone();
            state.queue.pop();
            if let Some(timer) = state.timers.get(&entry.room)
                && timer.eligible_at == entry.eligible_at
            {
                due.push(timer.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::ports::FixedClock;

    fn setup() -> (Arc<FixedClock>, ClaimScheduler) {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let scheduler = ClaimScheduler::new(clock.clone());
        (clock, scheduler)
    }

    const ROOM: RoomId = RoomId::new(10);
    const OLD_OWNER: UserId = UserId::new(1);
    const CLAIMANT: UserId = UserId::new(2);

    #[test]
    fn claim_without_timer_is_no_such_timer() {
        let (_clock, scheduler) = setup();
        assert_eq!(
            scheduler.try_claim(ROOM, CLAIMANT, &[CLAIMANT]),
            ClaimOutcome::NoSuchTimer
        );
    }

    #[test]
    fn claim_before_eligible_instant_is_not_eligible() {
        let (clock, scheduler) = setup();
        scheduler.start_vacancy(ROOM, OLD_OWNER);

        clock.advance(Duration::from_secs(299));
        match scheduler.try_claim(ROOM, CLAIMANT, &[CLAIMANT]) {
            ClaimOutcome::NotEligible(NotEligibleReason::GracePeriod { remaining_secs }) => {
                assert!(remaining_secs >= 1);
            }
            other => panic!("expected grace-period rejection, got {other:?}"),
        }
    }

    #[test]
    fn claim_at_eligible_instant_by_present_occupant_is_accepted() {
        let (clock, scheduler) = setup();
        scheduler.start_vacancy(ROOM, OLD_OWNER);

        clock.advance(Duration::from_secs(300));
        assert_eq!(
            scheduler.try_claim(ROOM, CLAIMANT, &[CLAIMANT]),
            ClaimOutcome::Accepted
        );
    }

    #[test]
    fn absent_claimant_is_rejected_even_after_the_wait() {
        let (clock, scheduler) = setup();
        scheduler.start_vacancy(ROOM, OLD_OWNER);

        clock.advance(Duration::from_secs(301));
        assert_eq!(
            scheduler.try_claim(ROOM, CLAIMANT, &[UserId::new(9)]),
            ClaimOutcome::NotEligible(NotEligibleReason::NotPresent)
        );
    }

    #[test]
    fn cancel_removes_the_timer() {
        let (clock, scheduler) = setup();
        scheduler.start_vacancy(ROOM, OLD_OWNER);

        assert!(scheduler.cancel(ROOM));
        assert!(!scheduler.cancel(ROOM));

        clock.advance(Duration::from_secs(301));
        assert_eq!(
            scheduler.try_claim(ROOM, CLAIMANT, &[CLAIMANT]),
            ClaimOutcome::NoSuchTimer
        );
    }

    #[test]
    fn poll_due_reports_each_live_timer_once() {
        let (clock, scheduler) = setup();
        scheduler.start_vacancy(ROOM, OLD_OWNER);
        scheduler.start_vacancy(RoomId::new(11), OLD_OWNER);

        assert!(scheduler.poll_due().is_empty());

        clock.advance(Duration::from_secs(300));
        let due = scheduler.poll_due();
        assert_eq!(due.len(), 2);

        // Already popped; nothing new is due.
        assert!(scheduler.poll_due().is_empty());

        // But the rooms are still claimable.
        assert_eq!(
            scheduler.try_claim(ROOM, CLAIMANT, &[CLAIMANT]),
            ClaimOutcome::Accepted
        );
    }

    #[test]
    fn canceled_timers_leave_only_stale_heap_entries() {
        let (clock, scheduler) = setup();
        scheduler.start_vacancy(ROOM, OLD_OWNER);
        scheduler.cancel(ROOM);

        clock.advance(Duration::from_secs(301));
        assert!(scheduler.poll_due().is_empty());
    }

    #[test]
    fn restarting_a_vacancy_invalidates_the_old_entry() {
        let (clock, scheduler) = setup();
        scheduler.start_vacancy(ROOM, OLD_OWNER);

        clock.advance(Duration::from_secs(100));
        scheduler.start_vacancy(ROOM, OLD_OWNER);

        // Old entry comes due first but no longer matches the live timer.
        clock.advance(Duration::from_secs(201));
        assert!(scheduler.poll_due().is_empty());

        clock.advance(Duration::from_secs(100));
        assert_eq!(scheduler.poll_due().len(), 1);
    }

    #[test]
    fn earliest_timer_is_reported_first() {
        let (clock, scheduler) = setup();
        let early = RoomId::new(20);
        let late = RoomId::new(21);

        scheduler.start_vacancy(early, OLD_OWNER);
        clock.advance(Duration::from_secs(60));
        scheduler.start_vacancy(late, OLD_OWNER);

        clock.advance(Duration::from_secs(400));
        let due = scheduler.poll_due();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].room, early);
        assert_eq!(due[1].room, late);
    }
}
