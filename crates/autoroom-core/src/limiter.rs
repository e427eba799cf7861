//! Per-user sliding-window admission control for room creation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::ids::UserId;
use crate::ports::Clock;

/// Default window and budget: at most 3 admitted creations per 30 seconds.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_PER_WINDOW: usize = 3;

/// Sliding-window rate limiter keyed by user identity.
///
/// Design:
/// - One `Mutex` around all windows; `admit` never awaits while holding it,
///   so the check-then-append is atomic and cheap.
/// - Windows are purely transient; nothing here is persisted.
/// - Rejection is a policy denial, not an error.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
    max_per_window: usize,
    windows: Mutex<HashMap<UserId, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(clock, DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW)
    }

    pub fn with_policy(clock: Arc<dyn Clock>, max_per_window: usize, window: Duration) -> Self {
        Self {
            clock,
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
            max_per_window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or deny one creation request for `user`.
    ///
    /// Evicts timestamps older than the window, admits iff fewer than the
    /// budget remain, and appends the current instant on admission, all in
    /// one critical section so concurrent joins from the same user can
    /// neither double-count nor under-count.
    pub fn admit(&self, user: UserId) -> bool {
        let now = self.clock.now();
        let cutoff = now - self.window;

        let mut windows = self.windows.lock().unwrap();
        let window = windows.entry(user).or_default();

        while let Some(oldest) = window.front() {
            if *oldest > cutoff {
                break;
            }
            window.pop_front();
        }

        if window.len() >= self.max_per_window {
            return false;
        }

        window.push_back(now);
        true
    }

    /// Admissions currently counted against `user`.
    pub fn in_flight(&self, user: UserId) -> usize {
        let windows = self.windows.lock().unwrap();
        windows.get(&user).map(VecDeque::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::ports::FixedClock;

    fn limiter() -> (Arc<FixedClock>, RateLimiter) {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let limiter = RateLimiter::new(clock.clone());
        (clock, limiter)
    }

    #[test]
    fn fourth_call_within_window_is_denied() {
        let (_clock, limiter) = limiter();
        let user = UserId::new(1);

        assert!(limiter.admit(user));
        assert!(limiter.admit(user));
        assert!(limiter.admit(user));
        assert!(!limiter.admit(user));
        assert!(!limiter.admit(user));
        assert_eq!(limiter.in_flight(user), 3);
    }

    #[test]
    fn admission_returns_once_earliest_stamp_ages_out() {
        let (clock, limiter) = limiter();
        let user = UserId::new(1);

        assert!(limiter.admit(user));
        clock.advance(Duration::from_secs(10));
        assert!(limiter.admit(user));
        assert!(limiter.admit(user));
        assert!(!limiter.admit(user));

        // First stamp is 10s older than the other two; once it crosses the
        // 30s boundary a slot frees up.
        clock.advance(Duration::from_secs(21));
        assert!(limiter.admit(user));
        assert!(!limiter.admit(user));
    }

    #[test]
    fn users_are_limited_independently() {
        let (_clock, limiter) = limiter();
        let a = UserId::new(1);
        let b = UserId::new(2);

        for _ in 0..3 {
            assert!(limiter.admit(a));
        }
        assert!(!limiter.admit(a));
        assert!(limiter.admit(b));
    }

    #[test]
    fn denial_does_not_consume_budget() {
        let (clock, limiter) = limiter();
        let user = UserId::new(1);

        for _ in 0..3 {
            assert!(limiter.admit(user));
        }
        // Denied calls add no timestamps, so exactly the original three
        // expire together.
        for _ in 0..5 {
            assert!(!limiter.admit(user));
        }
        clock.advance(Duration::from_secs(31));
        assert!(limiter.admit(user));
    }

    #[test]
    fn concurrent_admits_never_overshoot() {
        let (_clock, limiter) = limiter();
        let limiter = Arc::new(limiter);
        let user = UserId::new(1);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let l = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || l.admit(user)));
        }
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, DEFAULT_MAX_PER_WINDOW);
    }
}
