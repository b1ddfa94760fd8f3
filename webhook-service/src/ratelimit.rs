//! Fixed-window per-source rate limiting.
//!
//! Each source gets a window that starts with its first request. Requests are
//! counted until the window elapses, then the count starts over. A source can
//! therefore burst up to twice the limit across a window boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Per-source window state.
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    pub window_start: Instant,
    pub count: u32,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admit { remaining: u32 },
    Reject { retry_after: Duration },
}

impl RateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateDecision::Admit { .. })
    }
}

/// Fixed-window rate limiter keyed by source identifier.
///
/// Check-and-increment for a source happens under one lock, so concurrent
/// requests from the same source are never undercounted.
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    max_sources: usize,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration, max_sources: usize) -> Self {
        Self::with_clock(limit, window, max_sources, Arc::new(SystemClock))
    }

    pub fn with_clock(
        limit: u32,
        window: Duration,
        max_sources: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limit,
            window,
            max_sources: max_sources.max(1),
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request from `source` and decide whether to admit it.
    pub fn check(&self, source: &str) -> RateDecision {
        let now = self.clock.now();
        let mut windows = self.windows.lock();

        if !windows.contains_key(source) && windows.len() >= self.max_sources {
            self.make_room(&mut windows, now);
        }

        let entry = windows.entry(source.to_owned()).or_insert(RateWindow {
            window_start: now,
            count: 0,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);

        if entry.count > self.limit {
            let elapsed = now.duration_since(entry.window_start);
            RateDecision::Reject {
                retry_after: self.window.saturating_sub(elapsed),
            }
        } else {
            RateDecision::Admit {
                remaining: self.limit - entry.count,
            }
        }
    }

    /// Number of sources currently tracked.
    pub fn tracked_sources(&self) -> usize {
        self.windows.lock().len()
    }

    /// Drop expired windows, then evict the oldest window if still full.
    fn make_room(&self, windows: &mut HashMap<String, RateWindow>, now: Instant) {
        let window = self.window;
        windows.retain(|_, w| now.duration_since(w.window_start) < window);

        if windows.len() >= self.max_sources {
            let oldest = windows
                .iter()
                .min_by_key(|(_, w)| w.window_start)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                debug!(source = %key, "rate_limit_source_evicted");
                windows.remove(&key);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Clock that only moves when told to.
    #[derive(Clone)]
    pub(crate) struct MockClock {
        current: Arc<Mutex<Instant>>,
    }

    impl MockClock {
        pub(crate) fn new() -> Self {
            Self {
                current: Arc::new(Mutex::new(Instant::now())),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            *self.current.lock() += by;
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            *self.current.lock()
        }
    }

    fn limiter(limit: u32, clock: &MockClock) -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::with_clock(
            limit,
            Duration::from_secs(60),
            100,
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn test_admits_up_to_limit() {
        let clock = MockClock::new();
        let limiter = limiter(3, &clock);

        assert_eq!(limiter.check("a"), RateDecision::Admit { remaining: 2 });
        assert_eq!(limiter.check("a"), RateDecision::Admit { remaining: 1 });
        assert_eq!(limiter.check("a"), RateDecision::Admit { remaining: 0 });
        assert!(!limiter.check("a").is_admitted());
    }

    #[test]
    fn test_reject_reports_retry_after() {
        let clock = MockClock::new();
        let limiter = limiter(1, &clock);

        assert!(limiter.check("a").is_admitted());
        clock.advance(Duration::from_secs(20));
        assert_eq!(
            limiter.check("a"),
            RateDecision::Reject {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[test]
    fn test_window_resets_after_elapsing() {
        let clock = MockClock::new();
        let limiter = limiter(2, &clock);

        assert!(limiter.check("a").is_admitted());
        assert!(limiter.check("a").is_admitted());
        assert!(!limiter.check("a").is_admitted());

        clock.advance(Duration::from_secs(59));
        assert!(!limiter.check("a").is_admitted());

        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.check("a"), RateDecision::Admit { remaining: 1 });
    }

    #[test]
    fn test_sources_are_independent() {
        let clock = MockClock::new();
        let limiter = limiter(1, &clock);

        assert!(limiter.check("a").is_admitted());
        assert!(!limiter.check("a").is_admitted());
        assert!(limiter.check("b").is_admitted());
    }

    #[test]
    fn test_capacity_prunes_expired_windows() {
        let clock = MockClock::new();
        let limiter = FixedWindowRateLimiter::with_clock(
            5,
            Duration::from_secs(60),
            2,
            Arc::new(clock.clone()),
        );

        limiter.check("a");
        limiter.check("b");
        clock.advance(Duration::from_secs(61));
        limiter.check("c");

        assert_eq!(limiter.tracked_sources(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_window() {
        let clock = MockClock::new();
        let limiter = FixedWindowRateLimiter::with_clock(
            1,
            Duration::from_secs(60),
            2,
            Arc::new(clock.clone()),
        );

        limiter.check("a");
        clock.advance(Duration::from_secs(1));
        limiter.check("b");
        clock.advance(Duration::from_secs(1));
        limiter.check("c");

        assert_eq!(limiter.tracked_sources(), 2);
        // "a" was evicted, so it starts a fresh window
        assert!(limiter.check("a").is_admitted());
    }

    #[test]
    fn test_concurrent_checks_never_exceed_limit() {
        let limiter = Arc::new(FixedWindowRateLimiter::new(
            50,
            Duration::from_secs(3600),
            100,
        ));

        let admitted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let limiter = Arc::clone(&limiter);
                    scope.spawn(move || {
                        (0..25)
                            .filter(|_| limiter.check("shared").is_admitted())
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(admitted, 50);
    }
}
