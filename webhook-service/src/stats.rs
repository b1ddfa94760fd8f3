//! Process-wide request counters.
//!
//! Counters start at zero with the process and only ever grow.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a webhook was turned away before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Auth,
    Validation,
    RateLimited,
    BadRequest,
}

/// Monotonic webhook counters.
#[derive(Debug, Default)]
pub struct Stats {
    received: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    errored: AtomicU64,
    rejected_auth: AtomicU64,
    rejected_validation: AtomicU64,
    rejected_rate_limited: AtomicU64,
}

/// Point-in-time view of [`Stats`].
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub errored: u64,
    pub rejected_auth: u64,
    pub rejected_validation: u64,
    pub rejected_rate_limited: u64,
    /// Accepted share of received requests
    pub success_rate: f64,
    pub timestamp: DateTime<Utc>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, reason: Rejection) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        let detail = match reason {
            Rejection::Auth => &self.rejected_auth,
            Rejection::Validation => &self.rejected_validation,
            Rejection::RateLimited => &self.rejected_rate_limited,
            Rejection::BadRequest => return,
        };
        detail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_errored(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let received = self.received.load(Ordering::Relaxed);
        let accepted = self.accepted.load(Ordering::Relaxed);

        StatsSnapshot {
            received,
            accepted,
            rejected: self.rejected.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            rejected_auth: self.rejected_auth.load(Ordering::Relaxed),
            rejected_validation: self.rejected_validation.load(Ordering::Relaxed),
            rejected_rate_limited: self.rejected_rate_limited.load(Ordering::Relaxed),
            success_rate: if received > 0 {
                accepted as f64 / received as f64
            } else {
                0.0
            },
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_empty() {
        let snapshot = Stats::new().snapshot();
        assert_eq!(snapshot.received, 0);
        assert_eq!(snapshot.success_rate, 0.0);
    }

    #[test]
    fn test_counters_and_breakdown() {
        let stats = Stats::new();
        for _ in 0..4 {
            stats.record_received();
        }
        stats.record_accepted();
        stats.record_rejected(Rejection::Auth);
        stats.record_rejected(Rejection::RateLimited);
        stats.record_errored();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 4);
        assert_eq!(snapshot.accepted, 1);
        assert_eq!(snapshot.rejected, 2);
        assert_eq!(snapshot.errored, 1);
        assert_eq!(snapshot.rejected_auth, 1);
        assert_eq!(snapshot.rejected_rate_limited, 1);
        assert_eq!(snapshot.rejected_validation, 0);
        assert_eq!(snapshot.success_rate, 0.25);
    }

    #[test]
    fn test_bad_request_counts_only_total() {
        let stats = Stats::new();
        stats.record_rejected(Rejection::BadRequest);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(
            snapshot.rejected_auth + snapshot.rejected_validation + snapshot.rejected_rate_limited,
            0
        );
    }
}
