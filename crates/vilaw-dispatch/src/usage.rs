use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitSpec;

/// Per-credential consumption counters for the current quota window.
///
/// Counters are mutated in place by the dispatcher and reset lazily the
/// next time the record is consulted; there is no background timer. The
/// window test is check-then-act: bursts are permitted up to the full quota
/// the instant a window opens, then the credential is fully blocked until
/// the window elapses. This matches the backend's coarse per-minute
/// accounting and is deliberately not a token bucket.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    requests_this_window: u32,
    tokens_this_window: u64,
    window_start: Instant,
}

/// Read-only view of one credential's counters, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub requests_this_window: u32,
    pub tokens_this_window: u64,
}

impl UsageRecord {
    /// A zeroed record whose window opens at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            requests_this_window: 0,
            tokens_this_window: 0,
            window_start: now,
        }
    }

    /// Admission test: reset the window if it has elapsed, then check both
    /// limits.
    ///
    /// The reset is committed on the record even when admission is denied:
    /// a due reset must be visible to the next consultation regardless of
    /// the decision.
    pub fn admit(&mut self, spec: &RateLimitSpec, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= spec.window {
            self.reset(now);
        }
        self.requests_this_window < spec.requests_per_window
            && self.tokens_this_window < spec.tokens_per_window
    }

    /// Zero both counters and open a new window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.requests_this_window = 0;
        self.tokens_this_window = 0;
        self.window_start = now;
    }

    /// Reserve one request slot. Called inside the admission critical
    /// section so concurrent callers cannot both be admitted against the
    /// same about-to-be-exhausted window.
    pub fn reserve_request(&mut self) {
        self.requests_this_window += 1;
    }

    /// Release a reservation after a failed invocation: a failed call
    /// consumes no quota.
    pub fn release_request(&mut self) {
        self.requests_this_window = self.requests_this_window.saturating_sub(1);
    }

    /// Add backend-reported token usage after a successful call.
    pub fn record_tokens(&mut self, tokens: u64) {
        self.tokens_this_window += tokens;
    }

    /// Time left until this credential's window elapses, saturating at
    /// zero.
    pub fn time_until_reset(&self, spec: &RateLimitSpec, now: Instant) -> Duration {
        spec.window
            .saturating_sub(now.duration_since(self.window_start))
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests_this_window: self.requests_this_window,
            tokens_this_window: self.tokens_this_window,
        }
    }
}
