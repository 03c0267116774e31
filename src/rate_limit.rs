//! Sliding-window limit on outbound webhook posts.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default number of posts allowed per window.
pub const DEFAULT_MAX_POSTS: usize = 3;

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Caps the number of dispatches within a trailing time window.
///
/// State lives only in memory, so a restart resets the budget.
#[derive(Debug)]
pub struct RateLimiter {
    max_posts: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_posts: usize, window: Duration) -> Self {
        Self {
            max_posts,
            window,
            timestamps: VecDeque::with_capacity(max_posts),
        }
    }

    /// Take one slot from the window if one is free.
    ///
    /// Returns `false` without recording anything when the window is full;
    /// the caller must not dispatch in that case.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.prune(now);

        if self.timestamps.len() >= self.max_posts {
            return false;
        }

        self.timestamps.push_back(now);
        true
    }

    /// Number of dispatches still counted against the window at `now`.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.timestamps.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POSTS, Duration::from_secs(DEFAULT_WINDOW_SECS))
    }
}
