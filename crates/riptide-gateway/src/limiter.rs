//! Outbound-command admission control.
//!
//! Two independent token buckets gate writes: a general command bucket
//! sized below the gateway's burst ceiling (keeping slots free for
//! mandatory heartbeats), and a much stricter identify bucket whose
//! denial is returned to the caller instead of being waited out.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::sleep;

/// Outcome of a non-blocking admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A token was taken; the command may be written.
    Allowed,
    /// The bucket is empty.
    Denied {
        /// Suggested wait until the window refills.
        retry_after: Duration,
    },
}

impl Acquire {
    /// Whether the command was admitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    window_start: Instant,
}

/// A fixed-window token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    window: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket that grants `capacity` tokens per `window`.
    #[must_use]
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            state: Mutex::new(BucketState {
                tokens: capacity,
                window_start: Instant::now(),
            }),
        }
    }

    /// Try to take one token without waiting.
    pub fn try_acquire(&self) -> Acquire {
        let mut state = self.state.lock();
        let now = Instant::now();

        if now.duration_since(state.window_start) >= self.window {
            state.tokens = self.capacity;
            state.window_start = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            Acquire::Allowed
        } else {
            let retry_after = (state.window_start + self.window).saturating_duration_since(now);
            Acquire::Denied { retry_after }
        }
    }

    /// Take one token, sleeping through refill windows as needed.
    ///
    /// The wait is bounded by one window per iteration.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Acquire::Allowed => return,
                Acquire::Denied { retry_after } => {
                    sleep(retry_after.max(Duration::from_millis(1))).await;
                }
            }
        }
    }

    /// Tokens currently available (after applying any due refill).
    #[must_use]
    pub fn available(&self) -> u32 {
        let mut state = self.state.lock();
        if state.window_start.elapsed() >= self.window {
            state.tokens = self.capacity;
            state.window_start = Instant::now();
        }
        state.tokens
    }

    /// The bucket's per-window capacity.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The refill window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}
