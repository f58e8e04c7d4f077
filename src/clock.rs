//! # Clock Module
//!
//! Monotonic time source abstraction for the frame scheduler.
//!
//! The scheduler never touches the wall clock directly; it reads elapsed
//! time and sleeps through a [`Clock`], so tick cadence, delta clamping, and
//! the time-gated side effects (reconnect backoff, save debounce) are all
//! testable against a virtual clock without real delays.

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Monotonic elapsed-time source with a bounded-wait primitive.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Elapsed time since the clock was created. Monotonic.
    fn now(&self) -> Duration;

    /// Waits for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by [`Instant`] and the tokio timer.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
