//! Request pacing shared by all workers of a crawler.
//!
//! A worker acquires one slot per fetch; slots are spaced evenly across
//! the configured window. Acquisition blocks the worker, not the pool:
//! other workers keep fetching until they need a slot themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn per_second(requests: u32) -> Self {
        Self::with_interval(Duration::from_secs(1) / requests.max(1))
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::with_interval(Duration::from_secs(60) / requests.max(1))
    }

    fn with_interval(interval: Duration) -> Self {
        RateLimiter {
            inner: Arc::new(Inner {
                interval,
                next_slot: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Waits for the next free slot. Waiters queue on the slot lock, so
    /// slots are handed out in roughly arrival order.
    pub async fn acquire(&self) {
        let mut next_slot = self.inner.next_slot.lock().await;
        let now = Instant::now();
        if *next_slot > now {
            tokio::time::sleep_until(*next_slot).await;
        }
        *next_slot = (*next_slot).max(now) + self.inner.interval;
    }
}
