use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// One listing page request.
    Listing,
    /// One item, i.e. a detail page plus its transcript page.
    Item,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Block until the next request of `kind` may start.
    async fn wait(&self, kind: RequestKind);
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RateLimiter for NoDelay {
    async fn wait(&self, _kind: RequestKind) {}
}

/// Keeps a fixed minimum spacing between successive requests of each kind.
///
/// Callers reserve the next free slot under the lock and sleep outside it, so
/// concurrent workers sharing one limiter are spaced out exactly like a
/// sequential loop would be.
#[derive(Debug)]
pub struct FixedIntervalLimiter {
    listing_interval: Duration,
    item_interval: Duration,
    slots: Mutex<Slots>,
}

#[derive(Debug, Default)]
struct Slots {
    listing: Option<Instant>,
    item: Option<Instant>,
}

impl FixedIntervalLimiter {
    pub fn new(listing_interval: Duration, item_interval: Duration) -> Self {
        Self {
            listing_interval,
            item_interval,
            slots: Mutex::new(Slots::default()),
        }
    }

    fn reserve(&self, kind: RequestKind) -> Instant {
        let now = Instant::now();
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (last, interval) = match kind {
            RequestKind::Listing => (&mut slots.listing, self.listing_interval),
            RequestKind::Item => (&mut slots.item, self.item_interval),
        };

        let slot = match *last {
            Some(previous) => (previous + interval).max(now),
            None => now,
        };
        *last = Some(slot);
        slot
    }
}

#[async_trait]
impl RateLimiter for FixedIntervalLimiter {
    async fn wait(&self, kind: RequestKind) {
        let slot = self.reserve(kind);
        let delay = slot.saturating_duration_since(Instant::now());
        if !delay.is_zero() {
            tracing::debug!(?kind, delay_ms = delay.as_millis() as u64, "rate limit");
        }
        tokio::time::sleep_until(slot).await;
    }
}
