use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// One rate-limit bucket
///
/// `queue` serializes callers so that waiters are released in arrival order;
/// `state` is only ever held for bookkeeping, never across an await.
#[derive(Debug)]
pub(crate) struct Bucket {
    pub(crate) key: String,
    pub(crate) queue: tokio::sync::Mutex<()>,
    pub(crate) state: Mutex<BucketState>,
}

impl Bucket {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            queue: tokio::sync::Mutex::new(()),
            state: Mutex::new(BucketState::default()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BucketState {
    pub(crate) limit: Option<u32>,
    pub(crate) remaining: Option<u32>,
    pub(crate) reset_at: Option<Instant>,
}

impl BucketState {
    /// Take one request slot, or report when the window reopens
    ///
    /// A bucket the service has not described yet always admits.
    pub(crate) fn try_take(&mut self, now: Instant) -> Option<Instant> {
        if self.remaining == Some(0) {
            match self.reset_at {
                Some(reset_at) if reset_at > now => return Some(reset_at),
                _ => {
                    self.remaining = self.limit;
                    self.reset_at = None;
                }
            }
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        None
    }

    /// Nothing left to remember once the window has passed
    pub(crate) fn is_idle(&self, now: Instant) -> bool {
        self.reset_at.is_none_or(|reset_at| reset_at <= now)
    }

    pub(crate) fn exhaust_for(&mut self, wait: Duration, now: Instant) {
        self.remaining = Some(0);
        self.reset_at = Some(now + wait);
    }
}

/// Point-in-time view of a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub key: String,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Time until the window reopens, if it is currently closed
    pub reset_after: Option<Duration>,
    /// Whether the global gate is currently closed
    pub global: bool,
}
