//! Identify concurrency gate
//!
//! Shard `n` identifies through bucket `n % max_concurrency`. A bucket admits
//! one identify at a time and stays closed for the spacing after it is sent.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug)]
pub struct IdentifyGate {
    buckets: Vec<Arc<Semaphore>>,
    spacing: Duration,
    jitter: Duration,
}

impl IdentifyGate {
    pub fn new(max_concurrency: u32, spacing: Duration, jitter: Duration) -> Self {
        let buckets = (0..max_concurrency.max(1))
            .map(|_| Arc::new(Semaphore::new(1)))
            .collect();
        Self {
            buckets,
            spacing,
            jitter,
        }
    }

    pub fn max_concurrency(&self) -> u32 {
        u32::try_from(self.buckets.len()).unwrap_or(u32::MAX)
    }

    /// Wait for the identify slot of `shard_id`
    pub async fn acquire(&self, shard_id: u32) -> IdentifyPermit {
        let index = shard_id as usize % self.buckets.len();
        let bucket = Arc::clone(&self.buckets[index]);
        // The semaphores are never closed
        let permit = bucket.acquire_owned().await.ok();
        debug!(shard_id, bucket = index, "identify slot acquired");
        IdentifyPermit {
            permit,
            hold: self.hold(),
        }
    }

    fn hold(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.spacing;
        }
        let extra = rand::thread_rng().gen_range(Duration::ZERO..=self.jitter);
        self.spacing + extra
    }
}

/// A held identify slot
///
/// Dropping it without calling [`IdentifyPermit::identified`] releases the
/// slot at once, as when the connection fails before identify is sent.
#[derive(Debug)]
pub struct IdentifyPermit {
    permit: Option<OwnedSemaphorePermit>,
    hold: Duration,
}

impl IdentifyPermit {
    /// Identify was sent: keep the slot closed for the spacing, then release it
    pub fn identified(mut self) {
        if let Some(permit) = self.permit.take() {
            let hold = self.hold;
            tokio::spawn(async move {
                tokio::time::sleep(hold).await;
                drop(permit);
            });
        }
    }
}
