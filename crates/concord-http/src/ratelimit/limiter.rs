use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::bucket::{Bucket, BucketSnapshot};
use super::headers::RateLimitHeaders;
use crate::route::Route;

/// How often idle buckets are dropped
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared rate-limit governor for every REST call of a client
///
/// Order of checks for each request: the global gate, then the request's
/// bucket. Buckets are keyed by the service-reported bucket hash once known
/// (falling back to the route key) plus the major parameter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    global_until: Mutex<Option<Instant>>,
    /// Route key -> bucket hash reported by the service
    route_buckets: DashMap<String, String>,
    buckets: DashMap<String, Arc<Bucket>>,
    next_sweep: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a request on `route` may be sent, and take its slot
    ///
    /// Dropping the returned future releases the caller's place in the
    /// bucket queue.
    pub async fn acquire(&self, route: &Route) {
        self.wait_global().await;

        let bucket = self.bucket(route);
        let _turn = bucket.queue.lock().await;
        loop {
            let wait = bucket.state.lock().try_take(Instant::now());
            match wait {
                None => break,
                Some(until) => {
                    debug!(
                        bucket = %bucket.key,
                        wait_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "bucket exhausted, waiting for reset"
                    );
                    sleep_until(until).await;
                }
            }
        }

        // The global gate may have closed while this caller was queued
        self.wait_global().await;
    }

    /// Record what a response said about its bucket
    pub fn update(&self, route: &Route, headers: &RateLimitHeaders) {
        if let Some(hash) = &headers.bucket {
            let key = route.key();
            let known = self.route_buckets.get(&key).map(|h| h.clone());
            if known.as_deref() != Some(hash.as_str()) {
                debug!(route = %key, bucket = %hash, "learned bucket hash");
                self.route_buckets.insert(key, hash.clone());
            }
        }

        if !headers.has_bucket_info() {
            return;
        }

        let bucket = self.bucket(route);
        let mut state = bucket.state.lock();
        if headers.limit.is_some() {
            state.limit = headers.limit;
        }
        state.remaining = headers.remaining;
        state.reset_at = headers
            .reset_after_duration()
            .map(|after| Instant::now() + after);
    }

    /// Close the bucket of `route` for `wait`, after a non-global 429
    pub fn exhaust(&self, route: &Route, wait: Duration) {
        let bucket = self.bucket(route);
        bucket.state.lock().exhaust_for(wait, Instant::now());
    }

    /// Close the global gate for `wait`
    ///
    /// A later deadline already in place is kept.
    pub fn set_global(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut global = self.global_until.lock();
        if global.is_none_or(|current| current < until) {
            warn!(wait_ms = wait.as_millis() as u64, "global rate limit hit");
            *global = Some(until);
        }
    }

    /// Remaining time the global gate stays closed
    pub fn global_remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.global_until
            .lock()
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    pub fn snapshot(&self, route: &Route) -> BucketSnapshot {
        let bucket = self.bucket(route);
        let state = bucket.state.lock().clone();
        let now = Instant::now();
        BucketSnapshot {
            key: bucket.key.clone(),
            limit: state.limit,
            remaining: state.remaining,
            reset_after: state
                .reset_at
                .filter(|at| *at > now)
                .map(|at| at - now),
            global: self.global_remaining().is_some(),
        }
    }

    async fn wait_global(&self) {
        loop {
            let until = *self.global_until.lock();
            match until {
                Some(until) if until > Instant::now() => sleep_until(until).await,
                _ => return,
            }
        }
    }

    fn bucket_key(&self, route: &Route) -> String {
        let route_key = route.key();
        let base = self
            .route_buckets
            .get(&route_key)
            .map_or(route_key, |hash| hash.clone());
        match route.major {
            Some(major) => format!("{base}:{major}"),
            None => base,
        }
    }

    fn bucket(&self, route: &Route) -> Arc<Bucket> {
        self.sweep_idle();
        let key = self.bucket_key(route);
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Bucket::new(key)))
            .clone()
    }

    /// Drop buckets whose window has passed and that no caller holds
    ///
    /// A caller inside `acquire` keeps its `Arc`, so queued waiters pin their bucket.
    fn sweep_idle(&self) {
        let now = Instant::now();
        {
            let mut next = self.next_sweep.lock();
            match *next {
                Some(at) if at > now => return,
                Some(_) => *next = Some(now + SWEEP_INTERVAL),
                None => {
                    *next = Some(now + SWEEP_INTERVAL);
                    return;
                }
            }
        }

        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| Arc::strong_count(bucket) > 1 || !bucket.state.lock().is_idle(now));
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "dropped idle buckets");
        }
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
