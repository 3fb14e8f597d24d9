//! Per-route rate limiting with a global gate

mod bucket;
mod headers;
mod limiter;

pub use bucket::BucketSnapshot;
pub use headers::{RateLimitBody, RateLimitHeaders};
pub use limiter::RateLimiter;

pub(crate) use headers::seconds;
