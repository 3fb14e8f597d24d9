//! # concord-http
//!
//! REST client whose every call passes through a shared rate-limit governor.
//!
//! - `Route`: method, route template and major parameter of a call
//! - `RateLimiter`: per-bucket gates plus a global gate, shared by every caller
//! - `HttpClient`: `reqwest`-based client that waits on the limiter, records
//!   response headers, and retries 429 and 502/503/504 up to a ceiling

mod client;
mod error;
mod models;
pub mod ratelimit;
mod route;

pub use client::HttpClient;
pub use error::{HttpError, HttpResult};
pub use models::{CreateMessage, GatewayBot, MessageReference, SessionStartLimit};
pub use ratelimit::{BucketSnapshot, RateLimitHeaders, RateLimiter};
pub use route::Route;
