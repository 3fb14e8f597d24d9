//! # concord-cache
//!
//! In-memory store of guilds, channels, roles, members, users and recent
//! messages, mutated only by decoded gateway dispatches.
//!
//! ## Features
//!
//! - **Per-collection locking**: each table is its own `DashMap`, so shards
//!   touching unrelated guilds do not serialize on one lock
//! - **Snapshots**: `apply` returns the user-facing `Event` with `before`
//!   values cloned out of the cache
//! - **Intent awareness**: members are retained only with the members intent
//!   (the current user's own member is always kept)
//! - **Bounded message cache**: FIFO eviction past `max_messages`
//!
//! ## Example
//!
//! ```ignore
//! use concord_cache::EntityCache;
//!
//! let cache = EntityCache::new(intents, 1000);
//! let event = cache.apply(dispatch);
//! if let Some(guild) = cache.guild(guild_id) { /* ... */ }
//! ```

mod apply;
mod entity_cache;
mod message_store;

pub use entity_cache::{CacheStats, EntityCache};
