//! Test fixtures and payload generators
//!
//! Provides the JSON bodies the fake servers send.

use serde_json::{json, Value};

/// Dispatch data of READY
pub fn ready(session_id: &str, resume_url: &str, unavailable_guilds: &[u64]) -> Value {
    let guilds: Vec<Value> = unavailable_guilds
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    json!({
        "v": 10,
        "user": {"id": "1", "username": "concord", "bot": true},
        "guilds": guilds,
        "session_id": session_id,
        "resume_gateway_url": resume_url
    })
}

/// Dispatch data of GUILD_CREATE for an empty guild
pub fn guild_create(id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "owner_id": "1",
        "channels": [],
        "roles": []
    })
}

/// A message object, as both MESSAGE_CREATE data and the REST response
pub fn message(id: u64, channel_id: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "author": {"id": "2", "username": "someone"},
        "content": content,
        "timestamp": "2024-01-01T00:00:00+00:00"
    })
}

pub fn user(id: u64, username: &str) -> Value {
    json!({"id": id.to_string(), "username": username})
}

/// Body of `GET /gateway/bot`
pub fn gateway_bot(url: &str, shards: u32, max_concurrency: u32) -> Value {
    json!({
        "url": url,
        "shards": shards,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 14_400_000,
            "max_concurrency": max_concurrency
        }
    })
}

/// Body of a 429 response
pub fn rate_limited(retry_after: f64, global: bool) -> Value {
    json!({
        "message": "You are being rate limited.",
        "retry_after": retry_after,
        "global": global
    })
}
