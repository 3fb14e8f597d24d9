//! Gateway events
//!
//! - `DispatchEvent`: what the service sent, decoded from `(t, d)`
//! - `Event`: what user callbacks receive, after the cache has applied it

mod dispatch;
mod event;
mod payloads;

pub use dispatch::DispatchEvent;
pub use event::Event;
pub use payloads::{
    ApplicationInfo, GuildCreate, GuildUpdate, MemberAdd, MemberRemove, MemberUpdate,
    MembersChunk, MessageDelete, MessageDeleteBulk, MessageUpdate, PresenceUpdate,
    ReactionChange, ReactionClear, Ready, RoleDelete, RoleUpsert, TypingStart, UnavailableGuild,
    UserRef,
};
