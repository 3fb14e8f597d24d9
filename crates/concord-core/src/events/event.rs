//! User-facing events - dispatches after they have been applied to the cache
//!
//! Update-shaped events carry a `before` snapshot taken from the cache
//! (absent when the entity was not cached) and the `after` value.

use serde_json::Value;

use super::payloads::{
    MembersChunk, MessageUpdate, PresenceUpdate, ReactionChange, ReactionClear, TypingStart,
};
use crate::entities::{Channel, Guild, Member, Message, Role, User};
use crate::value_objects::Snowflake;

/// Event delivered to user callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // =========================================================================
    // Lifecycle
    // =========================================================================
    Ready {
        user: User,
        session_id: String,
        guilds: Vec<Snowflake>,
    },
    Resumed,
    /// Every guild listed in READY has arrived, or the wait timed out
    ShardReady {
        shard_id: u32,
        unavailable_guilds: Vec<Snowflake>,
    },
    /// Fired once, when every shard has reached `ShardReady` for the first time
    AllShardsReady {
        shard_count: u32,
    },

    // =========================================================================
    // Guilds
    // =========================================================================
    /// A guild from READY, or one recovering from an outage
    GuildAvailable(Box<Guild>),
    /// The client joined a new guild
    GuildJoin(Box<Guild>),
    GuildUpdate {
        before: Option<Box<Guild>>,
        after: Box<Guild>,
    },
    /// Outage: the cached data is kept and marked unavailable
    GuildUnavailable {
        guild_id: Snowflake,
    },
    /// The client left or was removed; `guild` is the last cached state
    GuildRemove {
        guild_id: Snowflake,
        guild: Option<Box<Guild>>,
    },

    // =========================================================================
    // Members
    // =========================================================================
    MemberAdd {
        member: Member,
        user: User,
    },
    MemberRemove {
        guild_id: Snowflake,
        user: User,
        member: Option<Member>,
    },
    MemberUpdate {
        before: Option<Member>,
        after: Member,
        user: User,
    },
    MembersChunk(MembersChunk),

    // =========================================================================
    // Channels
    // =========================================================================
    ChannelCreate(Box<Channel>),
    ChannelUpdate {
        before: Option<Box<Channel>>,
        after: Box<Channel>,
    },
    ChannelDelete(Box<Channel>),

    // =========================================================================
    // Roles
    // =========================================================================
    RoleCreate(Role),
    RoleUpdate {
        before: Option<Role>,
        after: Role,
    },
    RoleDelete {
        guild_id: Snowflake,
        role_id: Snowflake,
        role: Option<Role>,
    },

    // =========================================================================
    // Messages
    // =========================================================================
    MessageCreate(Box<Message>),
    /// `after` is present when the message was cached
    MessageUpdate {
        before: Option<Box<Message>>,
        after: Option<Box<Message>>,
        update: Box<MessageUpdate>,
    },
    MessageDelete {
        channel_id: Snowflake,
        message_id: Snowflake,
        message: Option<Box<Message>>,
    },
    MessageDeleteBulk {
        channel_id: Snowflake,
        ids: Vec<Snowflake>,
        messages: Vec<Message>,
    },

    // =========================================================================
    // Reactions
    // =========================================================================
    ReactionAdd {
        reaction: Box<ReactionChange>,
        message: Option<Box<Message>>,
    },
    ReactionRemove {
        reaction: Box<ReactionChange>,
        message: Option<Box<Message>>,
    },
    ReactionClear {
        clear: ReactionClear,
        message: Option<Box<Message>>,
    },

    // =========================================================================
    // Misc
    // =========================================================================
    TypingStart(Box<TypingStart>),
    PresenceUpdate(PresenceUpdate),
    UserUpdate {
        before: Option<User>,
        after: User,
    },
    Unknown {
        name: String,
        data: Value,
    },
}

impl Event {
    /// Get the event type name
    pub fn name(&self) -> &str {
        match self {
            Self::Ready { .. } => "READY",
            Self::Resumed => "RESUMED",
            Self::ShardReady { .. } => "SHARD_READY",
            Self::AllShardsReady { .. } => "ALL_SHARDS_READY",
            Self::GuildAvailable(_) => "GUILD_AVAILABLE",
            Self::GuildJoin(_) => "GUILD_JOIN",
            Self::GuildUpdate { .. } => "GUILD_UPDATE",
            Self::GuildUnavailable { .. } => "GUILD_UNAVAILABLE",
            Self::GuildRemove { .. } => "GUILD_REMOVE",
            Self::MemberAdd { .. } => "MEMBER_ADD",
            Self::MemberRemove { .. } => "MEMBER_REMOVE",
            Self::MemberUpdate { .. } => "MEMBER_UPDATE",
            Self::MembersChunk(_) => "MEMBERS_CHUNK",
            Self::ChannelCreate(_) => "CHANNEL_CREATE",
            Self::ChannelUpdate { .. } => "CHANNEL_UPDATE",
            Self::ChannelDelete(_) => "CHANNEL_DELETE",
            Self::RoleCreate(_) => "ROLE_CREATE",
            Self::RoleUpdate { .. } => "ROLE_UPDATE",
            Self::RoleDelete { .. } => "ROLE_DELETE",
            Self::MessageCreate(_) => "MESSAGE_CREATE",
            Self::MessageUpdate { .. } => "MESSAGE_UPDATE",
            Self::MessageDelete { .. } => "MESSAGE_DELETE",
            Self::MessageDeleteBulk { .. } => "MESSAGE_DELETE_BULK",
            Self::ReactionAdd { .. } => "REACTION_ADD",
            Self::ReactionRemove { .. } => "REACTION_REMOVE",
            Self::ReactionClear { .. } => "REACTION_CLEAR",
            Self::TypingStart(_) => "TYPING_START",
            Self::PresenceUpdate(_) => "PRESENCE_UPDATE",
            Self::UserUpdate { .. } => "USER_UPDATE",
            Self::Unknown { name, .. } => name,
        }
    }

    /// Check if this is a lifecycle event produced by the client itself
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Ready { .. }
                | Self::Resumed
                | Self::ShardReady { .. }
                | Self::AllShardsReady { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::Resumed.name(), "RESUMED");
        assert_eq!(
            Event::GuildUnavailable {
                guild_id: Snowflake::new(1)
            }
            .name(),
            "GUILD_UNAVAILABLE"
        );
        let unknown = Event::Unknown {
            name: "VOICE_STATE_UPDATE".to_string(),
            data: Value::Null,
        };
        assert_eq!(unknown.name(), "VOICE_STATE_UPDATE");
    }

    #[test]
    fn test_lifecycle_classification() {
        assert!(Event::AllShardsReady { shard_count: 2 }.is_lifecycle());
        assert!(!Event::RoleCreate(Role::new(
            Snowflake::new(1),
            Snowflake::new(2),
            "mods"
        ))
        .is_lifecycle());
    }
}
