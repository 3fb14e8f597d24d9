//! Dispatch events - the closed set of dispatch kinds, decoded once at the
//! frame boundary

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::payloads::{
    GuildCreate, GuildUpdate, MemberAdd, MemberRemove, MemberUpdate, MembersChunk,
    MessageDelete, MessageDeleteBulk, MessageUpdate, PresenceUpdate, ReactionChange,
    ReactionClear, Ready, RoleDelete, RoleUpsert, TypingStart, UnavailableGuild,
};
use crate::entities::{Channel, Message, User};
use crate::error::ModelError;

/// A decoded dispatch (opcode 0) payload
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    // =========================================================================
    // Session
    // =========================================================================
    Ready(Box<Ready>),
    Resumed,

    // =========================================================================
    // Guilds
    // =========================================================================
    GuildCreate(Box<GuildCreate>),
    GuildUpdate(Box<GuildUpdate>),
    GuildDelete(UnavailableGuild),

    // =========================================================================
    // Members
    // =========================================================================
    MemberAdd(Box<MemberAdd>),
    MemberRemove(MemberRemove),
    MemberUpdate(Box<MemberUpdate>),
    MembersChunk(MembersChunk),

    // =========================================================================
    // Channels
    // =========================================================================
    ChannelCreate(Box<Channel>),
    ChannelUpdate(Box<Channel>),
    ChannelDelete(Box<Channel>),

    // =========================================================================
    // Roles
    // =========================================================================
    RoleCreate(RoleUpsert),
    RoleUpdate(RoleUpsert),
    RoleDelete(RoleDelete),

    // =========================================================================
    // Messages
    // =========================================================================
    MessageCreate(Box<Message>),
    MessageUpdate(Box<MessageUpdate>),
    MessageDelete(MessageDelete),
    MessageDeleteBulk(MessageDeleteBulk),

    // =========================================================================
    // Reactions
    // =========================================================================
    ReactionAdd(Box<ReactionChange>),
    ReactionRemove(Box<ReactionChange>),
    ReactionRemoveAll(ReactionClear),
    ReactionRemoveEmoji(ReactionClear),

    // =========================================================================
    // Misc
    // =========================================================================
    TypingStart(Box<TypingStart>),
    PresenceUpdate(PresenceUpdate),
    UserUpdate(User),

    /// Dispatch kinds this client does not model
    Unknown { name: String, data: Value },
}

fn parse<T: DeserializeOwned>(name: &str, data: Value) -> Result<T, ModelError> {
    serde_json::from_value(data).map_err(|e| ModelError::decode(name, e))
}

impl DispatchEvent {
    /// Decode the `d` payload of a dispatch frame named `name` (the `t` field)
    pub fn decode(name: &str, data: Value) -> Result<Self, ModelError> {
        let event = match name {
            "READY" => Self::Ready(parse(name, data)?),
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate(parse(name, data)?),
            "GUILD_UPDATE" => Self::GuildUpdate(parse(name, data)?),
            "GUILD_DELETE" => Self::GuildDelete(parse(name, data)?),
            "GUILD_MEMBER_ADD" => Self::MemberAdd(parse(name, data)?),
            "GUILD_MEMBER_REMOVE" => Self::MemberRemove(parse(name, data)?),
            "GUILD_MEMBER_UPDATE" => Self::MemberUpdate(parse(name, data)?),
            "GUILD_MEMBERS_CHUNK" => Self::MembersChunk(parse(name, data)?),
            "CHANNEL_CREATE" => Self::ChannelCreate(parse(name, data)?),
            "CHANNEL_UPDATE" => Self::ChannelUpdate(parse(name, data)?),
            "CHANNEL_DELETE" => Self::ChannelDelete(parse(name, data)?),
            "GUILD_ROLE_CREATE" => Self::RoleCreate(parse(name, data)?),
            "GUILD_ROLE_UPDATE" => Self::RoleUpdate(parse(name, data)?),
            "GUILD_ROLE_DELETE" => Self::RoleDelete(parse(name, data)?),
            "MESSAGE_CREATE" => Self::MessageCreate(parse(name, data)?),
            "MESSAGE_UPDATE" => Self::MessageUpdate(parse(name, data)?),
            "MESSAGE_DELETE" => Self::MessageDelete(parse(name, data)?),
            "MESSAGE_DELETE_BULK" => Self::MessageDeleteBulk(parse(name, data)?),
            "MESSAGE_REACTION_ADD" => Self::ReactionAdd(parse(name, data)?),
            "MESSAGE_REACTION_REMOVE" => Self::ReactionRemove(parse(name, data)?),
            "MESSAGE_REACTION_REMOVE_ALL" => Self::ReactionRemoveAll(parse(name, data)?),
            "MESSAGE_REACTION_REMOVE_EMOJI" => Self::ReactionRemoveEmoji(parse(name, data)?),
            "TYPING_START" => Self::TypingStart(parse(name, data)?),
            "PRESENCE_UPDATE" => Self::PresenceUpdate(parse(name, data)?),
            "USER_UPDATE" => Self::UserUpdate(parse(name, data)?),
            _ => Self::Unknown {
                name: name.to_string(),
                data,
            },
        };
        Ok(event)
    }

    /// Get the wire event name
    pub fn name(&self) -> &str {
        match self {
            Self::Ready(_) => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate(_) => "GUILD_CREATE",
            Self::GuildUpdate(_) => "GUILD_UPDATE",
            Self::GuildDelete(_) => "GUILD_DELETE",
            Self::MemberAdd(_) => "GUILD_MEMBER_ADD",
            Self::MemberRemove(_) => "GUILD_MEMBER_REMOVE",
            Self::MemberUpdate(_) => "GUILD_MEMBER_UPDATE",
            Self::MembersChunk(_) => "GUILD_MEMBERS_CHUNK",
            Self::ChannelCreate(_) => "CHANNEL_CREATE",
            Self::ChannelUpdate(_) => "CHANNEL_UPDATE",
            Self::ChannelDelete(_) => "CHANNEL_DELETE",
            Self::RoleCreate(_) => "GUILD_ROLE_CREATE",
            Self::RoleUpdate(_) => "GUILD_ROLE_UPDATE",
            Self::RoleDelete(_) => "GUILD_ROLE_DELETE",
            Self::MessageCreate(_) => "MESSAGE_CREATE",
            Self::MessageUpdate(_) => "MESSAGE_UPDATE",
            Self::MessageDelete(_) => "MESSAGE_DELETE",
            Self::MessageDeleteBulk(_) => "MESSAGE_DELETE_BULK",
            Self::ReactionAdd(_) => "MESSAGE_REACTION_ADD",
            Self::ReactionRemove(_) => "MESSAGE_REACTION_REMOVE",
            Self::ReactionRemoveAll(_) => "MESSAGE_REACTION_REMOVE_ALL",
            Self::ReactionRemoveEmoji(_) => "MESSAGE_REACTION_REMOVE_EMOJI",
            Self::TypingStart(_) => "TYPING_START",
            Self::PresenceUpdate(_) => "PRESENCE_UPDATE",
            Self::UserUpdate(_) => "USER_UPDATE",
            Self::Unknown { name, .. } => name,
        }
    }

    /// Guild the event belongs to, if any
    pub fn guild_id(&self) -> Option<crate::Snowflake> {
        match self {
            Self::GuildCreate(g) => Some(g.id),
            Self::GuildUpdate(g) => Some(g.id),
            Self::GuildDelete(g) => Some(g.id),
            Self::MemberAdd(m) => Some(m.guild_id),
            Self::MemberRemove(m) => Some(m.guild_id),
            Self::MemberUpdate(m) => Some(m.guild_id),
            Self::MembersChunk(c) => Some(c.guild_id),
            Self::ChannelCreate(c) | Self::ChannelUpdate(c) | Self::ChannelDelete(c) => c.guild_id,
            Self::RoleCreate(r) | Self::RoleUpdate(r) => Some(r.guild_id),
            Self::RoleDelete(r) => Some(r.guild_id),
            Self::MessageCreate(m) => m.guild_id,
            Self::MessageUpdate(m) => m.guild_id,
            Self::MessageDelete(m) => m.guild_id,
            Self::MessageDeleteBulk(m) => m.guild_id,
            Self::ReactionAdd(r) | Self::ReactionRemove(r) => r.guild_id,
            Self::ReactionRemoveAll(r) | Self::ReactionRemoveEmoji(r) => r.guild_id,
            Self::TypingStart(t) => t.guild_id,
            Self::PresenceUpdate(p) => p.guild_id,
            Self::Ready(_) | Self::Resumed | Self::UserUpdate(_) | Self::Unknown { .. } => None,
        }
    }
}
