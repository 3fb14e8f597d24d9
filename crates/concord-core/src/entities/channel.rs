//! Channel entity - a tagged variant over the channel types the gateway sends

use serde::{Deserialize, Serialize};

use super::User;
use crate::value_objects::Snowflake;

/// Fields shared by text-like channels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextChannel {
    pub topic: Option<String>,
    pub nsfw: bool,
    pub rate_limit_per_user: u32,
    pub last_message_id: Option<Snowflake>,
}

/// Fields shared by voice-like channels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceChannel {
    pub bitrate: u32,
    pub user_limit: u32,
    pub rtc_region: Option<String>,
}

/// Type-specific channel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    Text(TextChannel),
    DirectMessage { recipients: Vec<User> },
    Voice(VoiceChannel),
    Group {
        recipients: Vec<User>,
        owner_id: Option<Snowflake>,
    },
    Category,
    News(TextChannel),
    Store,
    Stage(VoiceChannel),
    /// Any type this client does not model; the raw type number is kept
    Unknown(u8),
}

impl ChannelKind {
    /// Wire type number
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Text(_) => 0,
            Self::DirectMessage { .. } => 1,
            Self::Voice(_) => 2,
            Self::Group { .. } => 3,
            Self::Category => 4,
            Self::News(_) => 5,
            Self::Store => 6,
            Self::Stage(_) => 13,
            Self::Unknown(t) => *t,
        }
    }

    /// Get the type name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::DirectMessage { .. } => "direct_message",
            Self::Voice(_) => "voice",
            Self::Group { .. } => "group",
            Self::Category => "category",
            Self::News(_) => "news",
            Self::Store => "store",
            Self::Stage(_) => "stage",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Permission overwrite for a role (`kind` 0) or member (`kind` 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub allow: String,
    #[serde(default)]
    pub deny: String,
}

impl PermissionOverwrite {
    #[inline]
    pub fn is_role(&self) -> bool {
        self.kind == 0
    }
}

/// Channel entity
///
/// `guild_id` and `parent_id` are non-owning back-references resolved
/// through the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawChannel", into = "RawChannel")]
pub struct Channel {
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub name: Option<String>,
    pub position: Option<i32>,
    pub parent_id: Option<Snowflake>,
    pub permission_overwrites: Vec<PermissionOverwrite>,
    pub kind: ChannelKind,
}

impl Channel {
    /// Create a new guild text channel
    pub fn new_text(id: Snowflake, guild_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            guild_id: Some(guild_id),
            name: Some(name.into()),
            position: Some(0),
            parent_id: None,
            permission_overwrites: Vec::new(),
            kind: ChannelKind::Text(TextChannel::default()),
        }
    }

    /// Create a new DM channel
    pub fn new_dm(id: Snowflake, recipient: User) -> Self {
        Self {
            id,
            guild_id: None,
            name: None,
            position: None,
            parent_id: None,
            permission_overwrites: Vec::new(),
            kind: ChannelKind::DirectMessage {
                recipients: vec![recipient],
            },
        }
    }

    /// Check if this channel belongs to a guild
    #[inline]
    pub fn is_guild_channel(&self) -> bool {
        self.guild_id.is_some()
    }

    /// Topic of text-like channels
    pub fn topic(&self) -> Option<&str> {
        match &self.kind {
            ChannelKind::Text(t) | ChannelKind::News(t) => t.topic.as_deref(),
            _ => None,
        }
    }

    /// Recipients of private channels
    pub fn recipients(&self) -> &[User] {
        match &self.kind {
            ChannelKind::DirectMessage { recipients } | ChannelKind::Group { recipients, .. } => {
                recipients
            }
            _ => &[],
        }
    }

    /// Mention markup for message content
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Flat wire shape of a channel object
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChannel {
    id: Snowflake,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    permission_overwrites: Vec<PermissionOverwrite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    #[serde(default)]
    nsfw: bool,
    #[serde(default)]
    rate_limit_per_user: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_message_id: Option<Snowflake>,
    #[serde(default)]
    bitrate: u32,
    #[serde(default)]
    user_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rtc_region: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    recipients: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_id: Option<Snowflake>,
}

impl From<RawChannel> for Channel {
    fn from(raw: RawChannel) -> Self {
        let text = || TextChannel {
            topic: raw.topic.clone(),
            nsfw: raw.nsfw,
            rate_limit_per_user: raw.rate_limit_per_user,
            last_message_id: raw.last_message_id,
        };
        let voice = || VoiceChannel {
            bitrate: raw.bitrate,
            user_limit: raw.user_limit,
            rtc_region: raw.rtc_region.clone(),
        };

        let kind = match raw.kind {
            0 => ChannelKind::Text(text()),
            1 => ChannelKind::DirectMessage {
                recipients: raw.recipients.clone(),
            },
            2 => ChannelKind::Voice(voice()),
            3 => ChannelKind::Group {
                recipients: raw.recipients.clone(),
                owner_id: raw.owner_id,
            },
            4 => ChannelKind::Category,
            5 => ChannelKind::News(text()),
            6 => ChannelKind::Store,
            13 => ChannelKind::Stage(voice()),
            other => ChannelKind::Unknown(other),
        };

        Self {
            id: raw.id,
            guild_id: raw.guild_id,
            name: raw.name,
            position: raw.position,
            parent_id: raw.parent_id,
            permission_overwrites: raw.permission_overwrites,
            kind,
        }
    }
}

impl From<Channel> for RawChannel {
    fn from(channel: Channel) -> Self {
        let mut raw = RawChannel {
            id: channel.id,
            kind: channel.kind.type_id(),
            guild_id: channel.guild_id,
            name: channel.name,
            position: channel.position,
            parent_id: channel.parent_id,
            permission_overwrites: channel.permission_overwrites,
            topic: None,
            nsfw: false,
            rate_limit_per_user: 0,
            last_message_id: None,
            bitrate: 0,
            user_limit: 0,
            rtc_region: None,
            recipients: Vec::new(),
            owner_id: None,
        };

        match channel.kind {
            ChannelKind::Text(t) | ChannelKind::News(t) => {
                raw.topic = t.topic;
                raw.nsfw = t.nsfw;
                raw.rate_limit_per_user = t.rate_limit_per_user;
                raw.last_message_id = t.last_message_id;
            }
            ChannelKind::Voice(v) | ChannelKind::Stage(v) => {
                raw.bitrate = v.bitrate;
                raw.user_limit = v.user_limit;
                raw.rtc_region = v.rtc_region;
            }
            ChannelKind::DirectMessage { recipients } => raw.recipients = recipients,
            ChannelKind::Group {
                recipients,
                owner_id,
            } => {
                raw.recipients = recipients;
                raw.owner_id = owner_id;
            }
            ChannelKind::Category | ChannelKind::Store | ChannelKind::Unknown(_) => {}
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_channel_deserialize() {
        let channel: Channel = serde_json::from_str(
            r#"{"id":"41771983423143937","guild_id":"41771983423143937","name":"general",
                "type":0,"position":6,"permission_overwrites":[{"id":"1","type":0,"allow":"0","deny":"1024"}],
                "rate_limit_per_user":2,"nsfw":true,"topic":"24/7 chat about how to gank Mike #2",
                "last_message_id":"155117677105512449","parent_id":"399942396007890945"}"#,
        )
        .unwrap();
        assert!(channel.is_guild_channel());
        assert_eq!(channel.topic(), Some("24/7 chat about how to gank Mike #2"));
        assert_eq!(channel.parent_id, Some(Snowflake::new(399_942_396_007_890_945)));
        assert!(channel.permission_overwrites[0].is_role());
        match channel.kind {
            ChannelKind::Text(t) => {
                assert!(t.nsfw);
                assert_eq!(t.rate_limit_per_user, 2);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_voice_and_dm_channels() {
        let voice: Channel = serde_json::from_str(
            r#"{"id":"1","guild_id":"2","name":"Voice","type":2,"bitrate":64000,"user_limit":5}"#,
        )
        .unwrap();
        assert_eq!(
            voice.kind,
            ChannelKind::Voice(VoiceChannel {
                bitrate: 64000,
                user_limit: 5,
                rtc_region: None
            })
        );

        let dm: Channel = serde_json::from_str(
            r#"{"id":"3","type":1,"recipients":[{"id":"4","username":"nelly"}]}"#,
        )
        .unwrap();
        assert!(!dm.is_guild_channel());
        assert_eq!(dm.recipients().len(), 1);
        assert_eq!(dm.kind.name(), "direct_message");
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let channel: Channel = serde_json::from_str(r#"{"id":"1","type":15}"#).unwrap();
        assert_eq!(channel.kind, ChannelKind::Unknown(15));
        assert_eq!(channel.kind.type_id(), 15);
    }

    #[test]
    fn test_serialize_preserves_kind() {
        let channel = Channel::new_text(Snowflake::new(1), Snowflake::new(2), "general");
        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json["type"], 0);
        assert_eq!(json["name"], "general");
        let back: Channel = serde_json::from_value(json).unwrap();
        assert_eq!(back, channel);
    }
}
