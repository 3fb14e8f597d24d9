//! Message entity - a chat message and its reaction counts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::events::MessageUpdate;
use crate::value_objects::Snowflake;

/// Emoji reference used by reactions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

impl Emoji {
    /// Unicode emoji
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            animated: false,
        }
    }

    /// Two emoji are the same reaction if custom ids match, or for unicode
    /// emoji if the names match
    pub fn same_as(&self, other: &Emoji) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name == other.name,
            _ => false,
        }
    }
}

/// Aggregated reaction count on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub count: u32,
    #[serde(default)]
    pub me: bool,
    pub emoji: Emoji,
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Create a new Message
    pub fn new(
        id: Snowflake,
        channel_id: Snowflake,
        author: User,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author,
            content: content.into(),
            timestamp: id.created_at(),
            edited_timestamp: None,
            tts: false,
            mention_everyone: false,
            mentions: Vec::new(),
            pinned: false,
            kind: 0,
            reactions: Vec::new(),
        }
    }

    /// Check if message has been edited
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    /// Check if message was sent in a guild
    #[inline]
    pub fn is_guild_message(&self) -> bool {
        self.guild_id.is_some()
    }

    /// Apply a partial update. Fields absent from the payload are left untouched.
    pub fn apply(&mut self, update: &MessageUpdate) {
        if let Some(content) = &update.content {
            self.content.clone_from(content);
        }
        if let Some(edited) = update.edited_timestamp {
            self.edited_timestamp = edited;
        }
        if let Some(pinned) = update.pinned {
            self.pinned = pinned;
        }
        if let Some(mentions) = &update.mentions {
            self.mentions.clone_from(mentions);
        }
        if let Some(mention_everyone) = update.mention_everyone {
            self.mention_everyone = mention_everyone;
        }
    }

    /// Count a reaction. `me` marks reactions added by the current user.
    pub fn add_reaction(&mut self, emoji: &Emoji, me: bool) {
        if let Some(reaction) = self.reactions.iter_mut().find(|r| r.emoji.same_as(emoji)) {
            reaction.count += 1;
            reaction.me |= me;
        } else {
            self.reactions.push(Reaction {
                count: 1,
                me,
                emoji: emoji.clone(),
            });
        }
    }

    /// Uncount a reaction, dropping it once its count reaches zero
    pub fn remove_reaction(&mut self, emoji: &Emoji, me: bool) {
        if let Some(pos) = self.reactions.iter().position(|r| r.emoji.same_as(emoji)) {
            let reaction = &mut self.reactions[pos];
            reaction.count = reaction.count.saturating_sub(1);
            if me {
                reaction.me = false;
            }
            if reaction.count == 0 {
                self.reactions.remove(pos);
            }
        }
    }

    /// Remove every reaction, or every reaction of one emoji
    pub fn clear_reactions(&mut self, emoji: Option<&Emoji>) {
        match emoji {
            Some(emoji) => self.reactions.retain(|r| !r.emoji.same_as(emoji)),
            None => self.reactions.clear(),
        }
    }

    /// Get a truncated preview of the message
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }
}
