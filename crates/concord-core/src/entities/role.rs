//! Role entity - a guild role

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Guild role
///
/// `guild_id` is not part of the wire object; the cache fills it in from
/// the enclosing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default)]
    pub guild_id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    /// Permission bitset as sent by the service (decimal string)
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    /// Create a new Role
    pub fn new(id: Snowflake, guild_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            guild_id,
            name: name.into(),
            color: 0,
            hoist: false,
            position: 0,
            permissions: "0".to_string(),
            managed: false,
            mentionable: false,
        }
    }

    /// Attach the owning guild
    pub fn in_guild(mut self, guild_id: Snowflake) -> Self {
        self.guild_id = guild_id;
        self
    }

    /// The @everyone role shares its id with the guild
    #[inline]
    pub fn is_everyone(&self) -> bool {
        self.id == self.guild_id
    }

    /// Permission bits, or 0 if the string is malformed
    pub fn permission_bits(&self) -> u64 {
        self.permissions.parse().unwrap_or(0)
    }

    /// Mention markup for message content
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}
