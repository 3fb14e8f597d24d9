//! Member entity - a user's membership in a guild

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::events::MemberUpdate;
use crate::value_objects::Snowflake;

/// Guild member as sent on the wire (the `user` object is embedded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberData {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub communication_disabled_until: Option<DateTime<Utc>>,
}

/// Cached guild member
///
/// The user is referenced by id only; the user record lives in the cache's
/// user table and is shared between guilds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub nick: Option<String>,
    pub avatar: Option<String>,
    pub roles: Vec<Snowflake>,
    pub joined_at: Option<DateTime<Utc>>,
    pub deaf: bool,
    pub mute: bool,
    pub pending: bool,
    pub communication_disabled_until: Option<DateTime<Utc>>,
}

impl Member {
    /// Create a new Member with no roles
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            guild_id,
            user_id,
            nick: None,
            avatar: None,
            roles: Vec::new(),
            joined_at: None,
            deaf: false,
            mute: false,
            pending: false,
            communication_disabled_until: None,
        }
    }

    /// Build from a wire member. Returns `None` when the payload carries no user.
    pub fn from_data(guild_id: Snowflake, data: &MemberData) -> Option<Self> {
        let user_id = data.user.as_ref()?.id;
        Some(Self::from_data_with_user(guild_id, user_id, data))
    }

    /// Build from a wire member whose user is known out of band
    pub fn from_data_with_user(guild_id: Snowflake, user_id: Snowflake, data: &MemberData) -> Self {
        Self {
            guild_id,
            user_id,
            nick: data.nick.clone(),
            avatar: data.avatar.clone(),
            roles: data.roles.clone(),
            joined_at: data.joined_at,
            deaf: data.deaf,
            mute: data.mute,
            pending: data.pending,
            communication_disabled_until: data.communication_disabled_until,
        }
    }

    /// Apply a partial update. Fields absent from the payload are left untouched.
    pub fn apply(&mut self, update: &MemberUpdate) {
        if let Some(roles) = &update.roles {
            self.roles.clone_from(roles);
        }
        if let Some(nick) = &update.nick {
            self.nick.clone_from(nick);
        }
        if let Some(avatar) = &update.avatar {
            self.avatar.clone_from(avatar);
        }
        if let Some(joined_at) = update.joined_at {
            self.joined_at = joined_at;
        }
        if let Some(deaf) = update.deaf {
            self.deaf = deaf;
        }
        if let Some(mute) = update.mute {
            self.mute = mute;
        }
        if let Some(pending) = update.pending {
            self.pending = pending;
        }
        if let Some(until) = update.communication_disabled_until {
            self.communication_disabled_until = until;
        }
    }

    /// Get display name (nickname if set, otherwise fallback)
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.nick.as_deref().unwrap_or(username)
    }

    /// Check if member has a specific role
    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }

    /// Whether the member is timed out at the given instant
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.communication_disabled_until
            .is_some_and(|until| until > now)
    }
}
