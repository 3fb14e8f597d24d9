//! Guild entity - a community as held in the cache

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::events::{GuildCreate, GuildUpdate};
use crate::value_objects::Snowflake;

/// Cached guild
///
/// Channels, roles and members are stored in their own cache tables; the
/// guild keeps the id sets that tie them together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub owner_id: Snowflake,
    pub unavailable: bool,
    pub large: bool,
    pub member_count: Option<u64>,
    pub joined_at: Option<DateTime<Utc>>,
    pub channels: BTreeSet<Snowflake>,
    pub roles: BTreeSet<Snowflake>,
    pub members: BTreeSet<Snowflake>,
}

impl Guild {
    /// Create a new Guild
    pub fn new(id: Snowflake, name: impl Into<String>, owner_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            icon: None,
            description: None,
            owner_id,
            unavailable: false,
            large: false,
            member_count: None,
            joined_at: None,
            channels: BTreeSet::new(),
            roles: BTreeSet::new(),
            members: BTreeSet::new(),
        }
    }

    /// Placeholder for a guild listed in READY that has not streamed yet
    pub fn unavailable(id: Snowflake) -> Self {
        let mut guild = Self::new(id, String::new(), Snowflake::default());
        guild.unavailable = true;
        guild
    }

    /// Build the guild record from a GUILD_CREATE payload.
    ///
    /// Only the scalar fields are taken; relation sets are filled by the
    /// cache as it stores each child entity.
    pub fn from_create(payload: &GuildCreate) -> Self {
        Self {
            id: payload.id,
            name: payload.name.clone(),
            icon: payload.icon.clone(),
            description: payload.description.clone(),
            owner_id: payload.owner_id,
            unavailable: payload.unavailable.unwrap_or(false),
            large: payload.large,
            member_count: payload.member_count,
            joined_at: payload.joined_at,
            channels: BTreeSet::new(),
            roles: BTreeSet::new(),
            members: BTreeSet::new(),
        }
    }

    /// Apply a partial update. Fields absent from the payload are left untouched.
    pub fn apply(&mut self, update: &GuildUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(icon) = &update.icon {
            self.icon.clone_from(icon);
        }
        if let Some(description) = &update.description {
            self.description.clone_from(description);
        }
        if let Some(owner_id) = update.owner_id {
            self.owner_id = owner_id;
        }
    }

    /// Check if a user is the guild owner
    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }

    /// Get the guild icon URL if set
    pub fn icon_url(&self) -> Option<String> {
        self.icon
            .as_ref()
            .map(|hash| format!("/icons/{}/{}.png", self.id, hash))
    }
}
