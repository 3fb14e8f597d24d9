//! Entity cache tables and read access
//!
//! Every read returns an owned clone; no lock guard ever leaves this module.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use concord_core::{Channel, Guild, Intents, Member, Message, Role, Snowflake, User};

use crate::message_store::MessageStore;

/// Shared, concurrently readable store of gateway entities
///
/// Mutated only through [`EntityCache::apply`], which the event dispatcher
/// calls once per dispatch in sequence order.
pub struct EntityCache {
    pub(crate) intents: Intents,
    pub(crate) guilds: DashMap<Snowflake, Guild>,
    pub(crate) channels: DashMap<Snowflake, Channel>,
    pub(crate) roles: DashMap<Snowflake, Role>,
    /// Keyed by (guild id, user id)
    pub(crate) members: DashMap<(Snowflake, Snowflake), Member>,
    pub(crate) users: DashMap<Snowflake, User>,
    pub(crate) messages: Mutex<MessageStore>,
    pub(crate) current_user: RwLock<Option<User>>,
}

/// Entry counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub channels: usize,
    pub roles: usize,
    pub members: usize,
    pub users: usize,
    pub messages: usize,
}

impl EntityCache {
    /// Create an empty cache
    #[must_use]
    pub fn new(intents: Intents, max_messages: usize) -> Self {
        Self {
            intents,
            guilds: DashMap::new(),
            channels: DashMap::new(),
            roles: DashMap::new(),
            members: DashMap::new(),
            users: DashMap::new(),
            messages: Mutex::new(MessageStore::new(max_messages)),
            current_user: RwLock::new(None),
        }
    }

    /// Intents the cache was configured with
    pub fn intents(&self) -> Intents {
        self.intents
    }

    // === Guilds ===

    pub fn guild(&self, id: Snowflake) -> Option<Guild> {
        self.guilds.get(&id).map(|g| g.clone())
    }

    pub fn guilds(&self) -> Vec<Guild> {
        self.guilds.iter().map(|g| g.value().clone()).collect()
    }

    pub fn guild_ids(&self) -> Vec<Snowflake> {
        self.guilds.iter().map(|g| *g.key()).collect()
    }

    /// Guilds currently marked unavailable (outage or not yet streamed)
    pub fn unavailable_guilds(&self) -> Vec<Snowflake> {
        self.guilds
            .iter()
            .filter(|g| g.unavailable)
            .map(|g| *g.key())
            .collect()
    }

    pub fn is_unavailable(&self, id: Snowflake) -> bool {
        self.guilds.get(&id).is_some_and(|g| g.unavailable)
    }

    // === Channels ===

    pub fn channel(&self, id: Snowflake) -> Option<Channel> {
        self.channels.get(&id).map(|c| c.clone())
    }

    pub fn guild_channels(&self, guild_id: Snowflake) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|c| c.guild_id == Some(guild_id))
            .map(|c| c.value().clone())
            .collect()
    }

    // === Roles ===

    pub fn role(&self, id: Snowflake) -> Option<Role> {
        self.roles.get(&id).map(|r| r.clone())
    }

    pub fn guild_roles(&self, guild_id: Snowflake) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .roles
            .iter()
            .filter(|r| r.guild_id == guild_id)
            .map(|r| r.value().clone())
            .collect();
        roles.sort_by_key(|r| (r.position, r.id));
        roles
    }

    // === Members and users ===

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.members.get(&(guild_id, user_id)).map(|m| m.clone())
    }

    pub fn guild_members(&self, guild_id: Snowflake) -> Vec<Member> {
        self.members
            .iter()
            .filter(|m| m.key().0 == guild_id)
            .map(|m| m.value().clone())
            .collect()
    }

    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    /// The account this client is logged in as, known after READY
    pub fn current_user(&self) -> Option<User> {
        self.current_user.read().clone()
    }

    pub(crate) fn current_user_id(&self) -> Option<Snowflake> {
        self.current_user.read().as_ref().map(|u| u.id)
    }

    /// Members are retained with the members intent; the current user's
    /// own member record is always retained
    pub(crate) fn retains_member(&self, user_id: Snowflake) -> bool {
        self.intents.caches_members() || self.current_user_id() == Some(user_id)
    }

    // === Messages ===

    pub fn message(&self, id: Snowflake) -> Option<Message> {
        self.messages.lock().get(id).cloned()
    }

    /// Cached messages of a channel, oldest first
    pub fn channel_messages(&self, channel_id: Snowflake) -> Vec<Message> {
        self.messages.lock().in_channel(channel_id)
    }

    // === Maintenance ===

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            guilds: self.guilds.len(),
            channels: self.channels.len(),
            roles: self.roles.len(),
            members: self.members.len(),
            users: self.users.len(),
            messages: self.messages.lock().len(),
        }
    }

    /// Drop everything, e.g. before a fresh login
    pub fn clear(&self) {
        self.guilds.clear();
        self.channels.clear();
        self.roles.clear();
        self.members.clear();
        self.users.clear();
        self.messages.lock().clear();
        *self.current_user.write() = None;
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("intents", &self.intents)
            .field("stats", &self.stats())
            .finish()
    }
}
