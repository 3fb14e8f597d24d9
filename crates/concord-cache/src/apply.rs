//! Applying dispatches to the cache
//!
//! Lock discipline: at most one table guard is held at a time, and never
//! across a write to the same table.

use std::collections::HashSet;

use concord_core::events::{
    GuildCreate, GuildUpdate, MemberAdd, MemberRemove, MemberUpdate, MembersChunk, MessageDelete,
    MessageDeleteBulk, MessageUpdate, ReactionChange, ReactionClear, Ready, RoleDelete,
    RoleUpsert, UnavailableGuild,
};
use concord_core::{
    Channel, ChannelKind, DispatchEvent, Event, Guild, Member, MemberData, Message, Snowflake,
    User,
};

use crate::entity_cache::EntityCache;

impl EntityCache {
    /// Apply one dispatch and return the event for user callbacks.
    ///
    /// Update-shaped events carry a `before` snapshot cloned out of the
    /// cache prior to mutation.
    pub fn apply(&self, event: DispatchEvent) -> Event {
        match event {
            DispatchEvent::Ready(ready) => self.on_ready(*ready),
            DispatchEvent::Resumed => Event::Resumed,
            DispatchEvent::GuildCreate(guild) => self.on_guild_create(*guild),
            DispatchEvent::GuildUpdate(update) => self.on_guild_update(&update),
            DispatchEvent::GuildDelete(guild) => self.on_guild_delete(guild),
            DispatchEvent::MemberAdd(add) => self.on_member_add(*add),
            DispatchEvent::MemberRemove(remove) => self.on_member_remove(remove),
            DispatchEvent::MemberUpdate(update) => self.on_member_update(*update),
            DispatchEvent::MembersChunk(chunk) => self.on_members_chunk(chunk),
            DispatchEvent::ChannelCreate(channel) => self.on_channel_create(*channel),
            DispatchEvent::ChannelUpdate(channel) => self.on_channel_update(*channel),
            DispatchEvent::ChannelDelete(channel) => self.on_channel_delete(*channel),
            DispatchEvent::RoleCreate(upsert) => self.on_role_create(upsert),
            DispatchEvent::RoleUpdate(upsert) => self.on_role_update(upsert),
            DispatchEvent::RoleDelete(delete) => self.on_role_delete(delete),
            DispatchEvent::MessageCreate(message) => self.on_message_create(*message),
            DispatchEvent::MessageUpdate(update) => self.on_message_update(update),
            DispatchEvent::MessageDelete(delete) => self.on_message_delete(delete),
            DispatchEvent::MessageDeleteBulk(bulk) => self.on_message_delete_bulk(bulk),
            DispatchEvent::ReactionAdd(change) => self.on_reaction(change, true),
            DispatchEvent::ReactionRemove(change) => self.on_reaction(change, false),
            DispatchEvent::ReactionRemoveAll(clear) | DispatchEvent::ReactionRemoveEmoji(clear) => {
                self.on_reaction_clear(clear)
            }
            DispatchEvent::TypingStart(typing) => Event::TypingStart(typing),
            DispatchEvent::PresenceUpdate(presence) => Event::PresenceUpdate(presence),
            DispatchEvent::UserUpdate(user) => self.on_user_update(user),
            DispatchEvent::Unknown { name, data } => Event::Unknown { name, data },
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    fn on_ready(&self, ready: Ready) -> Event {
        *self.current_user.write() = Some(ready.user.clone());
        self.users.insert(ready.user.id, ready.user.clone());

        let mut guild_ids = Vec::with_capacity(ready.guilds.len());
        for stub in &ready.guilds {
            // Known guilds are resent as GUILD_CREATE; until then they are stale
            self.guilds
                .entry(stub.id)
                .and_modify(|g| g.unavailable = true)
                .or_insert_with(|| Guild::unavailable(stub.id));
            guild_ids.push(stub.id);
        }

        tracing::debug!(
            user_id = %ready.user.id,
            guilds = guild_ids.len(),
            "Cache primed from READY"
        );

        Event::Ready {
            user: ready.user,
            session_id: ready.session_id,
            guilds: guild_ids,
        }
    }

    fn on_user_update(&self, user: User) -> Event {
        let before = self.current_user.write().replace(user.clone());
        self.users.insert(user.id, user.clone());
        Event::UserUpdate {
            before,
            after: user,
        }
    }

    // =========================================================================
    // Guilds
    // =========================================================================

    fn on_guild_create(&self, payload: GuildCreate) -> Event {
        let guild_id = payload.id;
        let known = self.guilds.contains_key(&guild_id);

        if payload.unavailable == Some(true) {
            self.mark_unavailable(guild_id);
            return Event::GuildUnavailable { guild_id };
        }

        // A resync replaces whatever children were cached before the outage
        if known {
            self.purge_children(guild_id);
        }

        let mut guild = Guild::from_create(&payload);

        for mut channel in payload.channels {
            if channel.guild_id.is_none() {
                channel.guild_id = Some(guild_id);
            }
            guild.channels.insert(channel.id);
            self.channels.insert(channel.id, channel);
        }

        for role in payload.roles {
            let role = role.in_guild(guild_id);
            guild.roles.insert(role.id);
            self.roles.insert(role.id, role);
        }

        for data in &payload.members {
            if let Some(member) = self.store_member(guild_id, data) {
                guild.members.insert(member.user_id);
            }
        }

        tracing::debug!(
            guild_id = %guild_id,
            channels = guild.channels.len(),
            roles = guild.roles.len(),
            members = guild.members.len(),
            "Guild cached"
        );

        self.guilds.insert(guild_id, guild.clone());

        if known {
            Event::GuildAvailable(Box::new(guild))
        } else {
            Event::GuildJoin(Box::new(guild))
        }
    }

    fn on_guild_update(&self, update: &GuildUpdate) -> Event {
        let mut snapshot = None;
        if let Some(mut guild) = self.guilds.get_mut(&update.id) {
            let before = guild.clone();
            guild.apply(update);
            snapshot = Some((before, guild.clone()));
        }

        match snapshot {
            Some((before, after)) => Event::GuildUpdate {
                before: Some(Box::new(before)),
                after: Box::new(after),
            },
            None => {
                // Not cached: report the payload without creating the guild
                let mut after = Guild::new(update.id, String::new(), Snowflake::default());
                after.apply(update);
                Event::GuildUpdate {
                    before: None,
                    after: Box::new(after),
                }
            }
        }
    }

    fn on_guild_delete(&self, stub: UnavailableGuild) -> Event {
        if stub.unavailable == Some(true) {
            self.mark_unavailable(stub.id);
            return Event::GuildUnavailable { guild_id: stub.id };
        }

        let guild = self.guilds.remove(&stub.id).map(|(_, g)| g);
        self.purge_children(stub.id);

        tracing::debug!(guild_id = %stub.id, cached = guild.is_some(), "Guild removed");

        Event::GuildRemove {
            guild_id: stub.id,
            guild: guild.map(Box::new),
        }
    }

    fn mark_unavailable(&self, guild_id: Snowflake) {
        if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
            guild.unavailable = true;
        }
    }

    /// Remove every channel, role, member and message that belongs to a guild
    fn purge_children(&self, guild_id: Snowflake) {
        let mut channel_ids = Vec::new();
        self.channels.retain(|id, c| {
            let owned = c.guild_id == Some(guild_id);
            if owned {
                channel_ids.push(*id);
            }
            !owned
        });
        self.roles.retain(|_, r| r.guild_id != guild_id);
        let mut user_ids = Vec::new();
        self.members.retain(|(g, user_id), _| {
            let owned = *g == guild_id;
            if owned {
                user_ids.push(*user_id);
            }
            !owned
        });
        self.release_users(&user_ids);
        self.messages.lock().remove_where(|m| {
            m.guild_id == Some(guild_id) || channel_ids.contains(&m.channel_id)
        });
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Drop user records no remaining membership refers to, except our own
    fn release_users(&self, user_ids: &[Snowflake]) {
        if user_ids.is_empty() {
            return;
        }
        let current = self.current_user_id();
        let referenced: HashSet<Snowflake> = self.members.iter().map(|e| e.key().1).collect();
        for user_id in user_ids {
            if Some(*user_id) != current && !referenced.contains(user_id) {
                self.users.remove(user_id);
            }
        }
    }

    /// Store a wire member if the intents allow it; returns the member either way
    fn store_member(&self, guild_id: Snowflake, data: &MemberData) -> Option<Member> {
        let user = data.user.as_ref()?;
        let member = Member::from_data_with_user(guild_id, user.id, data);
        if self.retains_member(user.id) {
            self.users.insert(user.id, user.clone());
            self.members.insert((guild_id, user.id), member.clone());
            Some(member)
        } else {
            None
        }
    }

    fn on_member_add(&self, add: MemberAdd) -> Event {
        let Some(user) = add.member.user.clone() else {
            tracing::warn!(guild_id = %add.guild_id, "GUILD_MEMBER_ADD without user");
            return unknown("GUILD_MEMBER_ADD", &add);
        };
        let member = Member::from_data_with_user(add.guild_id, user.id, &add.member);

        let stored = self.store_member(add.guild_id, &add.member).is_some();
        if let Some(mut guild) = self.guilds.get_mut(&add.guild_id) {
            if stored {
                guild.members.insert(user.id);
            }
            guild.member_count = guild.member_count.map(|c| c + 1);
        }

        Event::MemberAdd { member, user }
    }

    fn on_member_remove(&self, remove: MemberRemove) -> Event {
        let member = self
            .members
            .remove(&(remove.guild_id, remove.user.id))
            .map(|(_, m)| m);
        if let Some(mut guild) = self.guilds.get_mut(&remove.guild_id) {
            guild.members.remove(&remove.user.id);
            guild.member_count = guild.member_count.map(|c| c.saturating_sub(1));
        }
        self.release_users(&[remove.user.id]);

        Event::MemberRemove {
            guild_id: remove.guild_id,
            user: remove.user,
            member,
        }
    }

    fn on_member_update(&self, update: MemberUpdate) -> Event {
        let key = (update.guild_id, update.user.id);

        // Refresh the shared user record only if it is already tracked
        if let Some(mut user) = self.users.get_mut(&update.user.id) {
            *user = update.user.clone();
        }

        let mut snapshot = None;
        if let Some(mut member) = self.members.get_mut(&key) {
            let before = member.clone();
            member.apply(&update);
            snapshot = Some((before, member.clone()));
        }

        let (before, after) = match snapshot {
            Some((before, after)) => (Some(before), after),
            None => {
                let mut after = Member::new(update.guild_id, update.user.id);
                after.apply(&update);
                (None, after)
            }
        };

        Event::MemberUpdate {
            before,
            after,
            user: update.user,
        }
    }

    fn on_members_chunk(&self, chunk: MembersChunk) -> Event {
        let mut stored = Vec::new();
        for data in &chunk.members {
            if let Some(member) = self.store_member(chunk.guild_id, data) {
                stored.push(member.user_id);
            }
        }
        if let Some(mut guild) = self.guilds.get_mut(&chunk.guild_id) {
            guild.members.extend(stored);
        }
        Event::MembersChunk(chunk)
    }

    // =========================================================================
    // Channels
    // =========================================================================

    fn on_channel_create(&self, channel: Channel) -> Event {
        match channel.guild_id {
            Some(guild_id) => {
                let linked = match self.guilds.get_mut(&guild_id) {
                    Some(mut guild) => {
                        guild.channels.insert(channel.id);
                        true
                    }
                    None => false,
                };
                if linked {
                    self.channels.insert(channel.id, channel.clone());
                }
            }
            None => {
                self.channels.insert(channel.id, channel.clone());
            }
        }
        Event::ChannelCreate(Box::new(channel))
    }

    fn on_channel_update(&self, channel: Channel) -> Event {
        let guild_known = channel
            .guild_id
            .is_none_or(|g| self.guilds.contains_key(&g));

        let before = if guild_known {
            self.channels.insert(channel.id, channel.clone())
        } else {
            self.channels.get(&channel.id).map(|c| c.clone())
        };

        if let Some(guild_id) = channel.guild_id {
            if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
                guild.channels.insert(channel.id);
            }
        }

        Event::ChannelUpdate {
            before: before.map(Box::new),
            after: Box::new(channel),
        }
    }

    fn on_channel_delete(&self, channel: Channel) -> Event {
        let cached = self.channels.remove(&channel.id).map(|(_, c)| c);
        if let Some(guild_id) = channel.guild_id {
            if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
                guild.channels.remove(&channel.id);
            }
        }
        self.messages
            .lock()
            .remove_where(|m| m.channel_id == channel.id);

        Event::ChannelDelete(Box::new(cached.unwrap_or(channel)))
    }

    // =========================================================================
    // Roles
    // =========================================================================

    fn on_role_create(&self, upsert: RoleUpsert) -> Event {
        let role = upsert.role.in_guild(upsert.guild_id);
        let linked = match self.guilds.get_mut(&upsert.guild_id) {
            Some(mut guild) => {
                guild.roles.insert(role.id);
                true
            }
            None => false,
        };
        if linked {
            self.roles.insert(role.id, role.clone());
        }
        Event::RoleCreate(role)
    }

    fn on_role_update(&self, upsert: RoleUpsert) -> Event {
        let role = upsert.role.in_guild(upsert.guild_id);
        let guild_known = self.guilds.contains_key(&upsert.guild_id);
        let before = if guild_known {
            self.roles.insert(role.id, role.clone())
        } else {
            self.roles.get(&role.id).map(|r| r.clone())
        };
        Event::RoleUpdate {
            before,
            after: role,
        }
    }

    fn on_role_delete(&self, delete: RoleDelete) -> Event {
        let role = self.roles.remove(&delete.role_id).map(|(_, r)| r);
        if let Some(mut guild) = self.guilds.get_mut(&delete.guild_id) {
            guild.roles.remove(&delete.role_id);
        }
        // Members must not keep pointing at a deleted role
        for mut member in self.members.iter_mut() {
            if member.key().0 == delete.guild_id {
                member.roles.retain(|r| *r != delete.role_id);
            }
        }

        Event::RoleDelete {
            guild_id: delete.guild_id,
            role_id: delete.role_id,
            role,
        }
    }

    // =========================================================================
    // Messages
    // =========================================================================

    fn on_message_create(&self, message: Message) -> Event {
        if let Some(mut channel) = self.channels.get_mut(&message.channel_id) {
            if let ChannelKind::Text(text) | ChannelKind::News(text) = &mut channel.kind {
                text.last_message_id = Some(message.id);
            }
        }
        self.messages.lock().insert(message.clone());
        Event::MessageCreate(Box::new(message))
    }

    fn on_message_update(&self, update: Box<MessageUpdate>) -> Event {
        let (before, after) = {
            let mut store = self.messages.lock();
            match store.get_mut(update.id) {
                Some(message) => {
                    let before = message.clone();
                    message.apply(&update);
                    (Some(Box::new(before)), Some(Box::new(message.clone())))
                }
                None => (None, None),
            }
        };
        Event::MessageUpdate {
            before,
            after,
            update,
        }
    }

    fn on_message_delete(&self, delete: MessageDelete) -> Event {
        let message = self.messages.lock().remove(delete.id);
        Event::MessageDelete {
            channel_id: delete.channel_id,
            message_id: delete.id,
            message: message.map(Box::new),
        }
    }

    fn on_message_delete_bulk(&self, bulk: MessageDeleteBulk) -> Event {
        let messages = {
            let mut store = self.messages.lock();
            bulk.ids.iter().filter_map(|id| store.remove(*id)).collect()
        };
        Event::MessageDeleteBulk {
            channel_id: bulk.channel_id,
            ids: bulk.ids,
            messages,
        }
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    fn on_reaction(&self, change: Box<ReactionChange>, added: bool) -> Event {
        let me = self.current_user_id() == Some(change.user_id);
        let message = {
            let mut store = self.messages.lock();
            store.get_mut(change.message_id).map(|message| {
                if added {
                    message.add_reaction(&change.emoji, me);
                } else {
                    message.remove_reaction(&change.emoji, me);
                }
                Box::new(message.clone())
            })
        };

        if added {
            Event::ReactionAdd {
                reaction: change,
                message,
            }
        } else {
            Event::ReactionRemove {
                reaction: change,
                message,
            }
        }
    }

    fn on_reaction_clear(&self, clear: ReactionClear) -> Event {
        let message = {
            let mut store = self.messages.lock();
            store.get_mut(clear.message_id).map(|message| {
                message.clear_reactions(clear.emoji.as_ref());
                Box::new(message.clone())
            })
        };
        Event::ReactionClear { clear, message }
    }
}

fn unknown<T: serde::Serialize>(name: &str, payload: &T) -> Event {
    Event::Unknown {
        name: name.to_string(),
        data: serde_json::to_value(payload).unwrap_or_default(),
    }
}
