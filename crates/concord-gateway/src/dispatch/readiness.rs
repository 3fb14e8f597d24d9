//! Shard and client readiness
//!
//! A shard is ready once every guild listed in READY has streamed in, or no
//! guild arrived for the ready timeout. The client is ready the first time
//! every local shard has been.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::info;

use concord_core::{Event, Snowflake};

/// Readiness shared by the dispatch tasks of all local shards
#[derive(Debug)]
pub(crate) struct ReadyTracker {
    shard_count: u32,
    shards: u32,
    timeout: Duration,
    inner: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    ready: HashSet<u32>,
    all_fired: bool,
}

impl ReadyTracker {
    /// `shards` local shards out of `shard_count` in total
    pub(crate) fn new(shard_count: u32, shards: u32, timeout: Duration) -> Self {
        Self {
            shard_count,
            shards,
            timeout,
            inner: Mutex::new(TrackerState::default()),
        }
    }

    pub(crate) fn shard(&self, shard_id: u32) -> ShardReadiness {
        ShardReadiness {
            shard_id,
            timeout: self.timeout,
            pending: None,
            deadline: None,
        }
    }

    /// Record a ready shard; returns the all-shards event the first time it applies
    fn mark_ready(&self, shard_id: u32) -> Option<Event> {
        let mut inner = self.inner.lock();
        inner.ready.insert(shard_id);
        if inner.all_fired || inner.ready.len() < self.shards as usize {
            return None;
        }
        inner.all_fired = true;
        info!(shard_count = self.shard_count, "all shards ready");
        Some(Event::AllShardsReady {
            shard_count: self.shard_count,
        })
    }
}

/// Guild streaming progress of one shard
#[derive(Debug)]
pub(crate) struct ShardReadiness {
    shard_id: u32,
    timeout: Duration,
    pending: Option<HashSet<Snowflake>>,
    deadline: Option<Instant>,
}

impl ShardReadiness {
    /// When the shard is declared ready with guilds still missing
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Update progress with an applied event; returns lifecycle events now due
    pub(crate) fn observe(&mut self, tracker: &ReadyTracker, event: &Event) -> Vec<Event> {
        match event {
            Event::Ready { guilds, .. } => {
                self.pending = Some(guilds.iter().copied().collect());
            }
            Event::GuildAvailable(guild) | Event::GuildJoin(guild) => {
                if !self.arrived(guild.id) {
                    return Vec::new();
                }
            }
            Event::GuildUnavailable { guild_id } => {
                if !self.arrived(*guild_id) {
                    return Vec::new();
                }
            }
            _ => return Vec::new(),
        }

        match &self.pending {
            Some(pending) if pending.is_empty() => self.finish(tracker),
            Some(_) => {
                self.deadline = Some(Instant::now() + self.timeout);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// The deadline passed; declare the shard ready with what is still missing
    pub(crate) fn expire(&mut self, tracker: &ReadyTracker) -> Vec<Event> {
        self.finish(tracker)
    }

    /// Whether a streamed guild was one being waited for
    fn arrived(&mut self, guild_id: Snowflake) -> bool {
        self.pending
            .as_mut()
            .is_some_and(|pending| pending.remove(&guild_id))
    }

    fn finish(&mut self, tracker: &ReadyTracker) -> Vec<Event> {
        let mut unavailable_guilds: Vec<Snowflake> = self
            .pending
            .take()
            .map(|pending| pending.into_iter().collect())
            .unwrap_or_default();
        unavailable_guilds.sort_unstable();
        self.deadline = None;

        info!(
            shard_id = self.shard_id,
            unavailable = unavailable_guilds.len(),
            "shard ready"
        );
        let mut events = vec![Event::ShardReady {
            shard_id: self.shard_id,
            unavailable_guilds,
        }];
        events.extend(tracker.mark_ready(self.shard_id));
        events
    }
}
