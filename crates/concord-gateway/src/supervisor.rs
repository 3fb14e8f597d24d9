//! Shard supervisor
//!
//! Starts every local shard behind the shared identify gate, restarts links
//! that fail with a recoverable error and stops everything on a fatal one.

use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use concord_cache::EntityCache;
use concord_common::{Classify, ClientConfig, ErrorHook, ErrorReport};
use concord_core::Snowflake;
use concord_http::HttpClient;

use crate::backoff::Backoff;
use crate::dispatch::{EventDispatcher, EventHandler, ReadyTracker};
use crate::error::SupervisorError;
use crate::identify::IdentifyGate;
use crate::link::{GatewayLink, LinkConfig, LinkHandle};
use crate::messenger::ShardMessenger;
use crate::protocol::PresenceUpdatePayload;
use crate::state::ShardState;
use crate::transport::Connector;

/// Where and how many shards to run, after filling gaps from `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    pub url: String,
    pub shard_count: u32,
    pub shard_ids: Range<u32>,
    pub max_concurrency: u32,
}

/// Owns and supervises every local shard
pub struct ShardSupervisor {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    http: HttpClient,
    cache: Arc<EntityCache>,
    handler: Arc<dyn EventHandler>,
    error_hook: ErrorHook,
    presence: Option<PresenceUpdatePayload>,
    shards: DashMap<u32, LinkHandle>,
    cancel: CancellationToken,
    running: AtomicBool,
    /// Planned shard count, zero until `run` resolved the plan
    shard_count: AtomicU32,
}

impl ShardSupervisor {
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        http: HttpClient,
        cache: Arc<EntityCache>,
        handler: Arc<dyn EventHandler>,
        error_hook: ErrorHook,
    ) -> Self {
        Self {
            config,
            connector,
            http,
            cache,
            handler,
            error_hook,
            presence: None,
            shards: DashMap::new(),
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
            shard_count: AtomicU32::new(0),
        }
    }

    /// Presence sent with every identify
    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Resolve the shard plan, asking the service for whatever the config leaves open
    pub async fn plan(&self) -> Result<ShardPlan, SupervisorError> {
        let gateway = &self.config.gateway;
        let bot = match (&gateway.url, gateway.shard_count, gateway.max_concurrency) {
            (Some(_), Some(_), Some(_)) => None,
            _ => Some(self.http.get_gateway_bot().await?),
        };

        let url = gateway
            .url
            .clone()
            .or_else(|| bot.as_ref().map(|b| b.url.clone()))
            .ok_or_else(|| SupervisorError::InvalidShards("no gateway url".into()))?;
        let shard_count = gateway
            .shard_count
            .or(bot.as_ref().map(|b| b.shards))
            .unwrap_or(1);
        let max_concurrency = gateway
            .max_concurrency
            .or(bot.as_ref().map(|b| b.session_start_limit.max_concurrency))
            .unwrap_or(1);
        let shard_ids = gateway.shard_ids.clone().unwrap_or(0..shard_count);

        if shard_count == 0 {
            return Err(SupervisorError::InvalidShards("shard count is zero".into()));
        }
        if shard_ids.is_empty() || shard_ids.end > shard_count {
            return Err(SupervisorError::InvalidShards(format!(
                "shards {}..{} do not fit a shard count of {shard_count}",
                shard_ids.start, shard_ids.end
            )));
        }

        if let Some(limit) = bot.as_ref().map(|b| &b.session_start_limit) {
            if (limit.remaining as usize) < shard_ids.len() {
                warn!(
                    remaining = limit.remaining,
                    shards = shard_ids.len(),
                    reset_after_ms = limit.reset_after,
                    "not enough session starts left for every shard"
                );
            }
        }

        Ok(ShardPlan {
            url,
            shard_count,
            shard_ids,
            max_concurrency,
        })
    }

    /// Run every local shard until shutdown or a failure that stops the client
    pub async fn run(&self) -> Result<(), SupervisorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SupervisorError::AlreadyRunning);
        }
        let plan = self.plan().await?;
        self.shard_count.store(plan.shard_count, Ordering::SeqCst);
        info!(
            shard_count = plan.shard_count,
            shards = ?plan.shard_ids,
            max_concurrency = plan.max_concurrency,
            "starting shards"
        );

        let gateway = &self.config.gateway;
        let gate = Arc::new(IdentifyGate::new(
            plan.max_concurrency,
            gateway.identify_spacing(),
            gateway.identify_jitter(),
        ));
        let readiness = Arc::new(ReadyTracker::new(
            plan.shard_count,
            plan.shard_ids.len() as u32,
            gateway.guild_ready_timeout(),
        ));
        let dispatcher = EventDispatcher::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.handler),
            self.http.clone(),
            Arc::clone(&self.error_hook),
            self.config.dispatch_concurrency,
            readiness,
        );
        let restart = RestartPolicy {
            backoff: Backoff::from_config(&self.config.backoff),
            max_restarts: self.config.backoff.max_shard_restarts,
        };

        let mut links = JoinSet::new();
        let mut dispatch_tasks = JoinSet::new();
        for shard_id in plan.shard_ids.clone() {
            let (tx, rx) = mpsc::unbounded_channel();
            let mut link_config =
                LinkConfig::new(&self.config, shard_id, plan.shard_count, &plan.url);
            link_config.presence.clone_from(&self.presence);

            let (link, handle) = GatewayLink::new(
                link_config,
                Arc::clone(&self.connector),
                Arc::clone(&gate),
                tx,
                self.cancel.child_token(),
            );
            dispatch_tasks.spawn(dispatcher.clone().run_shard(
                shard_id,
                plan.shard_count,
                handle.messenger().clone(),
                rx,
                self.cancel.child_token(),
            ));
            self.shards.insert(shard_id, handle);

            let supervised = supervise(
                link,
                restart,
                self.cancel.clone(),
                Arc::clone(&self.error_hook),
            );
            links.spawn(async move {
                let outcome = AssertUnwindSafe(supervised).catch_unwind().await;
                (shard_id, outcome)
            });
        }

        let mut result = Ok(());
        while let Some(joined) = links.join_next().await {
            let failure = match joined {
                Ok((_, Ok(Ok(())))) => continue,
                Ok((_, Ok(Err(e)))) => e,
                Ok((shard_id, Err(_))) => SupervisorError::ShardPanicked {
                    shard_id,
                    message: "link task panicked".into(),
                },
                Err(e) => {
                    // Link tasks are never aborted and catch their own panics
                    error!(error = %e, "link task ended abnormally");
                    continue;
                }
            };
            error!(error = %failure, code = failure.error_code(), "stopping all shards");
            self.cancel.cancel();
            if result.is_ok() {
                result = Err(failure);
            }
        }

        // Links are gone, so every dispatch loop drains and stops
        while dispatch_tasks.join_next().await.is_some() {}
        info!("all shards stopped");
        result
    }

    /// Stop every shard; `run` returns once their connections are closed
    pub fn shutdown(&self) {
        info!("shutting down shards");
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Last heartbeat round trip of each shard, in shard order
    pub fn latencies(&self) -> Vec<(u32, Option<Duration>)> {
        let mut latencies: Vec<_> = self
            .shards
            .iter()
            .map(|entry| (*entry.key(), entry.value().latency()))
            .collect();
        latencies.sort_unstable_by_key(|(shard_id, _)| *shard_id);
        latencies
    }

    /// Current state of each shard, in shard order
    pub fn states(&self) -> Vec<(u32, ShardState)> {
        let mut states: Vec<_> = self
            .shards
            .iter()
            .map(|entry| (*entry.key(), entry.value().state()))
            .collect();
        states.sort_unstable_by_key(|(shard_id, _)| *shard_id);
        states
    }

    /// Shard the service routes `guild_id` to, once the plan is known
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> Option<u32> {
        match self.shard_count.load(Ordering::SeqCst) {
            0 => None,
            count => Some(guild_id.shard_id(count)),
        }
    }

    pub fn shard(&self, shard_id: u32) -> Option<LinkHandle> {
        self.shards.get(&shard_id).map(|entry| entry.value().clone())
    }

    pub fn messenger(&self, shard_id: u32) -> Option<ShardMessenger> {
        self.shards
            .get(&shard_id)
            .map(|entry| entry.value().messenger().clone())
    }
}

impl std::fmt::Debug for ShardSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardSupervisor")
            .field("shards", &self.states())
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
struct RestartPolicy {
    backoff: Backoff,
    max_restarts: u32,
}

/// Run a link, restarting it after recoverable failures
async fn supervise(
    mut link: GatewayLink,
    policy: RestartPolicy,
    cancel: CancellationToken,
    error_hook: ErrorHook,
) -> Result<(), SupervisorError> {
    let shard_id = link.shard_id();
    let mut restarts = 0;

    loop {
        let e = match link.run().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let report = ErrorReport::new(e.failure_class(), "shard", e.to_string()).with_shard(shard_id);
        error_hook(&report);

        if e.is_fatal() {
            return Err(SupervisorError::ShardFatal { shard_id, source: e });
        }
        if restarts >= policy.max_restarts {
            return Err(SupervisorError::RestartsExhausted {
                shard_id,
                restarts,
                source: e,
            });
        }
        restarts += 1;

        let delay = policy.backoff.delay(restarts);
        warn!(
            shard_id,
            restarts,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "restarting shard"
        );
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            () = tokio::time::sleep(delay) => {}
        }
    }
}
