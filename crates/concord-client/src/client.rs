use std::sync::Arc;
use std::time::Duration;

use concord_cache::EntityCache;
use concord_common::ClientConfig;
use concord_core::Snowflake;
use concord_gateway::protocol::PresenceUpdatePayload;
use concord_gateway::{ShardMessenger, ShardState, ShardSupervisor};
use concord_http::{HttpClient, RateLimiter};
use tracing::info;

use crate::builder::ClientBuilder;
use crate::error::ClientResult;

/// Handle to a running bot
///
/// Cloning is cheap; every clone drives the same shards.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    supervisor: ShardSupervisor,
    http: HttpClient,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub(crate) fn new(supervisor: ShardSupervisor, http: HttpClient) -> Self {
        Self {
            inner: Arc::new(ClientInner { supervisor, http }),
        }
    }

    /// Connect every local shard and run until shutdown or a fatal failure
    pub async fn start(&self) -> ClientResult<()> {
        info!("Starting client");
        self.inner.supervisor.run().await?;
        info!("Client stopped");
        Ok(())
    }

    /// Close every shard; `start` returns once they are down
    pub fn shutdown(&self) {
        self.inner.supervisor.shutdown();
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        self.inner.supervisor.cache()
    }

    pub fn http(&self) -> &HttpClient {
        &self.inner.http
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.inner.http.limiter()
    }

    pub fn latencies(&self) -> Vec<(u32, Option<Duration>)> {
        self.inner.supervisor.latencies()
    }

    pub fn states(&self) -> Vec<(u32, ShardState)> {
        self.inner.supervisor.states()
    }

    pub fn messenger(&self, shard_id: u32) -> Option<ShardMessenger> {
        self.inner.supervisor.messenger(shard_id)
    }

    /// Messenger of the shard that receives events for `guild_id`
    pub fn guild_messenger(&self, guild_id: Snowflake) -> Option<ShardMessenger> {
        let shard_id = self.inner.supervisor.shard_for_guild(guild_id)?;
        self.messenger(shard_id)
    }

    /// Send a presence update on every local shard
    pub async fn update_presence(&self, presence: &PresenceUpdatePayload) -> ClientResult<()> {
        for (shard_id, _) in self.states() {
            if let Some(messenger) = self.messenger(shard_id) {
                messenger.update_presence(presence).await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("supervisor", &self.inner.supervisor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::{Context, Event, HandlerError};
    use concord_gateway::protocol::{OpCode, Status};
    use concord_gateway::transport::memory::MemoryConnector;
    use parking_lot::Mutex;
    use serde_json::json;

    fn config() -> ClientConfig {
        let mut config = ClientConfig::new("secret");
        config.gateway.url = Some("memory://gateway".into());
        config.gateway.shard_count = Some(1);
        config.gateway.max_concurrency = Some(1);
        config
    }

    #[test]
    fn test_build_requires_handler() {
        let err = Client::builder(config()).build().unwrap_err();
        assert!(matches!(err, ClientError::Missing("event handler")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_runs_shard_and_fills_cache() {
        let (connector, mut server) = MemoryConnector::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&events);

        let client = Client::builder(config())
            .connector(Arc::new(connector))
            .event_handler(move |_ctx: Context, event: Event| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().push(event.name().to_string());
                    Ok::<(), HandlerError>(())
                }
            })
            .build()
            .unwrap();

        let running = client.clone();
        let run = tokio::spawn(async move { running.start().await });

        let mut conn = server.accept().await.unwrap();
        conn.hello(41_250);
        let identify = conn.recv_command().await.unwrap().as_identify().unwrap();
        assert_eq!(identify.token, "secret");
        conn.dispatch(
            "READY",
            1,
            json!({
                "v": 10,
                "user": {"id": "1", "username": "bot", "bot": true},
                "guilds": [{"id": "7", "unavailable": true}],
                "session_id": "abc"
            }),
        );
        conn.dispatch(
            "GUILD_CREATE",
            2,
            json!({"id": "7", "name": "g", "owner_id": "1", "channels": [], "roles": []}),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(client.cache().guild(Snowflake::new(7)).is_some());
        assert_eq!(client.cache().current_user().unwrap().id, Snowflake::new(1));
        assert!(events.lock().iter().any(|name| name == "SHARD_READY"));

        assert_eq!(client.guild_messenger(Snowflake::new(7)).unwrap().shard_id(), 0);
        client
            .update_presence(&PresenceUpdatePayload::new(Status::Idle))
            .await
            .unwrap();
        let presence = conn.recv_command().await.unwrap();
        assert_eq!(presence.op, OpCode::PresenceUpdate);

        client.shutdown();
        assert_eq!(conn.closed().await, Some(1000));
        run.await.unwrap().unwrap();
        assert!(client
            .states()
            .iter()
            .all(|(_, state)| *state == ShardState::Disconnected));
    }
}
