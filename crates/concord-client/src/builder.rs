use std::sync::Arc;

use concord_cache::EntityCache;
use concord_common::{default_error_hook, ClientConfig, ErrorHook};
use concord_gateway::protocol::PresenceUpdatePayload;
use concord_gateway::{Connector, EventHandler, ShardSupervisor, WsConnector};
use concord_http::{HttpClient, RateLimiter};

use crate::client::Client;
use crate::error::{ClientError, ClientResult};

/// Builder for [`Client`]
///
/// Only the event handler is required. The websocket connector, a fresh
/// rate limiter and the logging error hook fill in the rest.
pub struct ClientBuilder {
    config: ClientConfig,
    handler: Option<Arc<dyn EventHandler>>,
    error_hook: Option<ErrorHook>,
    connector: Option<Arc<dyn Connector>>,
    limiter: Option<Arc<RateLimiter>>,
    presence: Option<PresenceUpdatePayload>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            handler: None,
            error_hook: None,
            connector: None,
            limiter: None,
            presence: None,
        }
    }

    pub fn event_handler(mut self, handler: impl EventHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Share a limiter with other clients using the same token
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Presence sent with every identify
    pub fn presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn build(self) -> ClientResult<Client> {
        let handler = self.handler.ok_or(ClientError::Missing("event handler"))?;
        let limiter = self.limiter.unwrap_or_default();
        let http = HttpClient::with_limiter(&self.config.token, &self.config.http, limiter)?;
        let cache = Arc::new(EntityCache::new(
            self.config.intents,
            self.config.cache.max_messages,
        ));
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector) as Arc<dyn Connector>);
        let error_hook = self.error_hook.unwrap_or_else(default_error_hook);

        let mut supervisor = ShardSupervisor::new(
            self.config,
            connector,
            http.clone(),
            cache,
            handler,
            error_hook,
        );
        if let Some(presence) = self.presence {
            supervisor = supervisor.with_presence(presence);
        }

        Ok(Client::new(supervisor, http))
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("intents", &self.config.intents)
            .field("handler", &self.handler.is_some())
            .field("connector", &self.connector.is_some())
            .finish()
    }
}
