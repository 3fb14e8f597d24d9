use std::sync::Arc;

use async_trait::async_trait;

use concord_cache::EntityCache;
use concord_core::Event;
use concord_http::HttpClient;

use crate::messenger::ShardMessenger;

/// Error a handler may return; it is reported, never propagated
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler can reach while processing an event
#[derive(Debug, Clone)]
pub struct Context {
    pub shard_id: u32,
    pub cache: Arc<EntityCache>,
    pub http: HttpClient,
    pub messenger: ShardMessenger,
}

/// User code receiving every event after the cache has been updated
///
/// Events of one shard arrive one at a time and in order. An `Err` or a
/// panic is sent to the error hook and the next event is delivered as usual.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn on_event(&self, ctx: Context, event: Event) -> Result<(), HandlerError>;
}

/// Closures work as handlers
#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_event(&self, ctx: Context, event: Event) -> Result<(), HandlerError> {
        self(ctx, event).await
    }
}
