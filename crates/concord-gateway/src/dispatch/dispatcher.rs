use std::any::Any;
use std::future::pending;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn, Instrument};

use concord_cache::EntityCache;
use concord_common::{shard_span, ErrorHook, ErrorReport, FailureClass};
use concord_core::{DispatchEvent, Event};
use concord_http::HttpClient;

use super::handler::{Context, EventHandler};
use super::readiness::{ReadyTracker, ShardReadiness};
use crate::link::DispatchFrame;
use crate::messenger::ShardMessenger;

/// Applies dispatches to the cache and runs the handler
///
/// Each shard gets its own task reading its dispatches in order; callbacks
/// from all shards share one concurrency limit.
#[derive(Clone)]
pub struct EventDispatcher {
    cache: Arc<EntityCache>,
    handler: Arc<dyn EventHandler>,
    http: HttpClient,
    error_hook: ErrorHook,
    callbacks: Arc<Semaphore>,
    readiness: Arc<ReadyTracker>,
}

impl EventDispatcher {
    pub(crate) fn new(
        cache: Arc<EntityCache>,
        handler: Arc<dyn EventHandler>,
        http: HttpClient,
        error_hook: ErrorHook,
        concurrency: usize,
        readiness: Arc<ReadyTracker>,
    ) -> Self {
        Self {
            cache,
            handler,
            http,
            error_hook,
            callbacks: Arc::new(Semaphore::new(concurrency.max(1))),
            readiness,
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Process one shard's dispatches until the link side closes or `cancel` fires
    pub async fn run_shard(
        self,
        shard_id: u32,
        shard_count: u32,
        messenger: ShardMessenger,
        mut dispatches: mpsc::UnboundedReceiver<DispatchFrame>,
        cancel: CancellationToken,
    ) {
        let mut shard = ShardDispatch {
            readiness: self.readiness.shard(shard_id),
            dispatcher: self,
            shard_id,
            messenger,
            last_seq: None,
        };

        async move {
            loop {
                let deadline = shard.readiness.deadline();
                tokio::select! {
                    () = cancel.cancelled() => break,
                    frame = dispatches.recv() => match frame {
                        Some(frame) => shard.process(frame).await,
                        None => break,
                    },
                    () = async {
                        match deadline {
                            Some(at) => tokio::time::sleep_until(at).await,
                            None => pending().await,
                        }
                    } => shard.ready_timeout().await,
                }
            }
            debug!("dispatch loop stopped");
        }
        .instrument(shard_span(shard_id, shard_count))
        .await;
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("available_callbacks", &self.callbacks.available_permits())
            .finish_non_exhaustive()
    }
}

/// Dispatch state of one shard
struct ShardDispatch {
    dispatcher: EventDispatcher,
    shard_id: u32,
    messenger: ShardMessenger,
    readiness: ShardReadiness,
    last_seq: Option<u64>,
}

impl ShardDispatch {
    async fn process(&mut self, frame: DispatchFrame) {
        // A fresh session starts counting again
        if frame.name == "READY" {
            self.last_seq = None;
        }
        if let Some(last) = self.last_seq.filter(|last| frame.seq <= *last) {
            warn!(seq = frame.seq, last, event = %frame.name, "skipping out-of-order dispatch");
            return;
        }
        self.last_seq = Some(frame.seq);
        trace!(seq = frame.seq, event = %frame.name, "dispatch");

        let decoded = match DispatchEvent::decode(&frame.name, frame.data) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.report(FailureClass::Transient, &frame.name, e.to_string());
                return;
            }
        };

        let event = self.dispatcher.cache.apply(decoded);
        let lifecycle = self
            .readiness
            .observe(&self.dispatcher.readiness, &event);

        self.deliver(event).await;
        for event in lifecycle {
            self.deliver(event).await;
        }
    }

    async fn ready_timeout(&mut self) {
        for event in self.readiness.expire(&self.dispatcher.readiness) {
            self.deliver(event).await;
        }
    }

    async fn deliver(&self, event: Event) {
        let Ok(_permit) = self.dispatcher.callbacks.acquire().await else {
            return;
        };

        let name = event.name().to_string();
        let ctx = Context {
            shard_id: self.shard_id,
            cache: Arc::clone(&self.dispatcher.cache),
            http: self.dispatcher.http.clone(),
            messenger: self.messenger.clone(),
        };

        let outcome = AssertUnwindSafe(self.dispatcher.handler.on_event(ctx, event))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report(FailureClass::Callback, &name, e.to_string()),
            Err(panic) => self.report(
                FailureClass::Callback,
                &name,
                format!("handler panicked: {}", panic_message(panic.as_ref())),
            ),
        }
    }

    fn report(&self, class: FailureClass, context: &str, message: String) {
        let report = ErrorReport::new(class, context, message).with_shard(self.shard_id);
        (self.dispatcher.error_hook)(&report);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
