use serde::Serialize;

/// Lifecycle state of one shard's link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShardState {
    Disconnected,
    Connecting,
    Identifying,
    Resuming,
    Connected,
    AwaitingHeartbeatAck,
    Reconnecting,
}

impl ShardState {
    /// Whether dispatches are flowing
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::AwaitingHeartbeatAck)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::AwaitingHeartbeatAck => "awaiting_heartbeat_ack",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Write side of a shard's state, shared by the link and its heartbeat task
#[derive(Debug, Clone)]
pub(crate) struct StateHandle(std::sync::Arc<tokio::sync::watch::Sender<ShardState>>);

impl StateHandle {
    pub(crate) fn new() -> (Self, tokio::sync::watch::Receiver<ShardState>) {
        let (tx, rx) = tokio::sync::watch::channel(ShardState::Disconnected);
        (Self(std::sync::Arc::new(tx)), rx)
    }

    pub(crate) fn get(&self) -> ShardState {
        *self.0.borrow()
    }

    pub(crate) fn set(&self, state: ShardState) {
        let previous = self.0.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "shard state changed");
        }
    }

    /// Move to `to` only if currently in `from`
    pub(crate) fn transition(&self, from: ShardState, to: ShardState) -> bool {
        self.0.send_if_modified(|current| {
            if *current == from {
                *current = to;
                true
            } else {
                false
            }
        })
    }
}
