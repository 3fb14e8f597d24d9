use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use concord_common::{Classify, FailureClass};
use concord_http::HttpError;

use crate::protocol::CloseCode;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the transport under a link
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    #[error("No Hello within {0:?}")]
    HelloTimeout(Duration),

    #[error("Write not accepted within {0:?}")]
    WriteTimeout(Duration),

    #[error("Expected Hello, got {0}")]
    UnexpectedFrame(String),

    #[error("Invalid frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    pub fn connect(url: &str, source: impl Into<BoxError>) -> Self {
        Self::Connect {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            other => Self::WebSocket(Box::new(other)),
        }
    }
}

/// Failures that end a link or its dispatcher
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Gateway closed the session: {0}")]
    FatalClose(CloseCode),

    #[error("Gave up after {attempts} reconnect attempts: {last}")]
    ReconnectsExhausted { attempts: u32, last: String },

    #[error("Failed to encode {op} frame: {source}")]
    Encode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Shard {shard_id} is not running")]
    ShardNotRunning { shard_id: u32 },
}

impl Classify for TransportError {
    fn failure_class(&self) -> FailureClass {
        FailureClass::Transient
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "CONNECT_FAILED",
            Self::WebSocket(_) => "WEBSOCKET_ERROR",
            Self::HelloTimeout(_) => "HELLO_TIMEOUT",
            Self::WriteTimeout(_) => "WRITE_TIMEOUT",
            Self::UnexpectedFrame(_) => "UNEXPECTED_FRAME",
            Self::Decode(_) => "FRAME_DECODE",
            Self::Closed => "TRANSPORT_CLOSED",
        }
    }
}

impl Classify for GatewayError {
    fn failure_class(&self) -> FailureClass {
        match self {
            Self::Transport(e) => e.failure_class(),
            Self::FatalClose(_) | Self::Encode { .. } => FailureClass::Fatal,
            // The supervisor restarts a link that ran out of reconnects
            Self::ReconnectsExhausted { .. } | Self::ShardNotRunning { .. } => {
                FailureClass::Transient
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.error_code(),
            Self::FatalClose(CloseCode::AuthenticationFailed) => "AUTHENTICATION_FAILED",
            Self::FatalClose(CloseCode::DisallowedIntents) => "DISALLOWED_INTENTS",
            Self::FatalClose(_) => "FATAL_CLOSE",
            Self::ReconnectsExhausted { .. } => "RECONNECTS_EXHAUSTED",
            Self::Encode { .. } => "FRAME_ENCODE",
            Self::ShardNotRunning { .. } => "SHARD_NOT_RUNNING",
        }
    }
}

/// Failures that stop the whole supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Shard {shard_id} failed fatally: {source}")]
    ShardFatal {
        shard_id: u32,
        #[source]
        source: GatewayError,
    },

    #[error("Shard {shard_id} exceeded {restarts} restarts: {source}")]
    RestartsExhausted {
        shard_id: u32,
        restarts: u32,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to fetch gateway information: {0}")]
    Bootstrap(#[from] HttpError),

    #[error("Shard {shard_id} task panicked: {message}")]
    ShardPanicked { shard_id: u32, message: String },

    #[error("Invalid shard configuration: {0}")]
    InvalidShards(String),

    #[error("Supervisor is already running")]
    AlreadyRunning,
}

impl Classify for SupervisorError {
    fn failure_class(&self) -> FailureClass {
        match self {
            Self::Bootstrap(e) => e.failure_class(),
            _ => FailureClass::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::ShardFatal { source, .. } => source.error_code(),
            Self::RestartsExhausted { .. } => "RESTARTS_EXHAUSTED",
            Self::Bootstrap(e) => e.error_code(),
            Self::ShardPanicked { .. } => "SHARD_PANICKED",
            Self::InvalidShards(_) => "INVALID_SHARDS",
            Self::AlreadyRunning => "ALREADY_RUNNING",
        }
    }
}
