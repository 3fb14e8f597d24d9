//! Duplex frame transport
//!
//! The link only sees a sink and a stream of [`WireMessage`]s, so the same
//! state machine runs over a real websocket or an in-memory pair.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};

use crate::error::TransportError;

pub mod memory;
mod websocket;

pub use websocket::WsConnector;

/// A transport-level message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Close(Option<CloseFrame>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

pub type FrameSink = Pin<Box<dyn Sink<WireMessage, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<WireMessage, TransportError>> + Send>>;

/// Opens transports to a gateway URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}
