//! In-memory transport for driving links from scripted server frames
//!
//! `MemoryConnector` hands every connection attempt to a [`MemoryServer`],
//! which yields one [`FakeConnection`] per attempt.

use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{Sink, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{CloseFrame, Connector, FrameSink, FrameStream, WireMessage};
use crate::error::TransportError;
use crate::protocol::{GatewayFrame, OpCode};

/// Connector whose connections terminate in a [`MemoryServer`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<FakeConnection>,
    failures: Arc<AtomicU32>,
    stall_after: Arc<Mutex<Option<usize>>>,
    urls: Arc<Mutex<Vec<String>>>,
}

/// Server side of a [`MemoryConnector`]
#[derive(Debug)]
pub struct MemoryServer {
    accepted: mpsc::UnboundedReceiver<FakeConnection>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                accepted: tx,
                failures: Arc::new(AtomicU32::new(0)),
                stall_after: Arc::new(Mutex::new(None)),
                urls: Arc::new(Mutex::new(Vec::new())),
            },
            MemoryServer { accepted: rx },
        )
    }

    /// Make the next `count` connection attempts fail
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Make the next connection's sink stop accepting writes after `accepted` messages
    pub fn stall_writes_after(&self, accepted: usize) {
        *self.stall_after.lock() = Some(accepted);
    }

    /// URLs of every attempt so far, failed ones included
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        self.urls.lock().push(url.to_string());

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::connect(url, "connection refused"));
        }

        let (client_tx, server_rx) = fmpsc::unbounded::<WireMessage>();
        let (server_tx, client_rx) = fmpsc::unbounded::<Result<WireMessage, TransportError>>();

        let connection = FakeConnection {
            url: url.to_string(),
            to_client: server_tx,
            from_client: server_rx,
        };
        self.accepted
            .send(connection)
            .map_err(|_| TransportError::connect(url, "memory server dropped"))?;

        let sink: FrameSink = Box::pin(client_tx.sink_map_err(|_| TransportError::Closed));
        let sink: FrameSink = match self.stall_after.lock().take() {
            Some(budget) => Box::pin(StallingSink { inner: sink, budget }),
            None => sink,
        };
        Ok((sink, Box::pin(client_rx)))
    }
}

/// Sink that never becomes ready again once its budget is spent, like a full socket buffer
struct StallingSink {
    inner: FrameSink,
    budget: usize,
}

impl Sink<WireMessage> for StallingSink {
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.budget == 0 {
            return Poll::Pending;
        }
        self.inner.as_mut().poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: WireMessage) -> Result<(), Self::Error> {
        self.budget = self.budget.saturating_sub(1);
        self.inner.as_mut().start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.budget == 0 {
            return Poll::Pending;
        }
        self.inner.as_mut().poll_close(cx)
    }
}

impl MemoryServer {
    /// Wait for the next connection attempt
    pub async fn accept(&mut self) -> Option<FakeConnection> {
        self.accepted.recv().await
    }
}

/// The server end of one in-memory connection
#[derive(Debug)]
pub struct FakeConnection {
    pub url: String,
    to_client: fmpsc::UnboundedSender<Result<WireMessage, TransportError>>,
    from_client: fmpsc::UnboundedReceiver<WireMessage>,
}

impl FakeConnection {
    pub fn send_frame(&self, frame: &GatewayFrame) {
        if let Ok(text) = frame.to_json() {
            let _ = self.to_client.unbounded_send(Ok(WireMessage::Text(text)));
        }
    }

    pub fn hello(&self, heartbeat_interval: u64) {
        self.send_frame(&GatewayFrame::hello(heartbeat_interval));
    }

    pub fn dispatch(&self, event: &str, seq: u64, data: Value) {
        self.send_frame(&GatewayFrame::dispatch(event, seq, data));
    }

    pub fn heartbeat_ack(&self) {
        self.send_frame(&GatewayFrame::heartbeat_ack());
    }

    /// Send a close frame and end the stream
    pub fn close(self, code: u16) {
        let _ = self
            .to_client
            .unbounded_send(Ok(WireMessage::Close(Some(CloseFrame::new(code, "")))));
    }

    /// Fail the client's stream with a transport error
    pub fn fail(self) {
        let _ = self.to_client.unbounded_send(Err(TransportError::Closed));
    }

    /// Next message from the client; `None` once the client dropped the transport
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.from_client.next().await
    }

    /// Next frame from the client; `None` on a close or disconnect
    pub async fn recv_frame(&mut self) -> Option<GatewayFrame> {
        loop {
            match self.recv().await? {
                WireMessage::Text(text) => {
                    if let Ok(frame) = GatewayFrame::from_json(&text) {
                        return Some(frame);
                    }
                }
                WireMessage::Close(_) => return None,
            }
        }
    }

    /// Next non-heartbeat frame, acknowledging heartbeats on the way
    pub async fn recv_command(&mut self) -> Option<GatewayFrame> {
        loop {
            let frame = self.recv_frame().await?;
            if frame.op == OpCode::Heartbeat {
                self.heartbeat_ack();
                continue;
            }
            return Some(frame);
        }
    }

    /// Wait until the client closes or drops the transport, returning the close code sent
    pub async fn closed(&mut self) -> Option<u16> {
        while let Some(message) = self.recv().await {
            if let WireMessage::Close(frame) = message {
                return frame.map(|f| f.code);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut server) = MemoryConnector::new();
        let (mut sink, mut stream) = connector.connect("memory://gateway").await.unwrap();
        let mut conn = server.accept().await.unwrap();
        assert_eq!(conn.url, "memory://gateway");

        conn.hello(1000);
        let Some(Ok(WireMessage::Text(text))) = stream.next().await else {
            panic!("expected hello");
        };
        assert_eq!(GatewayFrame::from_json(&text).unwrap().op, OpCode::Hello);

        sink.send(WireMessage::Text(GatewayFrame::heartbeat(None).to_json().unwrap()))
            .await
            .unwrap();
        assert_eq!(conn.recv_frame().await.unwrap().op, OpCode::Heartbeat);

        drop(sink);
        drop(stream);
        assert_eq!(conn.closed().await, None);
    }

    #[tokio::test]
    async fn test_fail_next() {
        let (connector, mut server) = MemoryConnector::new();
        connector.fail_next(2);
        assert!(connector.connect("a").await.is_err());
        assert!(connector.connect("b").await.is_err());
        assert!(connector.connect("c").await.is_ok());
        assert_eq!(server.accept().await.unwrap().url, "c");
        assert_eq!(connector.urls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_close_reaches_client() {
        let (connector, mut server) = MemoryConnector::new();
        let (_sink, mut stream) = connector.connect("memory://gateway").await.unwrap();
        server.accept().await.unwrap().close(4004);

        let Some(Ok(WireMessage::Close(Some(frame)))) = stream.next().await else {
            panic!("expected close");
        };
        assert_eq!(frame.code, 4004);
        assert!(stream.next().await.is_none());
    }
}
