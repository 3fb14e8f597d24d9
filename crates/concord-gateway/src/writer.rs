use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{GatewayError, TransportError};
use crate::protocol::GatewayFrame;
use crate::transport::{CloseFrame, FrameSink, WireMessage};

/// Upper bound for sending the close frame and shutting the sink
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Write half of a connection, shared by the read loop and the heartbeat task
#[derive(Clone)]
pub(crate) struct FrameWriter {
    sink: Arc<Mutex<FrameSink>>,
    send_timeout: Duration,
}

impl FrameWriter {
    /// `send_timeout` bounds each send, waiting for the lock included
    pub(crate) fn new(sink: FrameSink, send_timeout: Duration) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            send_timeout,
        }
    }

    pub(crate) async fn send(&self, frame: &GatewayFrame) -> Result<(), GatewayError> {
        let text = frame.to_json().map_err(|source| GatewayError::Encode {
            op: frame.op.name(),
            source,
        })?;
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(WireMessage::Text(text)).await
        };
        tokio::time::timeout(self.send_timeout, write)
            .await
            .map_err(|_| TransportError::WriteTimeout(self.send_timeout))??;
        Ok(())
    }

    /// Send a close frame and shut the sink; errors are irrelevant at this point
    pub(crate) async fn close(&self, code: u16) {
        let shutdown = async {
            let mut sink = self.sink.lock().await;
            let _ = sink
                .send(WireMessage::Close(Some(CloseFrame::new(code, ""))))
                .await;
            let _ = sink.close().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            debug!(close_code = code, "close frame not written in time, dropping transport");
        }
    }
}
