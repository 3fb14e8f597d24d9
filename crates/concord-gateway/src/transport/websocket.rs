use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::{CloseFrame, Connector, FrameSink, FrameStream, WireMessage};
use crate::error::TransportError;

/// Connector backed by `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::connect(url, e))?;
        debug!(url, "websocket connected");

        let (sink, stream) = socket.split();

        let sink = sink
            .sink_map_err(TransportError::from)
            .with(|message: WireMessage| future::ready(Ok::<_, TransportError>(to_ws(message))));

        let stream = stream.filter_map(|item| {
            future::ready(match item {
                Ok(Message::Text(text)) => Some(Ok(WireMessage::Text(text))),
                Ok(Message::Close(frame)) => Some(Ok(WireMessage::Close(frame.map(|f| {
                    CloseFrame::new(u16::from(f.code), f.reason.into_owned())
                })))),
                // Pings are answered by tungstenite; binary frames only carry
                // compressed payloads, which are never requested
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

fn to_ws(message: WireMessage) -> Message {
    match message {
        WireMessage::Text(text) => Message::Text(text),
        WireMessage::Close(frame) => Message::Close(frame.map(|f| WsCloseFrame {
            code: WsCloseCode::from(f.code),
            reason: f.reason.into(),
        })),
    }
}
