//! Test helpers for integration tests
//!
//! Provides fake gateway and REST servers bound to loopback ports.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use concord_common::ClientConfig;

/// Longest any helper waits for the client before failing the test
pub const WAIT: Duration = Duration::from_secs(10);

/// Prefix the fake REST API is served under
pub const API_PREFIX: &str = "/api/v10";

async fn bind() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

/// Client configuration pointed at the fake servers
pub fn test_config(rest: &FakeRest) -> ClientConfig {
    let mut config = ClientConfig::new("integration-token");
    config.http.api_base_url = rest.base_url();
    config.gateway.identify_spacing_ms = 100;
    config.gateway.identify_jitter_ms = 0;
    config.backoff.base_ms = 50;
    config.backoff.max_ms = 200;
    config
}

// ============================================================================
// Fake gateway
// ============================================================================

/// Websocket server that hands every accepted connection to the test
pub struct FakeGateway {
    pub addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<GatewaySocket>,
    _handle: JoinHandle<()>,
}

impl FakeGateway {
    pub async fn start() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route("/gateway", get(upgrade))
            .with_state(tx);

        let (listener, addr) = bind().await?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            accepted: rx,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Wait for the next connection
    pub async fn accept(&mut self) -> Result<GatewaySocket> {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .context("no gateway connection")?
            .context("gateway server stopped")
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    RawQuery(query): RawQuery,
    State(accepted): State<mpsc::UnboundedSender<GatewaySocket>>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let _ = accepted.send(GatewaySocket {
            socket,
            query: query.unwrap_or_default(),
        });
    })
}

/// Server end of one gateway connection
pub struct GatewaySocket {
    socket: WebSocket,
    /// Query string the client connected with
    pub query: String,
}

impl GatewaySocket {
    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.socket.send(Message::Text(value.to_string())).await?;
        Ok(())
    }

    pub async fn hello(&mut self, heartbeat_interval: u64) -> Result<()> {
        self.send_json(&json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}}))
            .await
    }

    pub async fn dispatch(&mut self, event: &str, seq: u64, data: Value) -> Result<()> {
        self.send_json(&json!({"op": 0, "t": event, "s": seq, "d": data}))
            .await
    }

    pub async fn reconnect(&mut self) -> Result<()> {
        self.send_json(&json!({"op": 7, "d": null})).await
    }

    /// Next JSON frame from the client; `None` once it closed
    pub async fn recv_json(&mut self) -> Result<Option<Value>> {
        loop {
            let message = tokio::time::timeout(WAIT, self.socket.recv())
                .await
                .context("client went quiet")?;
            match message {
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Next frame that is not a heartbeat, acknowledging heartbeats on the way
    pub async fn recv_command(&mut self) -> Result<Value> {
        loop {
            let frame = self.recv_json().await?.context("client closed")?;
            if frame["op"] == 1 {
                self.send_json(&json!({"op": 11})).await?;
                continue;
            }
            return Ok(frame);
        }
    }

    /// Close the connection with `code`
    pub async fn close(mut self, code: u16) -> Result<()> {
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: "".into(),
            })))
            .await?;
        Ok(())
    }

    /// Wait for the client to close, returning the code it sent
    pub async fn closed(&mut self) -> Result<Option<u16>> {
        loop {
            let message = tokio::time::timeout(WAIT, self.socket.recv())
                .await
                .context("client never closed")?;
            match message {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| f.code)),
                Some(Ok(Message::Text(text))) => {
                    // Keep the session alive while waiting
                    let frame: Value = serde_json::from_str(&text)?;
                    if frame["op"] == 1 {
                        self.send_json(&json!({"op": 11})).await?;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Ok(None),
            }
        }
    }
}

// ============================================================================
// Fake REST API
// ============================================================================

/// A canned response
#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl Scripted {
    pub fn ok(body: Value) -> Self {
        Self::status(StatusCode::OK, body)
    }

    pub fn status(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// 429 carrying `retry_after` seconds in both the body and the header
    pub fn rate_limited(retry_after: f64, global: bool) -> Self {
        let mut scripted = Self::status(
            StatusCode::TOO_MANY_REQUESTS,
            crate::fixtures::rate_limited(retry_after, global),
        )
        .header("retry-after", retry_after.ceil().to_string());
        if global {
            scripted = scripted
                .header("x-ratelimit-global", "true")
                .header("x-ratelimit-scope", "global");
        }
        scripted
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Attach bucket headers
    pub fn bucket(self, bucket: &str, limit: u32, remaining: u32, reset_after: f64) -> Self {
        self.header("x-ratelimit-bucket", bucket)
            .header("x-ratelimit-limit", limit.to_string())
            .header("x-ratelimit-remaining", remaining.to_string())
            .header("x-ratelimit-reset-after", reset_after.to_string())
    }
}

impl IntoResponse for Scripted {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::try_from(value) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(name), value);
            }
        }
        response
    }
}

/// One request the fake API received
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub authorization: Option<String>,
    pub at: Instant,
}

#[derive(Clone, Default)]
struct RestState {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

/// REST server answering from per-route scripts, 404 when a script runs dry
pub struct FakeRest {
    pub addr: SocketAddr,
    state: RestState,
    _handle: JoinHandle<()>,
}

impl FakeRest {
    pub async fn start() -> Result<Self> {
        let state = RestState::default();
        let app = Router::new().fallback(respond).with_state(state.clone());

        let (listener, addr) = bind().await?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}{API_PREFIX}", self.addr)
    }

    /// Queue `response` for the next `method path` request
    pub fn script(&self, method: Method, path: &str, response: Scripted) {
        self.state
            .scripts
            .lock()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(response);
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().clone()
    }

    pub fn hits_for(&self, path: &str) -> Vec<Hit> {
        self.hits().into_iter().filter(|h| h.path == path).collect()
    }
}

async fn respond(
    State(state): State<RestState>,
    method: Method,
    headers: axum::http::HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(uri.path())
        .to_string();

    state.hits.lock().push(Hit {
        method: method.clone(),
        path: path.clone(),
        body: serde_json::from_slice(&body).ok(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        at: Instant::now(),
    });

    let scripted = state
        .scripts
        .lock()
        .get_mut(&format!("{method} {path}"))
        .and_then(VecDeque::pop_front);
    match scripted {
        Some(response) => response.into_response(),
        None => Scripted::status(
            StatusCode::NOT_FOUND,
            json!({"message": "404: Not Found", "code": 0}),
        )
        .into_response(),
    }
}
