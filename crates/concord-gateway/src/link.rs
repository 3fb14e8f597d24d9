//! Gateway link
//!
//! One link owns one shard's connection. It opens the transport, waits for
//! Hello, identifies or resumes, then runs the read loop while a separate
//! heartbeat task keeps the connection alive. Transport failures reconnect
//! with backoff; protocol reconnect requests resume immediately.
//!
//! ```text
//! Disconnected -> Connecting -> Identifying -> Connected <-> AwaitingHeartbeatAck
//!                          \--> Resuming ----/        |
//!                  Reconnecting <--------------------/
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Instrument};

use concord_common::{shard_span, Classify, ClientConfig, FailureClass};
use concord_core::Intents;

use crate::backoff::Backoff;
use crate::error::{GatewayError, TransportError};
use crate::heartbeat::{HeartbeatMonitor, Heartbeater};
use crate::identify::{IdentifyGate, IdentifyPermit};
use crate::messenger::ShardMessenger;
use crate::protocol::{
    close_action, CloseAction, CloseCode, GatewayFrame, IdentifyPayload, IdentifyProperties,
    OpCode, PresenceUpdatePayload, ReadySession, ResumePayload,
};
use crate::session::{Sequence, Session};
use crate::state::{ShardState, StateHandle};
use crate::transport::{Connector, FrameStream, WireMessage};
use crate::writer::FrameWriter;

/// Gateway API version requested on every connection
const API_VERSION: u8 = 10;

/// Commands queued for a shard before they are sent
const COMMAND_BUFFER: usize = 32;

/// Close code that ends the connection but keeps the session resumable
const CLOSE_RESUMABLE: u16 = 4000;
const CLOSE_NORMAL: u16 = 1000;

/// Per-shard link settings
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub token: String,
    pub intents: Intents,
    pub shard_id: u32,
    pub shard_count: u32,
    pub gateway_url: String,
    pub large_threshold: u32,
    pub hello_timeout: Duration,
    pub backoff: Backoff,
    pub max_reconnect_attempts: u32,
    pub presence: Option<PresenceUpdatePayload>,
}

impl LinkConfig {
    pub fn new(
        config: &ClientConfig,
        shard_id: u32,
        shard_count: u32,
        gateway_url: impl Into<String>,
    ) -> Self {
        Self {
            token: config.token.clone(),
            intents: config.intents,
            shard_id,
            shard_count,
            gateway_url: gateway_url.into(),
            large_threshold: config.gateway.large_threshold,
            hello_timeout: config.gateway.hello_timeout(),
            backoff: Backoff::from_config(&config.backoff),
            max_reconnect_attempts: config.backoff.max_reconnect_attempts,
            presence: None,
        }
    }
}

/// A dispatch received by a link, in sequence order
#[derive(Debug, Clone)]
pub struct DispatchFrame {
    pub shard_id: u32,
    pub seq: u64,
    pub name: String,
    pub data: Value,
}

/// Read side of a running link
#[derive(Debug, Clone)]
pub struct LinkHandle {
    shard_id: u32,
    state: watch::Receiver<ShardState>,
    monitor: Arc<HeartbeatMonitor>,
    messenger: ShardMessenger,
}

impl LinkHandle {
    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn state(&self) -> ShardState {
        *self.state.borrow()
    }

    pub fn latency(&self) -> Option<Duration> {
        self.monitor.latency()
    }

    pub fn messenger(&self) -> &ShardMessenger {
        &self.messenger
    }

    /// Wait until the link reaches a state matching `predicate`
    pub async fn wait_for(&mut self, predicate: impl FnMut(&ShardState) -> bool) -> ShardState {
        let reached = self.state.wait_for(predicate).await.map(|state| *state);
        // Once the link is gone its last state is final
        reached.unwrap_or_else(|_| *self.state.borrow())
    }
}

/// How one connection ended
#[derive(Debug)]
enum ConnectionEnd {
    /// Cancelled by the owner
    Shutdown,
    /// Reconnect now and resume
    Resume,
    /// Session discarded; identify again after the delay
    Reidentify(Duration),
    /// Transport closed with this code (absent for a bare close)
    Closed(Option<u16>),
}

/// One shard's gateway connection state machine
pub struct GatewayLink {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    identify: Arc<IdentifyGate>,
    session: Option<Session>,
    sequence: Arc<Sequence>,
    monitor: Arc<HeartbeatMonitor>,
    state: StateHandle,
    dispatches: mpsc::UnboundedSender<DispatchFrame>,
    commands: mpsc::Receiver<GatewayFrame>,
    cancel: CancellationToken,
    failures: u32,
}

impl GatewayLink {
    pub fn new(
        config: LinkConfig,
        connector: Arc<dyn Connector>,
        identify: Arc<IdentifyGate>,
        dispatches: mpsc::UnboundedSender<DispatchFrame>,
        cancel: CancellationToken,
    ) -> (Self, LinkHandle) {
        let (state, state_rx) = StateHandle::new();
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let monitor = Arc::new(HeartbeatMonitor::default());

        let handle = LinkHandle {
            shard_id: config.shard_id,
            state: state_rx,
            monitor: Arc::clone(&monitor),
            messenger: ShardMessenger::new(config.shard_id, command_tx),
        };
        let link = Self {
            config,
            connector,
            identify,
            session: None,
            sequence: Arc::new(Sequence::default()),
            monitor,
            state,
            dispatches,
            commands,
            cancel,
            failures: 0,
        };
        (link, handle)
    }

    pub fn shard_id(&self) -> u32 {
        self.config.shard_id
    }

    /// Session kept for the next resume, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> ShardState {
        self.state.get()
    }

    /// Run until cancelled or a failure that reconnecting cannot fix
    ///
    /// The session survives an `Err` return, so running the link again
    /// resumes where it stopped.
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        let span = shard_span(self.config.shard_id, self.config.shard_count);
        let result = self.run_connections().instrument(span).await;
        self.state.set(ShardState::Disconnected);
        result
    }

    async fn run_connections(&mut self) -> Result<(), GatewayError> {
        self.failures = 0;

        loop {
            let end = match self.connect_once().await {
                Ok(end) => end,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, code = e.error_code(), "gateway connection failed");
                    let delay = self.next_backoff(e.to_string())?;
                    if self.sleep(delay).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            let delay = match end {
                ConnectionEnd::Shutdown => return Ok(()),
                ConnectionEnd::Resume => {
                    self.state.set(ShardState::Reconnecting);
                    continue;
                }
                ConnectionEnd::Reidentify(delay) => {
                    self.invalidate_session();
                    delay
                }
                ConnectionEnd::Closed(code) => {
                    let fatal = code.and_then(CloseCode::from_u16).filter(|c| c.is_fatal());
                    if let Some(fatal) = fatal {
                        warn!(close_code = fatal.as_u16(), "gateway closed the session for good");
                        return Err(GatewayError::FatalClose(fatal));
                    }
                    let class = match close_action(code) {
                        CloseAction::Reidentify => {
                            self.invalidate_session();
                            FailureClass::NonResumableSessionLoss
                        }
                        _ => FailureClass::ResumableSessionLoss,
                    };
                    info!(close_code = ?code, %class, "gateway connection closed");
                    self.next_backoff(format!("closed with {code:?}"))?
                }
            };

            if self.sleep(delay).await {
                return Ok(());
            }
        }
    }

    /// Count a failed connection and pick the delay before the next one
    fn next_backoff(&mut self, reason: String) -> Result<Duration, GatewayError> {
        self.failures += 1;
        if self.failures > self.config.max_reconnect_attempts {
            return Err(GatewayError::ReconnectsExhausted {
                attempts: self.config.max_reconnect_attempts,
                last: reason,
            });
        }
        Ok(self.config.backoff.delay(self.failures))
    }

    /// Wait in `Reconnecting`; true if cancelled meanwhile
    async fn sleep(&self, delay: Duration) -> bool {
        self.state.set(ShardState::Reconnecting);
        debug!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.failures,
            "reconnecting after delay"
        );
        tokio::select! {
            () = self.cancel.cancelled() => true,
            () = tokio::time::sleep(delay) => false,
        }
    }

    fn invalidate_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(session_id = session.id(), "session invalidated");
        }
        self.sequence.reset();
    }

    fn connected(&mut self) {
        self.failures = 0;
        self.state.set(ShardState::Connected);
    }

    async fn connect_once(&mut self) -> Result<ConnectionEnd, GatewayError> {
        let resuming = self.session.clone();

        // Only a fresh identify counts against the concurrency quota
        let permit = match resuming {
            Some(_) => None,
            None => tokio::select! {
                () = self.cancel.cancelled() => return Ok(ConnectionEnd::Shutdown),
                permit = self.identify.acquire(self.config.shard_id) => Some(permit),
            },
        };

        self.state.set(ShardState::Connecting);
        let base = resuming
            .as_ref()
            .and_then(Session::resume_url)
            .unwrap_or(self.config.gateway_url.as_str());
        let url = gateway_url(base);
        debug!(%url, resuming = resuming.is_some(), "connecting");

        let (sink, mut stream) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(ConnectionEnd::Shutdown),
            connection = self.connector.connect(&url) => connection?,
        };

        let hello = tokio::select! {
            () = self.cancel.cancelled() => return Ok(ConnectionEnd::Shutdown),
            hello = tokio::time::timeout(self.config.hello_timeout, stream.next()) => hello,
        };
        let interval = match hello {
            Err(_) => return Err(TransportError::HelloTimeout(self.config.hello_timeout).into()),
            Ok(None) => return Err(TransportError::Closed.into()),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(Some(Ok(WireMessage::Close(frame)))) => {
                return Ok(ConnectionEnd::Closed(frame.map(|f| f.code)));
            }
            Ok(Some(Ok(WireMessage::Text(text)))) => {
                let frame = GatewayFrame::from_json(&text).map_err(TransportError::from)?;
                match frame.as_hello() {
                    Some(hello) if hello.heartbeat_interval > 0 => {
                        Duration::from_millis(hello.heartbeat_interval)
                    }
                    _ => return Err(TransportError::UnexpectedFrame(frame.to_string()).into()),
                }
            }
        };
        debug!(heartbeat_interval_ms = interval.as_millis() as u64, "received hello");

        let writer = FrameWriter::new(sink, interval);
        self.monitor.reset();

        let zombie = CancellationToken::new();
        let stop = self.cancel.child_token();
        let _stop_heartbeat = stop.clone().drop_guard();
        let heartbeater = Heartbeater {
            interval,
            writer: writer.clone(),
            sequence: Arc::clone(&self.sequence),
            monitor: Arc::clone(&self.monitor),
            state: self.state.clone(),
            zombie: zombie.clone(),
            stop,
        };
        tokio::spawn(heartbeater.run().in_current_span());

        match resuming {
            Some(session) => self.send_resume(&writer, &session).await?,
            None => self.send_identify(&writer, permit).await?,
        }

        self.read_loop(&writer, &mut stream, &zombie).await
    }

    async fn send_identify(
        &mut self,
        writer: &FrameWriter,
        permit: Option<IdentifyPermit>,
    ) -> Result<(), GatewayError> {
        self.state.set(ShardState::Identifying);
        self.sequence.reset();

        let payload = IdentifyPayload {
            token: self.config.token.clone(),
            properties: IdentifyProperties::default(),
            intents: self.config.intents,
            shard: [self.config.shard_id, self.config.shard_count],
            large_threshold: self.config.large_threshold,
            presence: self.config.presence.clone(),
        };
        let frame = GatewayFrame::identify(&payload).map_err(|source| GatewayError::Encode {
            op: "Identify",
            source,
        })?;
        writer.send(&frame).await?;
        info!(intents = self.config.intents.bits(), "identify sent");

        if let Some(permit) = permit {
            permit.identified();
        }
        Ok(())
    }

    async fn send_resume(
        &mut self,
        writer: &FrameWriter,
        session: &Session,
    ) -> Result<(), GatewayError> {
        self.state.set(ShardState::Resuming);

        let seq = self.sequence.get().unwrap_or(0);
        let payload = ResumePayload {
            token: self.config.token.clone(),
            session_id: session.id().to_string(),
            seq,
        };
        let frame = GatewayFrame::resume(&payload).map_err(|source| GatewayError::Encode {
            op: "Resume",
            source,
        })?;
        writer.send(&frame).await?;
        info!(session_id = session.id(), seq, "resume sent");
        Ok(())
    }

    async fn read_loop(
        &mut self,
        writer: &FrameWriter,
        stream: &mut FrameStream,
        zombie: &CancellationToken,
    ) -> Result<ConnectionEnd, GatewayError> {
        loop {
            let draining = self.state.get().is_connected();

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    writer.close(CLOSE_NORMAL).await;
                    return Ok(ConnectionEnd::Shutdown);
                }
                () = zombie.cancelled() => {
                    writer.close(CLOSE_RESUMABLE).await;
                    return Ok(ConnectionEnd::Resume);
                }
                Some(command) = self.commands.recv(), if draining => {
                    trace!(op = %command.op, "sending command");
                    writer.send(&command).await?;
                }
                message = stream.next() => match message {
                    None => return Err(TransportError::Closed.into()),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(WireMessage::Close(frame))) => {
                        return Ok(ConnectionEnd::Closed(frame.map(|f| f.code)));
                    }
                    Some(Ok(WireMessage::Text(text))) => {
                        if let Some(end) = self.handle_text(writer, &text).await? {
                            return Ok(end);
                        }
                    }
                },
            }
        }
    }

    async fn handle_text(
        &mut self,
        writer: &FrameWriter,
        text: &str,
    ) -> Result<Option<ConnectionEnd>, GatewayError> {
        let frame = match GatewayFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "skipping undecodable frame");
                return Ok(None);
            }
        };

        match frame.op {
            OpCode::Dispatch => Ok(self.handle_dispatch(frame)),
            OpCode::Heartbeat => {
                self.monitor.requested();
                writer.send(&GatewayFrame::heartbeat(self.sequence.get())).await?;
                trace!("heartbeat sent on request");
                Ok(None)
            }
            OpCode::HeartbeatAck => {
                if let Some(latency) = self.monitor.ack() {
                    trace!(latency_ms = latency.as_millis() as u64, "heartbeat acknowledged");
                }
                self.state
                    .transition(ShardState::AwaitingHeartbeatAck, ShardState::Connected);
                Ok(None)
            }
            OpCode::Reconnect => {
                info!(
                    class = %FailureClass::ResumableSessionLoss,
                    "gateway requested a reconnect"
                );
                writer.close(CLOSE_RESUMABLE).await;
                Ok(Some(ConnectionEnd::Resume))
            }
            OpCode::InvalidSession => {
                if frame.is_resumable() {
                    info!(
                        class = %FailureClass::ResumableSessionLoss,
                        "session invalidated, resumable"
                    );
                    writer.close(CLOSE_RESUMABLE).await;
                    return Ok(Some(ConnectionEnd::Resume));
                }
                let delay = Duration::from_millis(rand::thread_rng().gen_range(1000..=5000));
                info!(
                    class = %FailureClass::NonResumableSessionLoss,
                    delay_ms = delay.as_millis() as u64,
                    "session invalidated, identifying again"
                );
                writer.close(CLOSE_NORMAL).await;
                Ok(Some(ConnectionEnd::Reidentify(delay)))
            }
            op => {
                trace!(%op, "ignoring frame");
                Ok(None)
            }
        }
    }

    fn handle_dispatch(&mut self, frame: GatewayFrame) -> Option<ConnectionEnd> {
        let (Some(seq), Some(name)) = (frame.s, frame.t) else {
            warn!("dispatch without sequence or event name");
            return None;
        };
        if !self.sequence.advance(seq) {
            debug!(seq, event = %name, "dropping replayed dispatch");
            return None;
        }

        match name.as_str() {
            "READY" => match serde_json::from_value::<ReadySession>(frame.d.clone()) {
                Ok(ready) => {
                    info!(session_id = %ready.session_id, "session established");
                    self.session = Some(Session::new(
                        self.config.shard_id,
                        ready.session_id,
                        ready.resume_gateway_url,
                        Arc::clone(&self.sequence),
                    ));
                    self.connected();
                }
                Err(e) => warn!(error = %e, "READY without a usable session"),
            },
            "RESUMED" => {
                info!(seq, "session resumed");
                self.connected();
            }
            _ => {}
        }

        let dispatch = DispatchFrame {
            shard_id: self.config.shard_id,
            seq,
            name,
            data: frame.d,
        };
        if self.dispatches.send(dispatch).is_err() {
            debug!("dispatcher stopped, closing link");
            return Some(ConnectionEnd::Shutdown);
        }
        None
    }
}

impl std::fmt::Debug for GatewayLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayLink")
            .field("shard_id", &self.config.shard_id)
            .field("state", &self.state.get())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Append the version and encoding query unless the URL already has them
fn gateway_url(base: &str) -> String {
    if base.contains("encoding=") {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}v={API_VERSION}&encoding=json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{FakeConnection, MemoryConnector, MemoryServer};
    use serde_json::json;
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    struct Harness {
        server: MemoryServer,
        connector: MemoryConnector,
        dispatches: mpsc::UnboundedReceiver<DispatchFrame>,
        handle: LinkHandle,
        cancel: CancellationToken,
        task: JoinHandle<(GatewayLink, Result<(), GatewayError>)>,
    }

    fn link_config() -> LinkConfig {
        let mut config = ClientConfig::new("secret");
        config.backoff.max_reconnect_attempts = 3;
        LinkConfig::new(&config, 0, 1, "memory://gateway")
    }

    fn start(config: LinkConfig) -> Harness {
        let (connector, server) = MemoryConnector::new();
        let gate = Arc::new(IdentifyGate::new(1, Duration::from_secs(5), Duration::ZERO));
        let (tx, dispatches) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let (mut link, handle) =
            GatewayLink::new(config, Arc::new(connector.clone()), gate, tx, cancel.clone());
        let task = tokio::spawn(async move {
            let result = link.run().await;
            (link, result)
        });
        Harness {
            server,
            connector,
            dispatches,
            handle,
            cancel,
            task,
        }
    }

    fn ready(session_id: &str) -> Value {
        json!({
            "v": 10,
            "session_id": session_id,
            "resume_gateway_url": "memory://resume",
            "user": {"id": "1", "username": "bot"},
            "guilds": []
        })
    }

    /// Accept a connection, say hello, expect identify and answer READY with seq 1
    async fn establish(h: &mut Harness) -> FakeConnection {
        let mut conn = h.server.accept().await.unwrap();
        conn.hello(41_250);
        let identify = conn.recv_command().await.unwrap();
        assert_eq!(identify.op, OpCode::Identify);
        conn.dispatch("READY", 1, ready("abc"));
        h.handle.wait_for(|s| s.is_connected()).await;
        conn
    }

    async fn next_seq(h: &mut Harness) -> u64 {
        h.dispatches.recv().await.unwrap().seq
    }

    #[test]
    fn test_gateway_url_query() {
        assert_eq!(gateway_url("wss://gw.example"), "wss://gw.example?v=10&encoding=json");
        assert_eq!(gateway_url("wss://gw.example/?x=1"), "wss://gw.example/?x=1&v=10&encoding=json");
        assert_eq!(gateway_url("wss://gw.example/?v=10&encoding=json"), "wss://gw.example/?v=10&encoding=json");
    }

    #[tokio::test(start_paused = true)]
    async fn test_identify_then_ready() {
        let mut h = start(link_config());
        let mut conn = h.server.accept().await.unwrap();
        assert_eq!(conn.url, "memory://gateway?v=10&encoding=json");

        conn.hello(41_250);
        let identify = conn.recv_command().await.unwrap().as_identify().unwrap();
        assert_eq!(identify.token, "secret");
        assert_eq!(identify.shard, [0, 1]);
        assert_eq!(identify.large_threshold, 250);
        assert_eq!(h.handle.state(), ShardState::Identifying);

        conn.dispatch("READY", 1, ready("abc"));
        assert_eq!(h.handle.wait_for(|s| s.is_connected()).await, ShardState::Connected);

        let dispatch = h.dispatches.recv().await.unwrap();
        assert_eq!(dispatch.name, "READY");
        assert_eq!(dispatch.seq, 1);
        assert_eq!(dispatch.shard_id, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_cadence() {
        let mut h = start(link_config());
        let mut conn = h.server.accept().await.unwrap();
        let hello_at = Instant::now();
        conn.hello(41_250);

        let mut beats = Vec::new();
        while beats.len() < 4 {
            let frame = conn.recv_frame().await.unwrap();
            if frame.op == OpCode::Heartbeat {
                beats.push(Instant::now());
                conn.heartbeat_ack();
            }
        }

        assert!(beats[0] - hello_at <= Duration::from_millis(41_250));
        for pair in beats.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(41_249), "{gap:?}");
            assert!(gap <= Duration::from_millis(41_251), "{gap:?}");
        }
        assert!(h.handle.latency().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_carries_last_sequence() {
        let mut h = start(link_config());
        let mut conn = establish(&mut h).await;
        conn.dispatch("TYPING_START", 2, json!({}));
        assert_eq!(next_seq(&mut h).await, 1);
        assert_eq!(next_seq(&mut h).await, 2);

        loop {
            let frame = conn.recv_frame().await.unwrap();
            if frame.op == OpCode::Heartbeat && frame.d == json!(2) {
                break;
            }
            conn.heartbeat_ack();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zombie_connection_resumes_session() {
        let mut h = start(link_config());
        let mut conn = establish(&mut h).await;
        conn.dispatch("TYPING_START", 2, json!({}));

        // Stop acknowledging: the next scheduled beat finds the previous one pending
        loop {
            if conn.recv_frame().await.unwrap().op == OpCode::Heartbeat {
                break;
            }
        }
        assert_eq!(conn.closed().await, Some(4000));

        let mut conn = h.server.accept().await.unwrap();
        assert_eq!(conn.url, "memory://resume?v=10&encoding=json");
        conn.hello(41_250);
        let resume = conn.recv_command().await.unwrap().as_resume().unwrap();
        assert_eq!(resume.session_id, "abc");
        assert_eq!(resume.seq, 2);
        assert_eq!(h.handle.state(), ShardState::Resuming);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_heartbeat_write_resumes_session() {
        let mut h = start(link_config());
        // Identify goes through, then the socket stops taking writes
        h.connector.stall_writes_after(1);
        let mut stalled = establish(&mut h).await;
        let began = Instant::now();

        let mut conn = h.server.accept().await.unwrap();
        // First beat within one interval, its write bounded by another, then the close bound
        assert!(began.elapsed() <= Duration::from_millis(2 * 41_250) + crate::writer::CLOSE_TIMEOUT);
        assert_eq!(conn.url, "memory://resume?v=10&encoding=json");
        assert_eq!(stalled.recv().await, None);

        conn.hello(41_250);
        let resume = conn.recv_command().await.unwrap().as_resume().unwrap();
        assert_eq!(resume.session_id, "abc");
        assert_eq!(resume.seq, 1);
        assert_eq!(h.connector.urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_request_resumes() {
        let mut h = start(link_config());
        let mut conn = establish(&mut h).await;

        conn.send_frame(&GatewayFrame::reconnect());
        assert_eq!(conn.closed().await, Some(4000));

        let mut conn = h.server.accept().await.unwrap();
        conn.hello(41_250);
        let frame = conn.recv_command().await.unwrap();
        assert_eq!(frame.op, OpCode::Resume);
        assert_eq!(frame.as_resume().unwrap().session_id, "abc");

        conn.dispatch("RESUMED", 2, json!({}));
        assert_eq!(h.handle.wait_for(|s| s.is_connected()).await, ShardState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_replay_has_no_gaps_or_duplicates() {
        let mut h = start(link_config());
        let conn = establish(&mut h).await;
        conn.dispatch("TYPING_START", 2, json!({}));
        conn.dispatch("TYPING_START", 3, json!({}));
        for expected in 1..=3 {
            assert_eq!(next_seq(&mut h).await, expected);
        }
        conn.fail();

        let mut conn = h.server.accept().await.unwrap();
        conn.hello(41_250);
        let resume = conn.recv_command().await.unwrap().as_resume().unwrap();
        assert_eq!(resume.seq, 3);

        // The server replays from an older point than the client asked for
        for seq in 2..=5 {
            conn.dispatch("TYPING_START", seq, json!({}));
        }
        conn.dispatch("RESUMED", 6, json!({}));

        for expected in 4..=6 {
            assert_eq!(next_seq(&mut h).await, expected);
        }
        assert!(h.dispatches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_close_stops_link() {
        let mut h = start(link_config());
        let mut conn = h.server.accept().await.unwrap();
        conn.hello(41_250);
        conn.recv_command().await.unwrap();
        conn.close(4004);

        let (link, result) = h.task.await.unwrap();
        assert!(matches!(
            result,
            Err(GatewayError::FatalClose(CloseCode::AuthenticationFailed))
        ));
        assert_eq!(link.state(), ShardState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_session_identifies_again() {
        let mut h = start(link_config());
        let mut conn = establish(&mut h).await;

        let invalidated_at = Instant::now();
        conn.send_frame(&GatewayFrame::invalid_session(false));
        assert_eq!(conn.closed().await, Some(1000));

        let mut conn = h.server.accept().await.unwrap();
        assert!(invalidated_at.elapsed() >= Duration::from_secs(1));
        assert_eq!(conn.url, "memory://gateway?v=10&encoding=json");
        conn.hello(41_250);
        assert_eq!(conn.recv_command().await.unwrap().op, OpCode::Identify);

        conn.dispatch("READY", 1, ready("def"));
        h.handle.wait_for(|s| s.is_connected()).await;
        assert_eq!(next_seq(&mut h).await, 1);
        assert_eq!(next_seq(&mut h).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hello_timeout_backs_off() {
        let mut h = start(link_config());
        let _silent = h.server.accept().await.unwrap();
        let began = Instant::now();

        let _conn = h.server.accept().await.unwrap();
        // 20 s hello timeout plus the first backoff of at least 750 ms
        assert!(began.elapsed() >= Duration::from_millis(20_750));
        assert_eq!(h.connector.urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failures_exhaust_attempts() {
        let h = start(link_config());
        h.connector.fail_next(10);

        let (_, result) = h.task.await.unwrap();
        assert!(matches!(
            result,
            Err(GatewayError::ReconnectsExhausted { attempts: 3, .. })
        ));
        assert_eq!(h.connector.urls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_wait_for_session() {
        let mut h = start(link_config());
        h.handle
            .messenger()
            .update_presence(&PresenceUpdatePayload::default())
            .await
            .unwrap();

        let mut conn = establish(&mut h).await;
        assert_eq!(conn.recv_command().await.unwrap().op, OpCode::PresenceUpdate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_cleanly() {
        let mut h = start(link_config());
        let mut conn = establish(&mut h).await;

        h.cancel.cancel();
        assert_eq!(conn.closed().await, Some(1000));
        let (link, result) = h.task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(link.state(), ShardState::Disconnected);
        assert_eq!(link.session().map(Session::id), Some("abc"));
    }
}
