//! Heartbeat timer and zombie detection
//!
//! The timer runs as its own task next to the read loop, so slow event
//! processing never delays a heartbeat.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::{GatewayError, TransportError};
use crate::protocol::GatewayFrame;
use crate::session::Sequence;
use crate::state::{ShardState, StateHandle};
use crate::writer::FrameWriter;

/// Heartbeat bookkeeping of one shard, kept across connections
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    inner: Mutex<MonitorState>,
}

#[derive(Debug, Default)]
struct MonitorState {
    awaiting_ack: bool,
    sent_at: Option<Instant>,
    latency: Option<Duration>,
}

impl HeartbeatMonitor {
    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.inner.lock().latency
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.inner.lock().awaiting_ack
    }

    /// Record a scheduled heartbeat; false if the previous one was never acknowledged
    pub(crate) fn begin(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.awaiting_ack {
            return false;
        }
        inner.awaiting_ack = true;
        inner.sent_at = Some(Instant::now());
        true
    }

    /// Record a heartbeat sent because the server asked for one
    ///
    /// Only the send time is taken; zombie detection stays with the scheduled beats.
    pub(crate) fn requested(&self) {
        self.inner.lock().sent_at = Some(Instant::now());
    }

    pub(crate) fn ack(&self) -> Option<Duration> {
        let mut inner = self.inner.lock();
        inner.awaiting_ack = false;
        if let Some(sent_at) = inner.sent_at.take() {
            inner.latency = Some(sent_at.elapsed());
        }
        inner.latency
    }

    /// Forget the previous connection's outstanding heartbeat
    pub(crate) fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.awaiting_ack = false;
        inner.sent_at = None;
    }
}

/// Periodic heartbeat task of one connection
pub(crate) struct Heartbeater {
    pub(crate) interval: Duration,
    pub(crate) writer: FrameWriter,
    pub(crate) sequence: Arc<Sequence>,
    pub(crate) monitor: Arc<HeartbeatMonitor>,
    pub(crate) state: StateHandle,
    /// Cancelled by this task when a heartbeat goes unacknowledged
    pub(crate) zombie: CancellationToken,
    pub(crate) stop: CancellationToken,
}

impl Heartbeater {
    pub(crate) async fn run(self) {
        // First beat lands at a random point of the first interval
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let first = Instant::now() + self.interval.mul_f64(jitter);
        let mut ticker = tokio::time::interval_at(first, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.stop.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if !self.monitor.begin() {
                warn!(
                    interval_ms = self.interval.as_millis() as u64,
                    "heartbeat was not acknowledged, connection is a zombie"
                );
                self.zombie.cancel();
                return;
            }
            self.state
                .transition(ShardState::Connected, ShardState::AwaitingHeartbeatAck);

            let seq = self.sequence.get();
            match self.writer.send(&GatewayFrame::heartbeat(seq)).await {
                Ok(()) => {}
                Err(GatewayError::Transport(TransportError::WriteTimeout(limit))) => {
                    warn!(
                        timeout_ms = limit.as_millis() as u64,
                        "heartbeat write stalled, connection is a zombie"
                    );
                    self.zombie.cancel();
                    return;
                }
                Err(e) => {
                    // The read loop sees the broken transport on its own
                    trace!(error = %e, "heartbeat send failed");
                    return;
                }
            }
            trace!(?seq, "heartbeat sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_monitor_detects_missing_ack() {
        let monitor = HeartbeatMonitor::default();
        assert!(monitor.begin());
        assert!(!monitor.begin());

        tokio::time::advance(Duration::from_millis(120)).await;
        assert_eq!(monitor.ack(), Some(Duration::from_millis(120)));
        assert!(!monitor.is_awaiting_ack());
        assert!(monitor.begin());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requested_beat_is_not_a_missed_ack() {
        let monitor = HeartbeatMonitor::default();
        monitor.requested();
        assert!(!monitor.is_awaiting_ack());
        assert!(monitor.begin());

        // An ack that answers the requested beat still clears the scheduled one
        tokio::time::advance(Duration::from_millis(30)).await;
        monitor.requested();
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(monitor.ack(), Some(Duration::from_millis(20)));
        assert!(monitor.begin());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_keeps_latency() {
        let monitor = HeartbeatMonitor::default();
        monitor.begin();
        tokio::time::advance(Duration::from_millis(40)).await;
        monitor.ack();
        monitor.begin();
        monitor.reset();
        assert!(!monitor.is_awaiting_ack());
        assert_eq!(monitor.latency(), Some(Duration::from_millis(40)));
    }
}
