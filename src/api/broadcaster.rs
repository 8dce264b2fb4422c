//! Rate-limited frame broadcaster
//!
//! Connects to the local `/data_plugins` hub as a WebSocket client and
//! publishes the newest reduced frame on a fixed cadence. The send path
//! is latest-value-wins: the pipeline overwrites a single slot, and
//! each tick either sends the slot, skips it while the peer's backlog
//! is high, or force-closes a connection that never drains.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::dsp::SpectralFrame;

use super::types::WireMessage;

/// Peer backlog above which ticks skip instead of sending
pub const BACKLOG_LIMIT_BYTES: usize = 256 * 1024;
/// Consecutive skips before the connection is force-closed
pub const MAX_BACKLOG_HITS: u32 = 200;
/// Delay between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Default send cadence
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(30);

/// Single-slot handoff from the pipeline to the broadcaster.
/// Overwriting an unsent frame is the intended behavior.
#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<SpectralFrame>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot with a newer frame
    pub fn publish(&self, frame: SpectralFrame) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(frame);
        }
    }

    /// Whether a frame is waiting. Skipped ticks leave it in place so
    /// it survives until the backlog drains or the link is closed.
    pub fn has_frame(&self) -> bool {
        self.slot.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Take the pending frame, leaving the slot empty. Only called when
    /// the frame is actually being sent.
    pub fn snapshot(&self) -> Option<SpectralFrame> {
        self.slot.lock().ok().and_then(|mut guard| guard.take())
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
    }
}

/// What a send tick should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Nothing pending
    Idle,
    /// Backlog is fine, send the frame
    Send,
    /// Backlog too high, drop this frame and keep the link
    Skip,
    /// Backlog stayed high for too long, close the link
    ForceClose,
}

/// Per-connection backpressure policy. Skips count only while frames
/// are pending; a healthy send clears the streak.
pub struct SendGovernor {
    backlog_limit: usize,
    max_hits: u32,
    hits: u32,
}

impl Default for SendGovernor {
    fn default() -> Self {
        Self::new(BACKLOG_LIMIT_BYTES, MAX_BACKLOG_HITS)
    }
}

impl SendGovernor {
    pub fn new(backlog_limit: usize, max_hits: u32) -> Self {
        Self {
            backlog_limit,
            max_hits,
            hits: 0,
        }
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Decide the action for one tick given the peer's unsent byte count
    pub fn decide(&mut self, pending_bytes: usize, has_frame: bool) -> TickAction {
        if !has_frame {
            return TickAction::Idle;
        }
        if pending_bytes <= self.backlog_limit {
            self.hits = 0;
            return TickAction::Send;
        }

        self.hits += 1;
        if self.hits % 20 == 0 {
            tracing::warn!(
                "Send backlog at {} bytes, skipped {} frames",
                pending_bytes,
                self.hits
            );
        }
        if self.hits >= self.max_hits {
            TickAction::ForceClose
        } else {
            TickAction::Skip
        }
    }
}

/// WebSocket client that feeds the hub from the latest-frame slot
pub struct FrameBroadcaster {
    url: String,
    latest: LatestFrame,
    send_interval: Duration,
}

impl FrameBroadcaster {
    pub fn new(port: u16, latest: LatestFrame, send_interval: Duration) -> Self {
        Self {
            url: format!("ws://127.0.0.1:{}/data_plugins", port),
            latest,
            send_interval,
        }
    }

    /// Connect-and-publish loop with reconnect until shutdown
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tracing::info!("Connecting broadcaster to {}", self.url);
            match connect_async(&self.url).await {
                Ok((socket, _)) => {
                    tracing::info!("Broadcaster connected");
                    self.run_connection(socket, &mut shutdown).await;
                    tracing::info!("Broadcaster disconnected");
                }
                Err(e) => {
                    tracing::warn!("Broadcaster connect failed: {}", e);
                }
            }

            // Stale frames are worthless after a gap
            self.latest.clear();

            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Broadcaster stopped");
    }

    /// Drive one connection until it closes, is force-closed, or
    /// shutdown is requested. The governor starts fresh per connection.
    async fn run_connection<S>(
        &self,
        socket: tokio_tungstenite::WebSocketStream<S>,
        shutdown: &mut watch::Receiver<bool>,
    ) where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = socket.split();

        // Writer task owns the sink; pending_bytes tracks text queued
        // here but not yet handed to the transport.
        let pending_bytes = Arc::new(AtomicUsize::new(0));
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<String>();

        let writer_pending = pending_bytes.clone();
        let mut writer = tokio::spawn(async move {
            while let Some(text) = msg_rx.recv().await {
                let len = text.len();
                let result = sink.send(Message::Text(text)).await;
                writer_pending.fetch_sub(len, Ordering::Relaxed);
                if result.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // The hub relays frames back to every client including us;
        // drain and discard so the read half never backs up.
        let mut reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let mut governor = SendGovernor::default();
        let mut ticker = tokio::time::interval(self.send_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pending = pending_bytes.load(Ordering::Relaxed);
                    match governor.decide(pending, self.latest.has_frame()) {
                        TickAction::Idle => {}
                        // Skip leaves the frame in the slot: it stays
                        // sendable once the backlog drains, and keeps
                        // the hit counter moving while the pipeline
                        // is quiet
                        TickAction::Skip => {}
                        TickAction::Send => {
                            let frame = match self.latest.snapshot() {
                                Some(frame) => frame,
                                None => continue,
                            };
                            let text = match serde_json::to_string(&WireMessage::spectral(frame)) {
                                Ok(text) => text,
                                Err(e) => {
                                    tracing::error!("Frame encode failed: {}", e);
                                    continue;
                                }
                            };
                            pending_bytes.fetch_add(text.len(), Ordering::Relaxed);
                            if msg_tx.send(text).is_err() {
                                break;
                            }
                        }
                        TickAction::ForceClose => {
                            tracing::warn!(
                                "Closing stalled broadcaster link after {} backlog hits",
                                governor.hits()
                            );
                            self.latest.clear();
                            break;
                        }
                    }
                }
                _ = &mut writer => break,
                _ = &mut reader => break,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        writer.abort();
        reader.abort();
    }
}
