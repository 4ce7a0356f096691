// ABOUTME: StreamLink owns the backend connection lifecycle for one detector instance
// ABOUTME: Connect, mode handshake, heartbeat, message dispatch, and fixed-delay reconnects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Stream Link
//!
//! Each connect attempt spawns one connection task that pumps text between the
//! socket and the detector loop. The task never touches state: it only reports
//! [`LinkEvent`]s tagged with the generation it was started for, and the link
//! ignores events whose generation is no longer current. A closed connection
//! is never reused; reconnecting always starts a new generation.
//!
//! Outbound messages go through a small bounded queue. Frames are dropped
//! rather than queued once the queue is nearly full, which keeps one slot free
//! for control messages.

/// Wire message types
pub mod protocol;
/// Connector abstraction and the WebSocket implementation
pub mod transport;

pub use protocol::{ClientMessage, ServerMessage};
pub use transport::{Connector, WebSocketConnector, WireSink, WireStream};

use crate::capture::EncodedFrame;
use crate::constants::timing;
use crate::errors::ErrorCode;
use crate::models::Mode;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No connection and none pending
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Open and usable
    Connected,
}

/// Report from a connection task to the owning link
#[derive(Debug)]
pub enum LinkEvent {
    /// The socket opened; `outbound` feeds its write half
    Opened {
        /// Connection generation
        generation: u64,
        /// Queue drained by the connection task
        outbound: mpsc::Sender<String>,
    },
    /// A text payload arrived
    Inbound {
        /// Connection generation
        generation: u64,
        /// Raw payload
        raw: String,
    },
    /// The socket closed or never opened
    Closed {
        /// Connection generation
        generation: u64,
        /// Failure description, `None` for a clean local close
        reason: Option<String>,
    },
}

impl LinkEvent {
    /// Generation this event belongs to
    #[must_use]
    pub const fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation, .. }
            | Self::Inbound { generation, .. }
            | Self::Closed { generation, .. } => *generation,
        }
    }
}

/// What the detector needs to know after the link processed an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkUpdate {
    /// The connection opened and the mode handshake was sent
    Connected,
    /// The connection closed or the attempt failed; a reconnect is scheduled
    Disconnected {
        /// Whether the closing connection had opened
        was_open: bool,
    },
    /// A well-formed backend message
    Message(ServerMessage),
}

/// Transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Messages handed to a connection task
    pub messages_sent: u64,
    /// Frames handed to a connection task
    pub frames_sent: u64,
    /// Frames dropped because the outbound queue was full
    pub frames_dropped: u64,
    /// Payloads received
    pub messages_received: u64,
    /// Payloads discarded as malformed
    pub malformed_messages: u64,
    /// Connect attempts started
    pub connect_attempts: u64,
    /// Reconnects scheduled after a close or failed open
    pub reconnects_scheduled: u64,
}

/// Owner of the backend connection
pub struct StreamLink {
    url: String,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<LinkEvent>,
    status: ConnectionStatus,
    generation: u64,
    outbound: Option<mpsc::Sender<String>>,
    task: Option<JoinHandle<()>>,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    reconnect_at: Option<Instant>,
    mode: Mode,
    stats: LinkStats,
}

impl StreamLink {
    /// Create a disconnected link and the receiver its connection tasks report to
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        mode: Mode,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let link = Self {
            url: url.into(),
            connector,
            events,
            status: ConnectionStatus::Disconnected,
            generation: 0,
            outbound: None,
            task: None,
            reconnect_delay: Duration::from_millis(timing::RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_secs(timing::CONNECT_TIMEOUT_SECS),
            reconnect_at: None,
            mode,
            stats: LinkStats::default(),
        };
        (link, receiver)
    }

    /// Override the reconnect delay
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Override the connect timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether messages can be sent right now
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.outbound.is_some()
    }

    /// Current connection generation
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Mode sent at the next handshake
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Transport counters
    #[must_use]
    pub const fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Backend endpoint
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// When the pending reconnect fires
    #[must_use]
    pub const fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Start a fresh connection attempt, abandoning any previous one
    pub fn connect(&mut self) {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }

        self.generation += 1;
        self.status = ConnectionStatus::Connecting;
        self.reconnect_at = None;
        self.stats.connect_attempts += 1;

        info!(
            generation = self.generation,
            url = %self.url,
            "Connecting to analysis backend"
        );

        self.task = Some(tokio::spawn(run_connection(
            self.generation,
            self.url.clone(),
            Arc::clone(&self.connector),
            self.events.clone(),
            self.connect_timeout,
        )));
    }

    /// Reconnect if the scheduled delay has elapsed
    pub fn poll_reconnect(&mut self, now: Instant) -> bool {
        match self.reconnect_at {
            Some(deadline) if deadline <= now => {
                self.connect();
                true
            }
            _ => false,
        }
    }

    /// Fold one connection-task report into the link state
    pub fn handle_event(&mut self, event: LinkEvent) -> Option<LinkUpdate> {
        if event.generation() != self.generation {
            debug!(
                event_generation = event.generation(),
                current_generation = self.generation,
                "Ignoring event from a previous connection"
            );
            return None;
        }

        match event {
            LinkEvent::Opened { outbound, .. } => {
                self.status = ConnectionStatus::Connected;
                self.outbound = Some(outbound);
                info!(
                    generation = self.generation,
                    mode = %self.mode,
                    "Connected to analysis backend"
                );
                if !self.send(ClientMessage::Mode(self.mode)) {
                    warn!(generation = self.generation, "Mode handshake could not be queued");
                }
                Some(LinkUpdate::Connected)
            }
            LinkEvent::Inbound { raw, .. } => {
                self.stats.messages_received += 1;
                match ServerMessage::parse(&raw) {
                    Ok(message) => Some(LinkUpdate::Message(message)),
                    Err(e) => {
                        self.stats.malformed_messages += 1;
                        warn!(
                            generation = self.generation,
                            error = %e,
                            payload = %preview(&raw),
                            "Discarding malformed backend message"
                        );
                        None
                    }
                }
            }
            LinkEvent::Closed { reason, .. } => {
                let was_open = self.status == ConnectionStatus::Connected;
                self.status = ConnectionStatus::Disconnected;
                self.outbound = None;
                self.task = None;
                self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
                self.stats.reconnects_scheduled += 1;
                warn!(
                    generation = self.generation,
                    was_open,
                    reason = reason.as_deref().unwrap_or("closed"),
                    delay_ms = self.reconnect_delay.as_millis() as u64,
                    "Backend connection closed, reconnect scheduled"
                );
                Some(LinkUpdate::Disconnected { was_open })
            }
        }
    }

    /// Queue a message on the open connection
    ///
    /// Returns `false` without side effects when the link is not connected.
    pub fn send(&mut self, message: ClientMessage) -> bool {
        if self.status != ConnectionStatus::Connected {
            return false;
        }
        let Some(outbound) = self.outbound.as_ref() else {
            return false;
        };

        let is_frame = message.is_droppable();
        if is_frame && outbound.capacity() <= 1 {
            self.stats.frames_dropped += 1;
            debug!(generation = self.generation, "Outbound queue busy, dropping frame");
            return false;
        }

        match outbound.try_send(message.into_text()) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                if is_frame {
                    self.stats.frames_sent += 1;
                }
                true
            }
            Err(TrySendError::Full(_)) => {
                if is_frame {
                    self.stats.frames_dropped += 1;
                }
                warn!(generation = self.generation, "Outbound queue full, message not sent");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(generation = self.generation, "Connection task has already ended");
                false
            }
        }
    }

    /// Queue an encoded frame
    pub fn send_frame(&mut self, frame: EncodedFrame) -> bool {
        self.send(ClientMessage::Frame(frame))
    }

    /// Select a mode; sent now when connected, otherwise at the next handshake
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        if self.send(ClientMessage::Mode(mode)) {
            info!(generation = self.generation, mode = %mode, "Mode change sent");
        } else {
            debug!(mode = %mode, "Mode change deferred until the next handshake");
        }
    }

    /// Send a keep-alive when connected; failures are ignored
    pub fn heartbeat(&mut self) {
        if self.send(ClientMessage::Heartbeat) {
            debug!(generation = self.generation, "Heartbeat sent");
        }
    }

    /// Close the connection and cancel any pending reconnect
    pub fn shutdown(&mut self) {
        self.generation += 1;
        self.status = ConnectionStatus::Disconnected;
        self.reconnect_at = None;
        self.outbound = None;
        // The task sees its queue closed, sends a close frame, and exits on its own
        self.task = None;
        info!("Stream link shut down");
    }
}

async fn run_connection(
    generation: u64,
    url: String,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<LinkEvent>,
    connect_timeout: Duration,
) {
    let opened = tokio::time::timeout(connect_timeout, connector.connect(&url)).await;
    let (sink, stream) = match opened {
        Ok(Ok(halves)) => halves,
        Ok(Err(e)) => {
            warn!(generation, error = %e, "Connection attempt failed");
            emit(
                &events,
                LinkEvent::Closed {
                    generation,
                    reason: Some(e.to_string()),
                },
            );
            return;
        }
        Err(_) => {
            warn!(
                generation,
                timeout_ms = connect_timeout.as_millis() as u64,
                "Connection attempt timed out"
            );
            emit(
                &events,
                LinkEvent::Closed {
                    generation,
                    reason: Some("connect timed out".to_owned()),
                },
            );
            return;
        }
    };

    let (outbound_tx, outbound_rx) = mpsc::channel(timing::OUTBOUND_QUEUE_CAPACITY);
    if events
        .send(LinkEvent::Opened {
            generation,
            outbound: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    let reason = pump(generation, sink, stream, outbound_rx, &events).await;
    emit(&events, LinkEvent::Closed { generation, reason });
}

async fn pump(
    generation: u64,
    mut sink: WireSink,
    mut stream: WireStream,
    mut outbound: mpsc::Receiver<String>,
    events: &mpsc::UnboundedSender<LinkEvent>,
) -> Option<String> {
    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(text) = queued else {
                    if let Err(e) = sink.close().await {
                        debug!(generation, error = %e, "Close handshake failed");
                    }
                    return None;
                };
                if let Err(e) = sink.send(text).await {
                    return Some(e.to_string());
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(raw)) => {
                    if events.send(LinkEvent::Inbound { generation, raw }).is_err() {
                        return None;
                    }
                }
                Some(Err(e)) if e.code == ErrorCode::MalformedMessage => {
                    warn!(generation, error = %e, "Discarding undecodable payload");
                }
                Some(Err(e)) => return Some(e.to_string()),
                None => return Some("closed by backend".to_owned()),
            },
        }
    }
}

fn emit(events: &mpsc::UnboundedSender<LinkEvent>, event: LinkEvent) {
    if events.send(event).is_err() {
        debug!("Link owner dropped, event discarded");
    }
}

fn preview(raw: &str) -> &str {
    const MAX: usize = 120;
    if raw.len() <= MAX {
        return raw;
    }
    let mut end = MAX;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}
