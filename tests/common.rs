// ABOUTME: Shared test utilities and doubles for integration tests
// ABOUTME: Synthetic camera, in-memory backend connector, recording cue sink, and fast detector config
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `squat_coach`
//!
//! The doubles stand in for the camera, the analysis backend, and the audio
//! device so detector behaviour can be exercised without hardware or network.

use async_trait::async_trait;
use futures_util::sink;
use image::{Rgb, RgbImage};
use squat_coach::capture::{Camera, CaptureConstraints, VideoSource};
use squat_coach::config::DetectorConfig;
use squat_coach::errors::{AppError, AppResult};
use squat_coach::feedback::{AudioCue, CueSink, VisualCue};
use squat_coach::link::{Connector, WireSink, WireStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// How long tests wait for asynchronous effects before failing
pub const WAIT: Duration = Duration::from_secs(5);

/// Detector configuration with short timers for tests
pub fn fast_config() -> DetectorConfig {
    DetectorConfig {
        ws_url: "ws://backend.test/ws".to_owned(),
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        min_frame_interval: Duration::from_millis(20),
        capture_poll_interval: Duration::from_millis(5),
        min_session: Duration::from_millis(200),
        ..DetectorConfig::default()
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Camera producing solid-colour frames
#[derive(Clone, Default)]
pub struct SyntheticCamera {
    deny: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    resolution: (u32, u32),
}

impl SyntheticCamera {
    /// Camera with a 64x48 source
    pub fn new() -> Self {
        Self::with_resolution(64, 48)
    }

    /// Camera with the given native resolution; zero means unknown
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            resolution: (width, height),
            ..Self::default()
        }
    }

    /// Camera whose permission prompt is always refused
    pub fn denied() -> Self {
        let camera = Self::new();
        camera.deny.store(true, Ordering::SeqCst);
        camera
    }

    /// Make every source stop producing frames, or recover
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sources opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sources released so far
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for SyntheticCamera {
    async fn open(&self, _constraints: &CaptureConstraints) -> AppResult<Box<dyn VideoSource>> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(AppError::media_access_denied("camera permission refused"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticSource {
            resolution: self.resolution,
            failing: Arc::clone(&self.failing),
            released: Arc::clone(&self.released),
            shade: 0,
            stopped: false,
        }))
    }
}

struct SyntheticSource {
    resolution: (u32, u32),
    failing: Arc<AtomicBool>,
    released: Arc<AtomicUsize>,
    shade: u8,
    stopped: bool,
}

impl VideoSource for SyntheticSource {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn current_frame(&mut self) -> AppResult<RgbImage> {
        if self.stopped || self.failing.load(Ordering::SeqCst) {
            return Err(AppError::media_unavailable("video track ended"));
        }
        self.shade = self.shade.wrapping_add(17);
        let (width, height) = match self.resolution {
            (0, _) | (_, 0) => (32, 24),
            native => native,
        };
        Ok(RgbImage::from_pixel(width, height, Rgb([self.shade, 90, 160])))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Test side of one in-memory connection
pub struct BackendPeer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<AppResult<String>>,
}

impl BackendPeer {
    /// Next message the client sent, `None` if it closed or nothing arrived in time
    pub async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.from_client.recv()).await.ok().flatten()
    }

    /// Next message the client sent that is not a frame
    pub async fn recv_control(&mut self) -> Option<String> {
        loop {
            let message = self.recv().await?;
            if !message.starts_with("data:image/jpeg") {
                return Some(message);
            }
        }
    }

    /// Deliver a payload to the client
    pub fn push(&self, raw: &str) {
        self.to_client.send(Ok(raw.to_owned())).unwrap();
    }

    /// Deliver a transport error to the client
    pub fn fail(&self, error: AppError) {
        self.to_client.send(Err(error)).unwrap();
    }

    /// Messages already received, without waiting
    pub fn drain(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(message) = self.from_client.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Wait until the client closes its write half
    pub async fn closed_by_client(&mut self) -> bool {
        timeout(WAIT, async {
            while self.from_client.recv().await.is_some() {}
        })
        .await
        .is_ok()
    }

    /// Close the connection from the backend side
    pub fn close(self) {}
}

/// Connector handing each accepted connection to the test as a [`BackendPeer`]
#[derive(Clone)]
pub struct ChannelConnector {
    reachable: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
    peers: mpsc::UnboundedSender<BackendPeer>,
}

/// Receives the peers accepted by a [`ChannelConnector`]
pub struct PeerQueue {
    peers: mpsc::UnboundedReceiver<BackendPeer>,
}

impl PeerQueue {
    /// Next accepted connection
    pub async fn accept(&mut self) -> BackendPeer {
        timeout(WAIT, self.peers.recv())
            .await
            .expect("no connection within timeout")
            .expect("connector dropped")
    }

    /// Whether a connection is waiting, without blocking
    pub fn try_accept(&mut self) -> Option<BackendPeer> {
        self.peers.try_recv().ok()
    }
}

impl ChannelConnector {
    /// Reachable connector and the queue its peers arrive on
    pub fn new() -> (Self, PeerQueue) {
        let (peers, receiver) = mpsc::unbounded_channel();
        let connector = Self {
            reachable: Arc::new(AtomicBool::new(true)),
            attempts: Arc::new(AtomicUsize::new(0)),
            peers,
        };
        (connector, PeerQueue { peers: receiver })
    }

    /// Make new connection attempts succeed or fail
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Connection attempts so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, _url: &str) -> AppResult<(WireSink, WireStream)> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(AppError::connection_failed("backend unreachable"));
        }

        let (client_tx, from_client) = mpsc::unbounded_channel::<String>();
        let (to_client, client_rx) = mpsc::unbounded_channel::<AppResult<String>>();

        let sink = sink::unfold(client_tx, |tx, text: String| async move {
            tx.send(text)
                .map_err(|_| AppError::connection_closed("backend peer dropped"))?;
            Ok::<_, AppError>(tx)
        });
        let stream = UnboundedReceiverStream::new(client_rx);

        self.peers
            .send(BackendPeer {
                from_client,
                to_client,
            })
            .map_err(|_| AppError::connection_failed("test dropped the peer queue"))?;

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

// ============================================================================
// Cues
// ============================================================================

/// Cue sink remembering everything it was asked to show or play
#[derive(Default)]
pub struct RecordingCueSink {
    shown: Mutex<Vec<VisualCue>>,
    played: Mutex<Vec<AudioCue>>,
}

impl RecordingCueSink {
    /// Empty sink
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Visual cues shown so far
    pub fn shown(&self) -> Vec<VisualCue> {
        self.shown.lock().unwrap().clone()
    }

    /// Audio assets played so far
    pub fn played(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|cue| cue.asset.clone())
            .collect()
    }
}

impl CueSink for RecordingCueSink {
    fn show(&self, cue: &VisualCue) {
        self.shown.lock().unwrap().push(cue.clone());
    }

    fn play(&self, cue: &AudioCue) -> AppResult<()> {
        self.played.lock().unwrap().push(cue.clone());
        Ok(())
    }
}
