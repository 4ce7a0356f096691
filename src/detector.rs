// ABOUTME: SquatDetector runtime driving capture, link, session reducer, and presenter from one loop
// ABOUTME: DetectorHandle is the cloneable start/stop/mode/reset API with a watch-based snapshot feed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Squat Detector
//!
//! One detector owns exactly one [`StreamLink`], one [`FrameCapture`], and one
//! [`SessionState`]. They are driven from a single task that multiplexes user
//! commands, connection events, the capture ticker, the heartbeat, the
//! reconnect timer, and the statistics timer with `tokio::select!`. Nothing
//! else mutates session state, so no locks are needed.
//!
//! Callers interact through a [`DetectorHandle`]. Observable state is
//! published as a [`DetectorSnapshot`] on a `watch` channel after every loop
//! iteration that changed it.

use crate::capture::{Camera, CaptureStats, FrameCapture, TickOutcome};
use crate::config::DetectorConfig;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::feedback::{Cue, CueSink, FeedbackPresenter};
use crate::link::{ConnectionStatus, Connector, LinkEvent, LinkStats, LinkUpdate, StreamLink};
use crate::models::{FeedbackEvent, Mode, RepCounters, WorkoutRecord};
use crate::session::{PendingReset, Phase, SessionEffect, SessionEvent, SessionState};
use crate::store::{KeyValueStore, SessionStore};
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Collaborators a detector is built from
pub struct DetectorDeps {
    /// Video source provider
    pub camera: Arc<dyn Camera>,
    /// Backend connection factory
    pub connector: Arc<dyn Connector>,
    /// Cue destination
    pub cue_sink: Arc<dyn CueSink>,
    /// Persistent blob store
    pub store: Arc<dyn KeyValueStore>,
}

/// Observable detector state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorSnapshot {
    /// Streaming lifecycle phase
    pub phase: Phase,
    /// Connection lifecycle state
    pub connection: ConnectionStatus,
    /// Whether the backend connection is open
    pub is_connected: bool,
    /// Whether frames are being captured
    pub is_streaming: bool,
    /// Whether the video source failed and awaits a retry
    pub video_failed: bool,
    /// Selected mode
    pub mode: Mode,
    /// Identifier of the running session
    pub session_id: Option<Uuid>,
    /// Start time of the running session
    pub started_at: Option<DateTime<Utc>>,
    /// Frames sent this session
    pub frames_sent: u64,
    /// Backend messages received this session
    pub frames_received: u64,
    /// Latest authoritative counters
    pub counters: RepCounters,
    /// Latest feedback event
    pub feedback: Option<FeedbackEvent>,
    /// Cue most recently presented
    pub last_cue: Option<Cue>,
    /// Latest annotated frame from the backend
    pub processed_image: Option<Arc<str>>,
    /// Workout history, newest first
    pub history: Vec<WorkoutRecord>,
    /// Transport counters
    pub link: LinkStats,
    /// Capture counters
    pub capture: CaptureStats,
}

enum Command {
    Start(oneshot::Sender<AppResult<()>>),
    Stop(oneshot::Sender<Option<WorkoutRecord>>),
    SetMode(Mode, oneshot::Sender<()>),
    RequestReset(oneshot::Sender<PendingReset>),
    ConfirmReset(PendingReset, oneshot::Sender<()>),
    RetryVideo(oneshot::Sender<AppResult<()>>),
    Shutdown(oneshot::Sender<()>),
}

const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Period usable by `tokio::time::interval`, which panics on zero
fn timer_period(period: Duration) -> Duration {
    period.max(MIN_TIMER_PERIOD)
}

/// Cloneable control surface of a running detector
#[derive(Clone)]
pub struct DetectorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<DetectorSnapshot>,
}

impl DetectorHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> AppResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| AppError::invalid_state("detector is not running"))?;
        response
            .await
            .map_err(|_| AppError::internal("detector stopped before replying"))
    }

    /// Acquire the camera and begin streaming
    ///
    /// # Errors
    ///
    /// Returns the camera's access error, or `InvalidState` when already streaming
    pub async fn start(&self) -> AppResult<()> {
        self.request(Command::Start).await?
    }

    /// Stop streaming; returns the workout record when the session was long enough
    ///
    /// # Errors
    ///
    /// Returns an error only when the detector is no longer running
    pub async fn stop(&self) -> AppResult<Option<WorkoutRecord>> {
        self.request(Command::Stop).await
    }

    /// Select the analysis mode
    ///
    /// # Errors
    ///
    /// Returns an error only when the detector is no longer running
    pub async fn set_mode(&self, mode: Mode) -> AppResult<()> {
        self.request(|reply| Command::SetMode(mode, reply)).await
    }

    /// Describe what a reset would clear, without clearing anything
    ///
    /// # Errors
    ///
    /// Returns an error only when the detector is no longer running
    pub async fn request_reset(&self) -> AppResult<PendingReset> {
        self.request(Command::RequestReset).await
    }

    /// Clear counters and workout history
    ///
    /// # Errors
    ///
    /// Returns an error only when the detector is no longer running
    pub async fn confirm_reset(&self, pending: PendingReset) -> AppResult<()> {
        self.request(|reply| Command::ConfirmReset(pending, reply))
            .await
    }

    /// Reacquire the camera after a video failure
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when not streaming, or the camera's access error
    pub async fn retry_video(&self) -> AppResult<()> {
        self.request(Command::RetryVideo).await?
    }

    /// Stop streaming, close the connection, and end the detector task
    ///
    /// # Errors
    ///
    /// Returns an error only when the detector is no longer running
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(Command::Shutdown).await
    }

    /// Latest published state
    #[must_use]
    pub fn snapshot(&self) -> DetectorSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DetectorSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until `predicate` holds for the published state
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on timeout or when the detector stopped
    pub async fn wait_until(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&DetectorSnapshot) -> bool,
    ) -> AppResult<DetectorSnapshot> {
        let mut receiver = self.snapshots.clone();
        let outcome = match time::timeout(timeout, receiver.wait_for(predicate)).await {
            Ok(Ok(snapshot)) => Ok(snapshot.clone()),
            Ok(Err(_)) => Err(AppError::invalid_state("detector stopped")),
            Err(_) => Err(AppError::invalid_state(format!(
                "condition not reached within {}ms",
                timeout.as_millis()
            ))),
        };
        outcome
    }
}

/// The detector event loop and everything it owns
pub struct SquatDetector {
    config: DetectorConfig,
    session: SessionState,
    link: StreamLink,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    capture: FrameCapture,
    camera: Arc<dyn Camera>,
    presenter: FeedbackPresenter,
    store: SessionStore,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<DetectorSnapshot>,
    last_cue: Option<Cue>,
    frames_at_last_report: u64,
}

impl SquatDetector {
    /// Build a detector and its handle; counters and history are loaded from the store
    #[must_use]
    pub fn new(config: DetectorConfig, deps: DetectorDeps) -> (Self, DetectorHandle) {
        let store = SessionStore::new(deps.store);
        let mut session = SessionState::new(config.mode, config.min_session);
        session.restore(store.load_counters(), store.load_history());

        let (link, link_events) = StreamLink::new(config.ws_url.clone(), deps.connector, config.mode);
        let link = link
            .with_reconnect_delay(config.reconnect_delay)
            .with_connect_timeout(config.connect_timeout);

        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (snapshots, snapshot_rx) = watch::channel(DetectorSnapshot::default());

        let detector = Self {
            capture: FrameCapture::new(config.min_frame_interval, config.jpeg_quality),
            config,
            session,
            link,
            link_events,
            camera: deps.camera,
            presenter: FeedbackPresenter::new(deps.cue_sink),
            store,
            commands,
            snapshots,
            last_cue: None,
            frames_at_last_report: 0,
        };
        detector.publish();

        let handle = DetectorHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (detector, handle)
    }

    /// Run the event loop on a new task
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the event loop until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        let span = info_span!("squat_detector", url = %self.config.ws_url);
        self.event_loop().instrument(span).await;
    }

    async fn event_loop(&mut self) {
        info!(mode = %self.session.mode(), "Detector running");
        self.link.connect();
        self.publish();

        let mut capture_ticker = time::interval(timer_period(self.config.capture_poll_interval));
        capture_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let heartbeat_period = timer_period(self.config.heartbeat_interval);
        let mut heartbeat = time::interval_at(Instant::now() + heartbeat_period, heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let stats_period = timer_period(self.config.stats_interval);
        let mut stats = time::interval_at(Instant::now() + stats_period, stats_period);
        stats.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let reconnect_at = self.link.reconnect_deadline();
            let capturing = self.capture.is_active() && !self.session.video_failed();

            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All detector handles dropped");
                        break;
                    };
                    if self.handle_command(command).await.is_break() {
                        return;
                    }
                }
                Some(event) = self.link_events.recv() => self.handle_link_event(event),
                _ = capture_ticker.tick(), if capturing => self.on_capture_tick(),
                _ = heartbeat.tick() => self.link.heartbeat(),
                () = time::sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.link.poll_reconnect(Instant::now());
                }
                _ = stats.tick() => self.log_stats(),
            }

            self.publish();
        }

        self.teardown();
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start(reply) => {
                let result = self.start_streaming().await;
                self.reply(reply, result);
            }
            Command::Stop(reply) => {
                let record = self.stop_streaming();
                self.reply(reply, record);
            }
            Command::SetMode(mode, reply) => {
                self.set_mode(mode);
                self.reply(reply, ());
            }
            Command::RequestReset(reply) => {
                let pending = self.session.request_reset();
                self.reply(reply, pending);
            }
            Command::ConfirmReset(pending, reply) => {
                let effects = self.session.confirm_reset(pending);
                self.run_effects(effects);
                self.reply(reply, ());
            }
            Command::RetryVideo(reply) => {
                let result = self.retry_video().await;
                self.reply(reply, result);
            }
            Command::Shutdown(reply) => {
                self.teardown();
                self.reply(reply, ());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// The snapshot is published before the caller is released
    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        if reply.send(value).is_err() {
            debug!("Caller stopped waiting for the reply");
        }
    }

    async fn start_streaming(&mut self) -> AppResult<()> {
        self.session.apply(SessionEvent::StartRequested)?;
        self.publish();

        let camera = Arc::clone(&self.camera);
        match self
            .capture
            .start(camera.as_ref(), &self.config.constraints)
            .await
        {
            Ok(()) => {
                self.session
                    .apply(SessionEvent::CaptureStarted { at: Utc::now() })?;
                self.frames_at_last_report = 0;
                info!(
                    session_id = ?self.session.session_id(),
                    connected = self.link.is_open(),
                    "Streaming started"
                );
                Ok(())
            }
            Err(e) => {
                self.session.apply(SessionEvent::CaptureFailed)?;
                warn!(error = %e, "Camera acquisition failed");
                Err(e)
            }
        }
    }

    fn stop_streaming(&mut self) -> Option<WorkoutRecord> {
        let session_id = self.session.session_id();
        let effects = self.apply(SessionEvent::StopRequested { at: Utc::now() });
        let record = self.run_effects(effects);
        if session_id.is_some() {
            info!(session_id = ?session_id, recorded = record.is_some(), "Streaming stopped");
        }
        record
    }

    fn set_mode(&mut self, mode: Mode) {
        let effects = self.apply(SessionEvent::ModeSelected(mode));
        self.run_effects(effects);
        self.link.set_mode(mode);
    }

    async fn retry_video(&mut self) -> AppResult<()> {
        if !self.session.is_streaming() {
            return Err(AppError::invalid_state("video can only be retried while streaming"));
        }
        info!("Retrying video source");
        let camera = Arc::clone(&self.camera);
        self.capture
            .start(camera.as_ref(), &self.config.constraints)
            .await?;
        let effects = self.apply(SessionEvent::VideoRecovered);
        self.run_effects(effects);
        Ok(())
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        let Some(update) = self.link.handle_event(event) else {
            return;
        };
        let event = match update {
            LinkUpdate::Connected => SessionEvent::LinkOpened,
            LinkUpdate::Disconnected { was_open: true } => {
                SessionEvent::LinkClosed { at: Utc::now() }
            }
            LinkUpdate::Disconnected { was_open: false } => SessionEvent::ConnectFailed,
            LinkUpdate::Message(message) => SessionEvent::Server(message),
        };
        let effects = self.apply(event);
        self.run_effects(effects);
    }

    fn on_capture_tick(&mut self) {
        match self.capture.tick(Instant::now(), self.link.is_open()) {
            Ok(TickOutcome::Frame(frame)) => {
                if self.link.send_frame(frame) {
                    let effects = self.apply(SessionEvent::FrameSent);
                    self.run_effects(effects);
                }
            }
            Ok(TickOutcome::Throttled | TickOutcome::LinkClosed | TickOutcome::Inactive) => {}
            Err(e) if e.code == ErrorCode::FrameEncodingFailed => {
                warn!(error = %e, "Frame could not be encoded, skipping");
            }
            Err(e) => {
                warn!(error = %e, "Video source failed");
                let effects = self.apply(SessionEvent::VideoFailed);
                self.run_effects(effects);
            }
        }
    }

    fn apply(&mut self, event: SessionEvent) -> Vec<SessionEffect> {
        self.session.apply(event).unwrap_or_else(|e| {
            warn!(error = %e, "Session rejected event");
            Vec::new()
        })
    }

    fn run_effects(&mut self, effects: Vec<SessionEffect>) -> Option<WorkoutRecord> {
        let mut committed = None;
        for effect in effects {
            match effect {
                SessionEffect::Present(event) => {
                    if let Some(cue) = self.presenter.present(&event) {
                        self.last_cue = Some(cue);
                    }
                }
                SessionEffect::ReleaseCapture => self.capture.stop(),
                SessionEffect::CountersChanged(counters) => {
                    if let Err(e) = self.store.save_counters(counters) {
                        warn!(error = %e, "Failed to persist counters");
                    }
                }
                SessionEffect::HistoryChanged => {
                    if let Err(e) = self.store.save_history(self.session.history()) {
                        warn!(error = %e, "Failed to persist workout history");
                    }
                }
                SessionEffect::WorkoutCommitted(record) => {
                    info!(
                        date = %record.date,
                        correct = record.correct,
                        incorrect = record.incorrect,
                        duration_seconds = record.duration_seconds,
                        mode = %record.mode,
                        "Workout recorded"
                    );
                    committed = Some(record);
                }
            }
        }
        committed
    }

    fn log_stats(&mut self) {
        if !self.session.is_streaming() {
            return;
        }
        let sent = self.session.frames_sent();
        let window = sent.saturating_sub(self.frames_at_last_report);
        self.frames_at_last_report = sent;
        let fps = window as f64 / self.config.stats_interval.as_secs_f64().max(f64::EPSILON);
        let link = self.link.stats();
        let capture = self.capture.stats();

        info!(
            session_id = ?self.session.session_id(),
            frames_sent = sent,
            frames_received = self.session.frames_received(),
            fps = format_args!("{fps:.1}"),
            frames_throttled = capture.frames_throttled,
            frames_dropped = link.frames_dropped,
            malformed_messages = link.malformed_messages,
            reconnects = link.reconnects_scheduled,
            connected = self.link.is_open(),
            "Streaming stats"
        );
    }

    fn teardown(&mut self) {
        if self.session.phase() != Phase::Idle {
            self.stop_streaming();
        }
        self.capture.stop();
        self.link.shutdown();
        let effects = self.apply(SessionEvent::LinkClosed { at: Utc::now() });
        self.run_effects(effects);
        self.publish();
        info!("Detector stopped");
    }

    fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            phase: self.session.phase(),
            connection: self.link.status(),
            is_connected: self.session.is_connected(),
            is_streaming: self.session.is_streaming(),
            video_failed: self.session.video_failed(),
            mode: self.session.mode(),
            session_id: self.session.session_id(),
            started_at: self.session.started_at(),
            frames_sent: self.session.frames_sent(),
            frames_received: self.session.frames_received(),
            counters: self.session.counters(),
            feedback: self.session.feedback().cloned(),
            last_cue: self.last_cue.clone(),
            processed_image: self.session.processed_image(),
            history: self.session.history().iter().cloned().collect(),
            link: self.link.stats(),
            capture: self.capture.stats(),
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
