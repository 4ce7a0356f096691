// ABOUTME: SessionState reducer tracking streaming phase, connection overlay, counters, and history
// ABOUTME: Turns discrete session events into effects the detector runtime carries out
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Session State
//!
//! All session bookkeeping lives in one reducer. [`SessionState::apply`]
//! consumes a [`SessionEvent`] and returns the [`SessionEffect`]s the owner
//! must perform (present a cue, release the camera, persist counters). The
//! reducer itself never performs I/O, so every transition is testable without
//! a camera or a socket.
//!
//! ```text
//! Idle --StartRequested--> Connecting --CaptureStarted--> Streaming
//!   ^                          |                              |
//!   +-------CaptureFailed------+                              |
//!   +------------StopRequested / LinkClosed-------------------+
//! ```
//!
//! `connected` is an overlay flag independent of the phase. Losing an open
//! connection ends a running session; a connect attempt that never opened
//! only clears the flag.

use crate::errors::{AppError, AppResult};
use crate::link::ServerMessage;
use crate::models::{FeedbackEvent, Mode, RepCounters, WorkoutHistory, WorkoutRecord};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Streaming lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not streaming
    #[default]
    Idle,
    /// Camera acquisition in progress
    Connecting,
    /// Capturing and sending frames
    Streaming,
}

/// Input to the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user asked to start streaming
    StartRequested,
    /// The camera source was acquired
    CaptureStarted {
        /// Session start time
        at: DateTime<Utc>,
    },
    /// Camera acquisition failed
    CaptureFailed,
    /// The user asked to stop streaming
    StopRequested {
        /// Session end time
        at: DateTime<Utc>,
    },
    /// The backend connection opened
    LinkOpened,
    /// An open backend connection closed
    LinkClosed {
        /// Time the close was observed
        at: DateTime<Utc>,
    },
    /// A connect attempt failed before the connection opened
    ConnectFailed,
    /// A well-formed backend message arrived
    Server(ServerMessage),
    /// A frame was handed to the link
    FrameSent,
    /// The video source stopped producing frames
    VideoFailed,
    /// The video source was reacquired
    VideoRecovered,
    /// The user picked a mode
    ModeSelected(Mode),
}

/// Work the owner performs after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Hand the feedback event to the presenter
    Present(FeedbackEvent),
    /// Stop capture and release the camera
    ReleaseCapture,
    /// Persist the counters
    CountersChanged(RepCounters),
    /// Persist the workout history
    HistoryChanged,
    /// A session was long enough to be recorded
    WorkoutCommitted(WorkoutRecord),
}

/// What a confirmed reset will discard
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a reset only happens when the pending reset is confirmed"]
pub struct PendingReset {
    /// Counters that will be zeroed
    pub counters: RepCounters,
    /// Number of workout records that will be deleted
    pub workouts: usize,
}

/// Session reducer
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    connected: bool,
    mode: Mode,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    frames_sent: u64,
    frames_received: u64,
    counters: RepCounters,
    feedback: Option<FeedbackEvent>,
    processed_image: Option<Arc<str>>,
    video_failed: bool,
    history: WorkoutHistory,
    min_session: Duration,
}

impl SessionState {
    /// Create an idle session that records workouts longer than `min_session`
    #[must_use]
    pub fn new(mode: Mode, min_session: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            connected: false,
            mode,
            session_id: None,
            started_at: None,
            frames_sent: 0,
            frames_received: 0,
            counters: RepCounters::default(),
            feedback: None,
            processed_image: None,
            video_failed: false,
            history: WorkoutHistory::new(),
            min_session,
        }
    }

    /// Seed counters and history loaded from the store
    pub fn restore(&mut self, counters: RepCounters, history: WorkoutHistory) {
        self.counters = counters;
        self.history = history;
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether frames are being captured
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }

    /// Connection overlay flag
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Selected mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Identifier of the running session
    #[must_use]
    pub const fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Start time of the running session
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Frames sent this session
    #[must_use]
    pub const fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Backend messages received this session
    #[must_use]
    pub const fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Latest authoritative counters
    #[must_use]
    pub const fn counters(&self) -> RepCounters {
        self.counters
    }

    /// Latest feedback event
    #[must_use]
    pub const fn feedback(&self) -> Option<&FeedbackEvent> {
        self.feedback.as_ref()
    }

    /// Latest annotated frame
    #[must_use]
    pub fn processed_image(&self) -> Option<Arc<str>> {
        self.processed_image.clone()
    }

    /// Whether the video source has failed since the last retry
    #[must_use]
    pub const fn video_failed(&self) -> bool {
        self.video_failed
    }

    /// Workout history, newest first
    #[must_use]
    pub const fn history(&self) -> &WorkoutHistory {
        &self.history
    }

    /// Apply one event
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when a start is requested outside `Idle` or a
    /// capture result arrives outside `Connecting`
    pub fn apply(&mut self, event: SessionEvent) -> AppResult<Vec<SessionEffect>> {
        let effects = match event {
            SessionEvent::StartRequested => {
                if self.phase != Phase::Idle {
                    return Err(AppError::invalid_state(format!(
                        "cannot start while {:?}",
                        self.phase
                    )));
                }
                self.phase = Phase::Connecting;
                Vec::new()
            }
            SessionEvent::CaptureStarted { at } => {
                self.expect_phase(Phase::Connecting)?;
                self.begin_session(at);
                Vec::new()
            }
            SessionEvent::CaptureFailed => {
                self.expect_phase(Phase::Connecting)?;
                self.phase = Phase::Idle;
                Vec::new()
            }
            SessionEvent::StopRequested { at } => self.finish_session(at),
            SessionEvent::LinkOpened => {
                self.connected = true;
                Vec::new()
            }
            SessionEvent::LinkClosed { at } => {
                self.connected = false;
                if self.is_streaming() {
                    self.finish_session(at)
                } else {
                    Vec::new()
                }
            }
            SessionEvent::ConnectFailed => {
                self.connected = false;
                Vec::new()
            }
            SessionEvent::Server(message) => self.absorb(message),
            SessionEvent::FrameSent => {
                self.frames_sent += 1;
                Vec::new()
            }
            SessionEvent::VideoFailed => {
                if self.is_streaming() {
                    self.video_failed = true;
                }
                Vec::new()
            }
            SessionEvent::VideoRecovered => {
                self.video_failed = false;
                Vec::new()
            }
            SessionEvent::ModeSelected(mode) => {
                self.mode = mode;
                Vec::new()
            }
        };
        Ok(effects)
    }

    /// Describe what a reset would clear without clearing anything
    pub fn request_reset(&self) -> PendingReset {
        PendingReset {
            counters: self.counters,
            workouts: self.history.len(),
        }
    }

    /// Clear counters and history
    pub fn confirm_reset(&mut self, pending: PendingReset) -> Vec<SessionEffect> {
        info!(
            correct = pending.counters.correct,
            incorrect = pending.counters.incorrect,
            workouts = pending.workouts,
            "Clearing counters and workout history"
        );
        self.counters = RepCounters::default();
        self.history.clear();
        vec![
            SessionEffect::CountersChanged(self.counters),
            SessionEffect::HistoryChanged,
        ]
    }

    fn expect_phase(&self, expected: Phase) -> AppResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AppError::invalid_state(format!(
                "expected {expected:?}, session is {:?}",
                self.phase
            )))
        }
    }

    fn begin_session(&mut self, at: DateTime<Utc>) {
        self.phase = Phase::Streaming;
        self.started_at = Some(at);
        self.session_id = Some(Uuid::new_v4());
        self.frames_sent = 0;
        self.frames_received = 0;
        self.video_failed = false;
    }

    fn finish_session(&mut self, at: DateTime<Utc>) -> Vec<SessionEffect> {
        if self.phase == Phase::Idle {
            return Vec::new();
        }

        let mut effects = vec![SessionEffect::ReleaseCapture];
        if let Some(started_at) = self.started_at.take() {
            let elapsed_ms = u64::try_from((at - started_at).num_milliseconds()).unwrap_or(0);
            let min_ms = u64::try_from(self.min_session.as_millis()).unwrap_or(u64::MAX);
            if elapsed_ms > min_ms {
                let record = WorkoutRecord::from_session(self.counters, self.mode, at, elapsed_ms);
                self.history.push(record.clone());
                effects.push(SessionEffect::HistoryChanged);
                effects.push(SessionEffect::WorkoutCommitted(record));
            } else {
                debug!(elapsed_ms, "Session too short to record");
            }
        }

        self.phase = Phase::Idle;
        self.session_id = None;
        self.feedback = None;
        self.processed_image = None;
        self.frames_sent = 0;
        self.frames_received = 0;
        self.video_failed = false;
        effects
    }

    fn absorb(&mut self, message: ServerMessage) -> Vec<SessionEffect> {
        self.frames_received += 1;
        let mut effects = Vec::new();

        if let Some(mode) = message.acknowledged_mode() {
            debug!(mode = %mode, "Backend acknowledged mode");
        }
        if let Some(image) = message.annotated_image() {
            self.processed_image = Some(Arc::from(image));
        }
        if let Some(counters) = message.counters() {
            if counters != self.counters {
                self.counters = counters;
                effects.push(SessionEffect::CountersChanged(counters));
            }
        }
        if let Some(event) = message.feedback {
            self.feedback = Some(event.clone());
            effects.push(SessionEffect::Present(event));
        }
        effects
    }
}
