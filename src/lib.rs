// ABOUTME: Main library entry point for the squat coach streaming client
// ABOUTME: Streams camera frames to a pose-analysis backend and presents rep feedback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Squat Coach
//!
//! Real-time squat form feedback client. Camera frames are JPEG-encoded and
//! streamed over a WebSocket to a pose-analysis backend, which answers with an
//! annotated frame, rep counters, and a feedback event. Feedback is turned into
//! on-screen and audio cues, counters and a short workout history are kept in
//! a local store, and an optional text-generation collaborator produces
//! workout and diet plans.
//!
//! ## Architecture
//!
//! - **capture**: Camera sources and throttled JPEG frame encoding
//! - **link**: The backend connection, its wire protocol, and reconnects
//! - **session**: Pure session reducer (counters, phases, workout commits)
//! - **feedback**: Maps feedback events to visual and audio cues
//! - **detector**: Single-task runtime tying the pieces together
//! - **store**: Persistent key-value store for counters, history, and plans
//! - **stats**: Weekly activity and form-score summaries
//! - **llm**: Text-generation clients and plan parsing
//! - **upload**: Recorded-video analysis uploads and status polling
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use squat_coach::capture::FileCamera;
//! use squat_coach::config::DetectorConfig;
//! use squat_coach::detector::{DetectorDeps, SquatDetector};
//! use squat_coach::feedback::AssetCueSink;
//! use squat_coach::link::WebSocketConnector;
//! use squat_coach::store::MemoryStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = DetectorConfig::from_env()?;
//! let deps = DetectorDeps {
//!     camera: Arc::new(FileCamera::new("frames")),
//!     connector: Arc::new(WebSocketConnector),
//!     cue_sink: Arc::new(AssetCueSink::new(&config.sounds_dir)),
//!     store: Arc::new(MemoryStore::new()),
//! };
//! let (detector, handle) = SquatDetector::new(config, deps);
//! let task = detector.spawn();
//!
//! handle.start().await?;
//! // ...
//! let workout = handle.stop().await?;
//! println!("recorded: {workout:?}");
//! handle.shutdown().await?;
//! task.await?;
//! # Ok(())
//! # }
//! ```

pub use squat_coach_core::{constants, errors, models};

/// Camera sources and frame encoding
pub mod capture;

/// Environment-based configuration
pub mod config;

/// Detector runtime and control handle
pub mod detector;

/// Feedback event to cue mapping
pub mod feedback;

/// Backend connection and wire protocol
pub mod link;

/// Text-generation clients and plan handling
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Session state reducer
pub mod session;

/// Workout statistics
pub mod stats;

/// Persistent key-value storage
pub mod store;

/// Recorded-video upload and analysis polling
pub mod upload;
