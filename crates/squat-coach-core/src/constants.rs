// ABOUTME: Protocol literals, timing defaults, and storage keys for the squat coach client
// ABOUTME: Organized by domain so wire strings and tuning values live in one place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being spread across
//! the modules that happen to use them.

/// Control strings sent from the client to the pose-analysis backend
pub mod protocol {
    /// Select the lenient threshold profile
    pub const MODE_BEGINNER: &str = "mode_beginner";
    /// Select the strict threshold profile
    pub const MODE_PRO: &str = "mode_pro";
    /// Keep-alive control message
    pub const HEARTBEAT: &str = "heartbeat";
    /// Prefix of every encoded frame payload
    pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

    /// Feedback sentinel: counters were reset after inactivity
    pub const FEEDBACK_RESET_COUNTERS: &str = "reset_counters";
    /// Feedback sentinel: the last rep had incorrect form
    pub const FEEDBACK_INCORRECT: &str = "incorrect";
    /// Literal the backend may send in place of an absent feedback value
    pub const FEEDBACK_NULL: &str = "null";
}

/// Timing defaults for the streaming loop
pub mod timing {
    /// Delay before a reconnect attempt after the socket closes or fails to open
    pub const RECONNECT_DELAY_MS: u64 = 3_000;
    /// A connect attempt still pending after this long counts as failed
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Outbound messages allowed in flight before new frames are dropped
    pub const OUTBOUND_QUEUE_CAPACITY: usize = 4;
    /// Interval between keep-alive messages
    pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
    /// Minimum spacing between two sent frames
    pub const MIN_FRAME_INTERVAL_MS: u64 = 100;
    /// How often the capture loop polls for a new frame (display refresh rate)
    pub const CAPTURE_POLL_INTERVAL_MS: u64 = 16;
    /// Interval between performance statistics log lines while streaming
    pub const STATS_INTERVAL_SECS: u64 = 5;
    /// Sessions at or below this length are not recorded
    pub const MIN_SESSION_SECS: u64 = 5;
}

/// Camera and encoder defaults
pub mod capture {
    /// Ideal capture width requested from the camera
    pub const IDEAL_WIDTH: u32 = 640;
    /// Ideal capture height requested from the camera
    pub const IDEAL_HEIGHT: u32 = 480;
    /// Maximum frame rate requested from the camera
    pub const MAX_FRAME_RATE: u32 = 10;
    /// JPEG quality factor (1-100)
    pub const JPEG_QUALITY: u8 = 50;
}

/// Local store keys and bounds
pub mod storage {
    /// Key holding the latest rep counters
    pub const COUNTERS_KEY: &str = "squatStats";
    /// Key holding the workout history
    pub const HISTORY_KEY: &str = "previousWorkouts";
    /// Key holding the last generated workout plan
    pub const WORKOUT_PLAN_KEY: &str = "aiWorkoutPlan";
    /// Key holding the last generated diet plan
    pub const DIET_PLAN_KEY: &str = "aiDietPlan";
    /// Number of workout records retained (newest first)
    pub const HISTORY_CAP: usize = 7;
}

/// Defaults for the text-generation collaborator
pub mod generation {
    /// Default Gemini model
    pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";
    /// Sampling temperature
    pub const TEMPERATURE: f32 = 0.7;
    /// Nucleus sampling cutoff
    pub const TOP_P: f32 = 0.95;
    /// Top-k sampling cutoff
    pub const TOP_K: u32 = 40;
    /// Maximum tokens generated per request
    pub const MAX_OUTPUT_TOKENS: u32 = 3_072;
    /// Request timeout
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
}

/// Recorded-video upload and status polling
pub mod upload {
    /// Multipart upload route
    pub const UPLOAD_PATH: &str = "/upload-video";
    /// Status route prefix; the video id follows
    pub const STATUS_PATH: &str = "/video-status";
    /// Multipart field carrying the video bytes
    pub const VIDEO_FIELD: &str = "video";
    /// Multipart field carrying the analysis mode
    pub const MODE_FIELD: &str = "mode";
    /// Delay between status polls
    pub const POLL_INTERVAL_SECS: u64 = 3;
    /// Timeout applied to each upload or status request
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
    /// Duration recorded for a processed video that reports none
    pub const DEFAULT_DURATION_SECS: u64 = 60;
}

/// Default endpoints
pub mod endpoints {
    /// Pose-analysis backend used when nothing is configured
    pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";
    /// Video analysis HTTP service used when nothing is configured
    pub const DEFAULT_API_URL: &str = "http://localhost:8000";
    /// Text-generation route used when nothing is configured
    pub const DEFAULT_GENERATE_URL: &str = "http://localhost:3000/api/generate-ai-content";
    /// Gemini REST API base URL
    pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
}

/// Service names for structured logging
pub mod service_names {
    /// Name reported by the streaming client
    pub const SQUAT_COACH: &str = "squat-coach";
}
