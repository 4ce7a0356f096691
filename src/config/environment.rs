// ABOUTME: Environment configuration for the streaming client and text-generation collaborator
// ABOUTME: Parses endpoint URLs, mode, storage paths, and timing knobs from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration

use crate::capture::CaptureConstraints;
use crate::constants::{capture, endpoints, generation, timing, upload};
use crate::models::Mode;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Settings for one detector instance
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Pose-analysis backend endpoint
    pub ws_url: String,
    /// Mode selected at startup
    pub mode: Mode,
    /// Camera request
    pub constraints: CaptureConstraints,
    /// JPEG quality factor (1-100)
    pub jpeg_quality: u8,
    /// Delay before reconnecting after a close or failed open
    pub reconnect_delay: Duration,
    /// Pending connect attempts older than this are abandoned
    pub connect_timeout: Duration,
    /// Keep-alive interval
    pub heartbeat_interval: Duration,
    /// Minimum spacing between sent frames
    pub min_frame_interval: Duration,
    /// Capture loop poll period
    pub capture_poll_interval: Duration,
    /// Performance statistics log period
    pub stats_interval: Duration,
    /// Sessions must be longer than this to be recorded
    pub min_session: Duration,
    /// Location of the JSON key/value store
    pub store_path: PathBuf,
    /// Directory holding the cue audio assets
    pub sounds_dir: PathBuf,
    /// Deployment environment
    pub environment: Environment,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ws_url: endpoints::DEFAULT_WS_URL.to_owned(),
            mode: Mode::default(),
            constraints: CaptureConstraints::default(),
            jpeg_quality: capture::JPEG_QUALITY,
            reconnect_delay: Duration::from_millis(timing::RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_secs(timing::CONNECT_TIMEOUT_SECS),
            heartbeat_interval: Duration::from_secs(timing::HEARTBEAT_INTERVAL_SECS),
            min_frame_interval: Duration::from_millis(timing::MIN_FRAME_INTERVAL_MS),
            capture_poll_interval: Duration::from_millis(timing::CAPTURE_POLL_INTERVAL_MS),
            stats_interval: Duration::from_secs(timing::STATS_INTERVAL_SECS),
            min_session: Duration::from_secs(timing::MIN_SESSION_SECS),
            store_path: default_store_path(),
            sounds_dir: PathBuf::from("sounds"),
            environment: Environment::default(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is not a `ws`/`wss` URL or a
    /// numeric knob does not parse
    pub fn from_env() -> Result<Self> {
        info!("Loading detector configuration from environment variables");
        let defaults = Self::default();

        let ws_url = env::var("SQUAT_COACH_WS_URL")
            .or_else(|_| env::var("NEXT_PUBLIC_WS_URL"))
            .unwrap_or_else(|_| endpoints::DEFAULT_WS_URL.to_owned());

        let config = Self {
            ws_url: validate_ws_url(&ws_url)?,
            mode: env::var("SQUAT_COACH_MODE")
                .map_or(defaults.mode, |raw| Mode::from_str_or_default(&raw)),
            jpeg_quality: env_parse_or("SQUAT_COACH_JPEG_QUALITY", defaults.jpeg_quality)?,
            reconnect_delay: Duration::from_millis(env_parse_or(
                "SQUAT_COACH_RECONNECT_DELAY_MS",
                timing::RECONNECT_DELAY_MS,
            )?),
            heartbeat_interval: Duration::from_secs(env_parse_or(
                "SQUAT_COACH_HEARTBEAT_SECS",
                timing::HEARTBEAT_INTERVAL_SECS,
            )?),
            min_frame_interval: Duration::from_millis(env_parse_or(
                "SQUAT_COACH_MIN_FRAME_INTERVAL_MS",
                timing::MIN_FRAME_INTERVAL_MS,
            )?),
            store_path: env::var("SQUAT_COACH_STORE_PATH")
                .map_or(defaults.store_path.clone(), PathBuf::from),
            sounds_dir: env::var("SQUAT_COACH_SOUNDS_DIR")
                .map_or(defaults.sounds_dir.clone(), PathBuf::from),
            environment: env::var("SQUAT_COACH_ENV")
                .map_or(defaults.environment, |raw| {
                    Environment::from_str_or_default(&raw)
                }),
            ..defaults
        };

        config.validate()?;
        info!("Detector configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range values
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!(
                "SQUAT_COACH_JPEG_QUALITY must be between 1 and 100, got {}",
                self.jpeg_quality
            );
        }
        if self.reconnect_delay.is_zero() {
            bail!("Reconnect delay must be greater than zero");
        }
        if self.capture_poll_interval.is_zero()
            || self.heartbeat_interval.is_zero()
            || self.stats_interval.is_zero()
        {
            bail!("Timer intervals must be greater than zero");
        }
        if self.environment.is_production() && self.ws_url.starts_with("ws://") {
            warn!(url = %self.ws_url, "Production detector is using an unencrypted endpoint");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Squat Coach Configuration:\n\
             - Endpoint: {}\n\
             - Mode: {}\n\
             - Capture: {}x{} @ {} fps max, JPEG q{}\n\
             - Frame interval: {}ms\n\
             - Reconnect delay: {}ms\n\
             - Heartbeat: {}s\n\
             - Store: {}\n\
             - Sounds: {}\n\
             - Environment: {}",
            self.ws_url,
            self.mode,
            self.constraints.ideal_width,
            self.constraints.ideal_height,
            self.constraints.max_frame_rate,
            self.jpeg_quality,
            self.min_frame_interval.as_millis(),
            self.reconnect_delay.as_millis(),
            self.heartbeat_interval.as_secs(),
            self.store_path.display(),
            self.sounds_dir.display(),
            self.environment,
        )
    }
}

/// Settings for the text-generation collaborator
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// `{prompt}` -> `{content}` route
    pub endpoint: String,
    /// Gemini API key; when present the model is called directly
    pub gemini_api_key: Option<String>,
    /// Gemini model name
    pub gemini_model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::DEFAULT_GENERATE_URL.to_owned(),
            gemini_api_key: None,
            gemini_model: generation::DEFAULT_MODEL.to_owned(),
            timeout: Duration::from_secs(generation::REQUEST_TIMEOUT_SECS),
        }
    }
}

impl GenerationConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an `http`/`https` URL
    pub fn from_env() -> Result<Self> {
        let endpoint = env::var("SQUAT_COACH_GENERATE_URL")
            .unwrap_or_else(|_| endpoints::DEFAULT_GENERATE_URL.to_owned());
        let parsed = Url::parse(&endpoint)
            .with_context(|| format!("Invalid SQUAT_COACH_GENERATE_URL value: {endpoint}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("SQUAT_COACH_GENERATE_URL must use http or https, got {endpoint}");
        }

        Ok(Self {
            endpoint,
            gemini_api_key: env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| generation::DEFAULT_MODEL.to_owned()),
            ..Self::default()
        })
    }
}

/// Settings for the recorded-video analysis service
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Base URL serving `/upload-video` and `/video-status/{id}`
    pub base_url: String,
    /// Delay between two status polls
    pub poll_interval: Duration,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    /// Give up waiting for a result after this long; `None` waits indefinitely
    pub max_wait: Option<Duration>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: endpoints::DEFAULT_API_URL.to_owned(),
            poll_interval: Duration::from_secs(upload::POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(upload::REQUEST_TIMEOUT_SECS),
            max_wait: None,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an `http`/`https` URL, the
    /// poll interval is zero, or a timing value does not parse
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("SQUAT_COACH_API_URL")
            .unwrap_or_else(|_| endpoints::DEFAULT_API_URL.to_owned());
        let parsed = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid SQUAT_COACH_API_URL value: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("SQUAT_COACH_API_URL must use http or https, got {base_url}");
        }

        let max_wait = match env::var("SQUAT_COACH_UPLOAD_MAX_WAIT_SECS") {
            Ok(raw) => Some(Duration::from_secs(raw.trim().parse().with_context(|| {
                format!("Invalid SQUAT_COACH_UPLOAD_MAX_WAIT_SECS value: {raw}")
            })?)),
            Err(_) => None,
        };

        let poll_interval = Duration::from_millis(env_parse_or(
            "SQUAT_COACH_UPLOAD_POLL_MS",
            upload::POLL_INTERVAL_SECS * 1_000,
        )?);
        if poll_interval.is_zero() {
            bail!("SQUAT_COACH_UPLOAD_POLL_MS must be greater than zero");
        }

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            poll_interval,
            max_wait,
            ..Self::default()
        })
    }
}

/// Check that `raw` is a `ws://` or `wss://` URL
///
/// # Errors
///
/// Returns an error if the value does not parse or uses another scheme
pub fn validate_ws_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).with_context(|| format!("Invalid WebSocket URL: {trimmed}"))?;
    match url.scheme() {
        "ws" | "wss" => Ok(trimmed.to_owned()),
        other => bail!("WebSocket URL must use ws or wss, got {other}"),
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("squat-coach-store.json"),
        |dir| dir.join("squat-coach").join("store.json"),
    )
}

fn env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}"))
    })
}
