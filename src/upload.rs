// ABOUTME: Recorded-video analysis client posting a multipart upload and polling its status route
// ABOUTME: Folds a completed analysis into the stored counters and workout history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Video Upload
//!
//! A recorded video is posted to `/upload-video` together with the analysis
//! mode. The service answers `202` with a `video_id` and processes the file
//! in the background; [`VideoUploadClient::wait_for_result`] then polls
//! `/video-status/{id}` until the analysis completes or fails.
//!
//! Transport errors, unexpected status codes, and unreadable bodies while
//! polling are logged and the poll continues. An unknown video id (`404`) or
//! a `failed` status ends the wait.

use crate::config::UploadConfig;
use crate::constants::upload;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{Mode, RepCounters, WorkoutRecord};
use crate::store::SessionStore;
use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use url::Url;

const SERVICE: &str = "video analysis";

#[derive(Debug, Deserialize)]
struct UploadAccepted {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: Option<String>,
}

/// Outcome of a finished video analysis
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct VideoAnalysis {
    /// Reps performed with correct form
    #[serde(default)]
    pub correct_squats: u32,
    /// Reps flagged as incorrect
    #[serde(default)]
    pub incorrect_squats: u32,
    /// Annotated rendition of the upload
    #[serde(default)]
    pub processed_video_url: Option<String>,
    /// Still frame of the upload
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Identifier the service assigned to the upload
    #[serde(default)]
    pub video_id: Option<String>,
    /// Mode the service analysed with, as reported
    #[serde(default)]
    pub mode: Option<String>,
    /// Length of the analysed video
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

impl VideoAnalysis {
    /// Counters found in the video
    #[must_use]
    pub const fn counters(&self) -> RepCounters {
        RepCounters::new(self.correct_squats, self.incorrect_squats)
    }

    /// Workout record for this analysis, dated `today`
    ///
    /// A missing or zero duration is recorded as one minute; a missing or
    /// unknown mode falls back to `requested`.
    #[must_use]
    pub fn to_record(&self, requested: Mode, today: NaiveDate) -> WorkoutRecord {
        WorkoutRecord {
            date: today,
            correct: self.correct_squats,
            incorrect: self.incorrect_squats,
            duration_seconds: self
                .duration_seconds
                .filter(|seconds| *seconds > 0)
                .unwrap_or(upload::DEFAULT_DURATION_SECS),
            mode: self.mode.as_deref().and_then(Mode::parse).unwrap_or(requested),
            is_video: true,
        }
    }
}

/// Processing state reported by the status route
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VideoStatus {
    /// Still being analysed
    Processing,
    /// Analysis finished
    Completed {
        /// Counters and media links
        result: VideoAnalysis,
    },
    /// Analysis gave up
    Failed {
        /// Reason reported by the service
        #[serde(default)]
        error: Option<String>,
    },
}

/// HTTP client for the recorded-video analysis service
#[derive(Debug, Clone)]
pub struct VideoUploadClient {
    client: Client,
    base_url: Url,
    poll_interval: Duration,
    max_wait: Option<Duration>,
}

impl VideoUploadClient {
    /// Client for the service described by `config`
    ///
    /// # Errors
    ///
    /// Returns a config error if the base URL is invalid or the HTTP client
    /// cannot be built
    pub fn new(config: &UploadConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::config_invalid(format!("invalid video service URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::config_invalid(format!(
                "video service URL cannot carry a path: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            poll_interval: config.poll_interval,
            max_wait: config.max_wait,
        })
    }

    fn route(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::config_invalid("video service URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Upload the video at `path` for analysis in `mode`; returns the video id
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the file cannot be read, or an external
    /// service error when the upload is refused or no id comes back
    #[instrument(skip_all, fields(path = %path.display(), mode = %mode))]
    pub async fn upload(&self, path: &Path, mode: Mode) -> AppResult<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::invalid_input(format!("cannot read video {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("video")
            .to_owned();
        let size = bytes.len();

        let video = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(video_mime(path))?;
        let form = Form::new()
            .part(upload::VIDEO_FIELD, video)
            .text(upload::MODE_FIELD, mode.as_str());

        debug!(bytes = size, "Uploading video");
        let response = self
            .client
            .post(self.route(&[upload::UPLOAD_PATH.trim_start_matches('/')])?)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = service_reason(&body);
            warn!(status = %status, reason = %reason, "Video upload refused");
            return Err(
                AppError::external_service(SERVICE, format!("upload failed: {status}: {reason}"))
                    .with_details(json!({ "status": status.as_u16() })),
            );
        }

        let accepted: UploadAccepted = serde_json::from_str(&body).map_err(|e| {
            AppError::external_service(SERVICE, format!("unexpected upload response: {e}"))
        })?;
        let video_id = accepted
            .video_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::external_service(SERVICE, "no video id received"))?;

        info!(video_id = %video_id, bytes = size, "Video uploaded and queued");
        Ok(video_id)
    }

    /// Fetch the current processing state of `video_id`
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown id, an external service error
    /// for other failures, or a serialization error for an unreadable body
    pub async fn status(&self, video_id: &str) -> AppResult<VideoStatus> {
        let url = self.route(&[upload::STATUS_PATH.trim_start_matches('/'), video_id])?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!("video {video_id}"))
                .with_details(json!({ "reason": service_reason(&body) })));
        }
        if !status.is_success() {
            return Err(AppError::external_service(
                SERVICE,
                format!("status check failed: {status}: {}", service_reason(&body)),
            )
            .with_details(json!({ "status": status.as_u16() })));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Poll until the analysis of `video_id` completes
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown id, an external service error
    /// when processing failed, or `ExternalServiceUnavailable` once the
    /// configured maximum wait has passed
    #[instrument(skip(self))]
    pub async fn wait_for_result(&self, video_id: &str) -> AppResult<VideoAnalysis> {
        let started = Instant::now();
        let period = self.poll_interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u32 = 0;

        loop {
            ticker.tick().await;
            polls += 1;

            match self.status(video_id).await {
                Ok(VideoStatus::Completed { result }) => {
                    info!(
                        polls,
                        correct = result.correct_squats,
                        incorrect = result.incorrect_squats,
                        "Video analysis completed"
                    );
                    return Ok(result);
                }
                Ok(VideoStatus::Failed { error }) => {
                    let reason = error.unwrap_or_else(|| "Unknown error".to_owned());
                    warn!(polls, reason = %reason, "Video analysis failed");
                    return Err(AppError::external_service(
                        SERVICE,
                        format!("processing failed: {reason}"),
                    ));
                }
                Ok(VideoStatus::Processing) => debug!(polls, "Video still processing"),
                Err(e) if e.code == ErrorCode::ResourceNotFound => return Err(e),
                Err(e) => warn!(polls, error = %e, "Status check failed, polling again"),
            }

            if let Some(limit) = self.max_wait {
                if started.elapsed() >= limit {
                    return Err(AppError::new(
                        ErrorCode::ExternalServiceUnavailable,
                        format!(
                            "video {video_id} not analysed within {}s",
                            limit.as_secs()
                        ),
                    ));
                }
            }
        }
    }
}

/// Add a finished analysis to the stored counters and history
///
/// Counters grow by the analysed reps and a video record dated `today` is
/// placed at the front of the history.
///
/// # Errors
///
/// Returns a storage error if either write fails
pub fn record_video_result(
    store: &SessionStore,
    analysis: &VideoAnalysis,
    requested: Mode,
    today: NaiveDate,
) -> AppResult<WorkoutRecord> {
    let record = analysis.to_record(requested, today);

    let counters = store.load_counters().combined(analysis.counters());
    store.save_counters(counters)?;

    let mut history = store.load_history();
    history.push(record.clone());
    store.save_history(&history)?;

    info!(
        correct = counters.correct,
        incorrect = counters.incorrect,
        workouts = history.len(),
        "Video result recorded"
    );
    Ok(record)
}

fn service_reason(body: &str) -> String {
    serde_json::from_str::<ServiceError>(body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| body.trim().to_owned())
}

fn video_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
