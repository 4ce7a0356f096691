// ABOUTME: FrameCapture reads camera frames at a throttled rate and encodes them as JPEG data URLs
// ABOUTME: Defines the Camera and VideoSource seams plus the scoped capture owner
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Frame Capture
//!
//! [`FrameCapture`] owns the camera source while streaming. Each [`tick`]
//! renders the current frame onto an off-screen canvas sized to the source's
//! native resolution, encodes it as JPEG, and returns a data URL ready for the
//! link. Frames produced sooner than the minimum interval after the last sent
//! frame are dropped, never queued.
//!
//! The source is released on [`stop`] and again on `Drop`, so every exit path
//! gives the camera back.
//!
//! [`tick`]: FrameCapture::tick
//! [`stop`]: FrameCapture::stop

/// Camera that replays still images from a directory
pub mod file_camera;

pub use file_camera::FileCamera;

use crate::constants::{capture, protocol, timing};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Which camera to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// Front camera
    #[default]
    User,
    /// Rear camera
    Environment,
}

/// Requested camera properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Ideal frame width
    pub ideal_width: u32,
    /// Ideal frame height
    pub ideal_height: u32,
    /// Preferred camera
    pub facing: FacingMode,
    /// Upper bound on delivered frame rate
    pub max_frame_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: capture::IDEAL_WIDTH,
            ideal_height: capture::IDEAL_HEIGHT,
            facing: FacingMode::User,
            max_frame_rate: capture::MAX_FRAME_RATE,
        }
    }
}

/// Grants access to a live video source
#[async_trait]
pub trait Camera: Send + Sync {
    /// Acquire a source matching `constraints`
    ///
    /// # Errors
    ///
    /// Returns `MediaAccessDenied` when permission is refused and
    /// `MediaUnavailable` when no matching device exists
    async fn open(&self, constraints: &CaptureConstraints) -> AppResult<Box<dyn VideoSource>>;
}

/// An acquired video source and its tracks
pub trait VideoSource: Send {
    /// Native resolution; zero when unknown
    fn resolution(&self) -> (u32, u32);

    /// The frame currently shown by the source
    ///
    /// # Errors
    ///
    /// Returns an error when the source can no longer produce frames
    fn current_frame(&mut self) -> AppResult<RgbImage>;

    /// Stop every track and release the device
    fn stop(&mut self);
}

/// A compressed frame ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Capture order within the session
    pub sequence: u64,
    /// Canvas width
    pub width: u32,
    /// Canvas height
    pub height: u32,
    data_url: String,
}

impl EncodedFrame {
    /// `data:image/jpeg;base64,...` payload
    #[must_use]
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Consume into the wire payload
    #[must_use]
    pub fn into_data_url(self) -> String {
        self.data_url
    }

    /// Decoded JPEG bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a base64 JPEG data URL
    pub fn jpeg_bytes(&self) -> AppResult<Vec<u8>> {
        let encoded = self
            .data_url
            .strip_prefix(protocol::JPEG_DATA_URL_PREFIX)
            .ok_or_else(|| AppError::frame_encoding("missing JPEG data URL prefix"))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| AppError::frame_encoding(format!("invalid base64 payload: {e}")))
    }
}

/// Result of one capture-loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was encoded and should be sent
    Frame(EncodedFrame),
    /// Too soon after the last sent frame
    Throttled,
    /// The link is not open; nothing rendered
    LinkClosed,
    /// No source is held
    Inactive,
}

/// Capture counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames encoded
    pub frames_encoded: u64,
    /// Ticks skipped by the rate limit
    pub frames_throttled: u64,
    /// Ticks skipped because the link was closed
    pub ticks_link_closed: u64,
}

/// Scoped owner of the camera source
pub struct FrameCapture {
    source: Option<Box<dyn VideoSource>>,
    canvas: RgbImage,
    min_interval: Duration,
    quality: u8,
    last_sent: Option<Instant>,
    sequence: u64,
    stats: CaptureStats,
}

impl Default for FrameCapture {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(timing::MIN_FRAME_INTERVAL_MS),
            capture::JPEG_QUALITY,
        )
    }
}

impl FrameCapture {
    /// Create an inactive capture with the given rate limit and JPEG quality
    #[must_use]
    pub fn new(min_interval: Duration, quality: u8) -> Self {
        Self {
            source: None,
            canvas: RgbImage::new(0, 0),
            min_interval,
            quality: quality.clamp(1, 100),
            last_sent: None,
            sequence: 0,
            stats: CaptureStats::default(),
        }
    }

    /// Acquire a source from `camera`, releasing any source already held
    ///
    /// # Errors
    ///
    /// Propagates the camera's access error unchanged
    pub async fn start(
        &mut self,
        camera: &dyn Camera,
        constraints: &CaptureConstraints,
    ) -> AppResult<()> {
        self.stop();
        let source = camera.open(constraints).await?;

        let (width, height) = match source.resolution() {
            (0, _) | (_, 0) => (capture::IDEAL_WIDTH, capture::IDEAL_HEIGHT),
            native => native,
        };
        self.canvas = RgbImage::new(width, height);
        self.source = Some(source);
        self.last_sent = None;
        self.sequence = 0;
        self.stats = CaptureStats::default();

        info!(width, height, "Camera source acquired");
        Ok(())
    }

    /// Whether a source is held
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Off-screen canvas size
    #[must_use]
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Capture counters for the current session
    #[must_use]
    pub const fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Run one capture-loop iteration
    ///
    /// # Errors
    ///
    /// Returns the source's error when it cannot produce a frame, or a
    /// `FrameEncodingFailed` error when JPEG encoding fails
    pub fn tick(&mut self, now: Instant, link_open: bool) -> AppResult<TickOutcome> {
        let Some(source) = self.source.as_mut() else {
            return Ok(TickOutcome::Inactive);
        };
        if !link_open {
            self.stats.ticks_link_closed += 1;
            return Ok(TickOutcome::LinkClosed);
        }
        if self
            .last_sent
            .is_some_and(|last| now.saturating_duration_since(last) < self.min_interval)
        {
            self.stats.frames_throttled += 1;
            return Ok(TickOutcome::Throttled);
        }

        let frame = source.current_frame()?;
        let (width, height) = self.canvas.dimensions();
        self.canvas = if frame.dimensions() == (width, height) {
            frame
        } else {
            imageops::resize(&frame, width, height, FilterType::Triangle)
        };

        let data_url = encode_jpeg_data_url(&self.canvas, self.quality)?;
        self.last_sent = Some(now);
        self.sequence += 1;
        self.stats.frames_encoded += 1;

        Ok(TickOutcome::Frame(EncodedFrame {
            sequence: self.sequence,
            width,
            height,
            data_url,
        }))
    }

    /// Release the source and all its tracks; safe to call repeatedly
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            debug!(frames_encoded = self.stats.frames_encoded, "Camera source released");
        }
    }
}

impl Drop for FrameCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Encode an RGB image as a base64 JPEG data URL
///
/// # Errors
///
/// Returns a `FrameEncodingFailed` error if the encoder rejects the image
pub fn encode_jpeg_data_url(image: &RgbImage, quality: u8) -> AppResult<String> {
    let mut jpeg = Vec::with_capacity(image.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(image)?;

    let mut data_url =
        String::with_capacity(protocol::JPEG_DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    data_url.push_str(protocol::JPEG_DATA_URL_PREFIX);
    STANDARD.encode_string(&jpeg, &mut data_url);
    Ok(data_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticSource {
        resolution: (u32, u32),
        stops: Arc<AtomicUsize>,
    }

    impl VideoSource for StaticSource {
        fn resolution(&self) -> (u32, u32) {
            self.resolution
        }

        fn current_frame(&mut self) -> AppResult<RgbImage> {
            Ok(RgbImage::from_pixel(320, 240, Rgb([40, 120, 200])))
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct StaticCamera {
        resolution: (u32, u32),
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Camera for StaticCamera {
        async fn open(&self, _: &CaptureConstraints) -> AppResult<Box<dyn VideoSource>> {
            Ok(Box::new(StaticSource {
                resolution: self.resolution,
                stops: Arc::clone(&self.stops),
            }))
        }
    }

    fn camera(resolution: (u32, u32)) -> (StaticCamera, Arc<AtomicUsize>) {
        let stops = Arc::new(AtomicUsize::new(0));
        (
            StaticCamera {
                resolution,
                stops: Arc::clone(&stops),
            },
            stops,
        )
    }

    #[tokio::test]
    async fn test_zero_resolution_falls_back_to_default_canvas() {
        let (camera, _) = camera((0, 0));
        let mut capture = FrameCapture::default();
        capture.start(&camera, &CaptureConstraints::default()).await.unwrap();
        assert_eq!(capture.canvas_size(), (640, 480));

        let TickOutcome::Frame(frame) = capture.tick(Instant::now(), true).unwrap() else {
            panic!("first tick should produce a frame");
        };
        assert_eq!((frame.width, frame.height), (640, 480));
        assert!(frame.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_rate_limit_drops_early_frames() {
        let (camera, _) = camera((320, 240));
        let mut capture = FrameCapture::default();
        capture.start(&camera, &CaptureConstraints::default()).await.unwrap();

        let start = Instant::now();
        assert!(matches!(capture.tick(start, true).unwrap(), TickOutcome::Frame(_)));
        assert_eq!(
            capture.tick(start + Duration::from_millis(50), true).unwrap(),
            TickOutcome::Throttled
        );
        assert!(matches!(
            capture.tick(start + Duration::from_millis(100), true).unwrap(),
            TickOutcome::Frame(_)
        ));
        assert_eq!(capture.stats().frames_encoded, 2);
        assert_eq!(capture.stats().frames_throttled, 1);
    }

    #[tokio::test]
    async fn test_stop_and_drop_release_once() {
        let (camera, stops) = camera((320, 240));
        let mut capture = FrameCapture::default();
        capture.start(&camera, &CaptureConstraints::default()).await.unwrap();
        capture.stop();
        capture.stop();
        drop(capture);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
