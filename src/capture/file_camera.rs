// ABOUTME: Camera implementation that replays JPEG and PNG stills from a directory in name order
// ABOUTME: Lets the detector stream without a physical device, e.g. recorded sessions or demos
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{Camera, CaptureConstraints, VideoSource};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use image::RgbImage;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Replays the images found in a directory, looping forever
#[derive(Debug, Clone)]
pub struct FileCamera {
    directory: PathBuf,
}

impl FileCamera {
    /// Camera backed by `directory`
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn frame_paths(&self) -> AppResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.directory).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => AppError::media_access_denied(format!(
                "cannot read {}: {e}",
                self.directory.display()
            )),
            _ => AppError::media_unavailable(format!(
                "cannot read {}: {e}",
                self.directory.display()
            )),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_supported(path))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

#[async_trait]
impl Camera for FileCamera {
    async fn open(&self, constraints: &CaptureConstraints) -> AppResult<Box<dyn VideoSource>> {
        let paths = self.frame_paths()?;
        if paths.is_empty() {
            return Err(AppError::media_unavailable(format!(
                "no JPEG or PNG frames in {}",
                self.directory.display()
            )));
        }

        let frames = tokio::task::spawn_blocking(move || -> AppResult<Vec<RgbImage>> {
            paths
                .iter()
                .map(|path| {
                    image::open(path).map(|decoded| decoded.to_rgb8()).map_err(|e| {
                        AppError::media_unavailable(format!(
                            "cannot decode {}: {e}",
                            path.display()
                        ))
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| AppError::internal(format!("frame loader panicked: {e}")))??;

        let resolution = frames.first().map_or((0, 0), RgbImage::dimensions);
        info!(
            directory = %self.directory.display(),
            frames = frames.len(),
            width = resolution.0,
            height = resolution.1,
            requested_width = constraints.ideal_width,
            requested_height = constraints.ideal_height,
            "Opened file camera"
        );

        Ok(Box::new(FileSource {
            frames,
            position: 0,
            resolution,
            stopped: false,
        }))
    }
}

struct FileSource {
    frames: Vec<RgbImage>,
    position: usize,
    resolution: (u32, u32),
    stopped: bool,
}

impl VideoSource for FileSource {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn current_frame(&mut self) -> AppResult<RgbImage> {
        if self.stopped {
            return Err(AppError::media_unavailable("file camera was stopped"));
        }
        let frame = self
            .frames
            .get(self.position % self.frames.len().max(1))
            .cloned()
            .ok_or_else(|| AppError::media_unavailable("file camera has no frames"))?;
        self.position = self.position.wrapping_add(1);
        Ok(frame)
    }

    fn stop(&mut self) {
        self.stopped = true;
        debug!(frames_played = self.position, "File camera stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use image::Rgb;

    #[tokio::test]
    async fn test_replays_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let camera = FileCamera::new(dir.path());
        let mut source = camera.open(&CaptureConstraints::default()).await.unwrap();
        assert_eq!(source.resolution(), (4, 4));
        assert_eq!(source.current_frame().unwrap().get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(source.current_frame().unwrap().get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(source.current_frame().unwrap().get_pixel(0, 0), &Rgb([0, 0, 255]));

        source.stop();
        assert!(source.current_frame().is_err());
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let camera = FileCamera::new("/definitely/not/a/camera");
        let error = camera.open(&CaptureConstraints::default()).await.err().unwrap();
        assert_eq!(error.code, ErrorCode::MediaUnavailable);
    }
}
