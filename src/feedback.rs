// ABOUTME: FeedbackPresenter maps backend feedback codes to visual and audio cues
// ABOUTME: Cue delivery goes through a CueSink; audio failures are logged and never propagated
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::{AppError, AppResult};
use crate::models::FeedbackEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Emotional register of a visual cue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueTone {
    /// A rep with good form
    Positive,
    /// A rep with bad form
    Warning,
    /// Informational
    Neutral,
}

/// On-screen message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualCue {
    /// Register
    pub tone: CueTone,
    /// Text shown to the user
    pub message: String,
}

/// Audio asset to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCue {
    /// Asset file name relative to the sounds directory
    pub asset: String,
}

/// Both halves of the response to one feedback event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// On-screen message
    pub visual: VisualCue,
    /// Sound
    pub audio: AudioCue,
}

/// Destination for cues
pub trait CueSink: Send + Sync {
    /// Display a visual cue
    fn show(&self, cue: &VisualCue);

    /// Start playing an audio cue without waiting for it to finish
    ///
    /// # Errors
    ///
    /// Returns an error if playback cannot start
    fn play(&self, cue: &AudioCue) -> AppResult<()>;
}

/// Maps feedback events to cues and hands them to a sink
#[derive(Clone)]
pub struct FeedbackPresenter {
    sink: Arc<dyn CueSink>,
}

impl FeedbackPresenter {
    /// Presenter delivering to `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn CueSink>) -> Self {
        Self { sink }
    }

    /// The cue for `event`, or `None` for codes without one
    #[must_use]
    pub fn cue_for(event: &FeedbackEvent) -> Option<Cue> {
        let (tone, message, asset) = match event {
            FeedbackEvent::RepCount(count) => (
                CueTone::Positive,
                format!("Good squat #{count} completed!"),
                format!("count_{count}.mp3"),
            ),
            FeedbackEvent::IncorrectForm => (
                CueTone::Warning,
                "Improper form detected".to_owned(),
                "incorrect.mp3".to_owned(),
            ),
            FeedbackEvent::ResetDueToInactivity => (
                CueTone::Neutral,
                "Counters reset due to inactivity".to_owned(),
                "reset.mp3".to_owned(),
            ),
            FeedbackEvent::Unrecognized(code) => {
                debug!(code = %code, "No cue for feedback code");
                return None;
            }
        };

        Some(Cue {
            visual: VisualCue { tone, message },
            audio: AudioCue { asset },
        })
    }

    /// Deliver the cue for `event`; playback failures are logged
    pub fn present(&self, event: &FeedbackEvent) -> Option<Cue> {
        let cue = Self::cue_for(event)?;
        self.sink.show(&cue.visual);
        if let Err(e) = self.sink.play(&cue.audio) {
            warn!(asset = %cue.audio.asset, error = %e, "Audio cue failed to play");
        }
        Some(cue)
    }
}

/// Sink that resolves audio assets under a sounds directory and logs each cue
///
/// Hosts with an audio device wrap or replace this sink; headless runs use it
/// as is so missing assets still show up in the logs.
#[derive(Debug, Clone)]
pub struct AssetCueSink {
    sounds_dir: PathBuf,
}

impl AssetCueSink {
    /// Sink resolving assets under `sounds_dir`
    #[must_use]
    pub fn new(sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            sounds_dir: sounds_dir.into(),
        }
    }

    /// Full path of an audio asset
    #[must_use]
    pub fn resolve(&self, cue: &AudioCue) -> PathBuf {
        self.sounds_dir.join(&cue.asset)
    }
}

impl CueSink for AssetCueSink {
    fn show(&self, cue: &VisualCue) {
        info!(tone = ?cue.tone, "{}", cue.message);
    }

    fn play(&self, cue: &AudioCue) -> AppResult<()> {
        let path = self.resolve(cue);
        if !path.is_file() {
            return Err(AppError::not_found(format!("audio asset {}", path.display())));
        }
        debug!(asset = %path.display(), "Audio cue queued");
        Ok(())
    }
}
