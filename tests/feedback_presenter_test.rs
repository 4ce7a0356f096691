// ABOUTME: Integration tests for FeedbackPresenter cue mapping and delivery
// ABOUTME: Checks each feedback code against its visual and audio cue, and playback failure handling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::RecordingCueSink;
use squat_coach::errors::{AppError, AppResult};
use squat_coach::feedback::{AssetCueSink, AudioCue, CueSink, CueTone, FeedbackPresenter, VisualCue};
use squat_coach::models::FeedbackEvent;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_each_code_maps_to_one_cue() {
    common::init_test_logging();
    let sink = RecordingCueSink::new();
    let presenter = FeedbackPresenter::new(sink.clone());

    for raw in ["1", "12", "incorrect", "reset_counters"] {
        let event = FeedbackEvent::parse(raw).unwrap();
        assert!(presenter.present(&event).is_some(), "no cue for {raw}");
    }

    let shown: Vec<(CueTone, String)> = sink
        .shown()
        .into_iter()
        .map(|cue| (cue.tone, cue.message))
        .collect();
    assert_eq!(
        shown,
        vec![
            (CueTone::Positive, "Good squat #1 completed!".to_owned()),
            (CueTone::Positive, "Good squat #12 completed!".to_owned()),
            (CueTone::Warning, "Improper form detected".to_owned()),
            (CueTone::Neutral, "Counters reset due to inactivity".to_owned()),
        ]
    );
    assert_eq!(
        sink.played(),
        vec!["count_1.mp3", "count_12.mp3", "incorrect.mp3", "reset.mp3"]
    );
}

#[test]
fn test_incorrect_form_emits_exactly_one_cue() {
    let sink = RecordingCueSink::new();
    let presenter = FeedbackPresenter::new(sink.clone());

    let cue = presenter.present(&FeedbackEvent::IncorrectForm).unwrap();
    assert_eq!(cue.visual.tone, CueTone::Warning);
    assert_eq!(sink.shown().len(), 1);
    assert_eq!(sink.played(), vec!["incorrect.mp3"]);
}

#[test]
fn test_unknown_codes_are_silent() {
    let sink = RecordingCueSink::new();
    let presenter = FeedbackPresenter::new(sink.clone());

    assert!(FeedbackEvent::parse("null").is_none());
    assert!(FeedbackEvent::parse("").is_none());
    let unknown = FeedbackEvent::parse("knees_caving").unwrap();
    assert_eq!(unknown, FeedbackEvent::Unrecognized("knees_caving".to_owned()));

    assert!(presenter.present(&unknown).is_none());
    assert!(sink.shown().is_empty());
    assert!(sink.played().is_empty());
}

struct MutedSink {
    shown: AtomicUsize,
}

impl CueSink for MutedSink {
    fn show(&self, _cue: &VisualCue) {
        self.shown.fetch_add(1, Ordering::SeqCst);
    }

    fn play(&self, cue: &AudioCue) -> AppResult<()> {
        Err(AppError::not_found(format!("audio device for {}", cue.asset)))
    }
}

#[test]
fn test_playback_failure_still_shows_cue() {
    let sink = Arc::new(MutedSink {
        shown: AtomicUsize::new(0),
    });
    let presenter = FeedbackPresenter::new(sink.clone());

    let cue = presenter.present(&FeedbackEvent::RepCount(3));
    assert!(cue.is_some());
    assert_eq!(sink.shown.load(Ordering::SeqCst), 1);
}

#[test]
fn test_asset_sink_resolves_under_sounds_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("count_5.mp3"), b"ID3").unwrap();
    let sink = AssetCueSink::new(dir.path());

    let present = AudioCue {
        asset: "count_5.mp3".to_owned(),
    };
    assert_eq!(sink.resolve(&present), dir.path().join("count_5.mp3"));
    sink.play(&present).unwrap();

    let missing = AudioCue {
        asset: "count_6.mp3".to_owned(),
    };
    let error = sink.play(&missing).unwrap_err();
    assert!(error.message.contains("count_6.mp3"));
}
