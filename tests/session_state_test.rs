// ABOUTME: Integration tests for the session reducer: counters, commit threshold, and reset
// ABOUTME: Drives SessionState with explicit timestamps so durations are exact
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use squat_coach::feedback::{CueTone, FeedbackPresenter};
use squat_coach::link::ServerMessage;
use squat_coach::models::{FeedbackEvent, Mode, RepCounters, WorkoutHistory, WorkoutRecord};
use squat_coach::session::{Phase, SessionEffect, SessionEvent, SessionState};
use std::sync::Arc;
use std::time::Duration;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap()
}

fn after_ms(ms: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::milliseconds(ms)
}

fn streaming_session(mode: Mode) -> SessionState {
    let mut session = SessionState::new(mode, Duration::from_secs(5));
    session.apply(SessionEvent::StartRequested).unwrap();
    session
        .apply(SessionEvent::CaptureStarted { at: t0() })
        .unwrap();
    session.apply(SessionEvent::LinkOpened).unwrap();
    session
}

fn server(raw: &str) -> SessionEvent {
    SessionEvent::Server(ServerMessage::parse(raw).unwrap())
}

fn committed(effects: &[SessionEffect]) -> Vec<WorkoutRecord> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::WorkoutCommitted(record) => Some(record.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Counters follow the last counter message
// ============================================================================

#[test]
fn test_counters_equal_last_counter_message() {
    common::init_test_logging();
    let mut session = streaming_session(Mode::Beginner);

    let sequence = [
        r#"{"squats_correct":1,"squats_incorrect":0}"#,
        r#"{"feedback":"1"}"#,
        r#"{"image":"data:image/jpeg;base64,AAAA"}"#,
        r#"{"squats_correct":2,"squats_incorrect":1}"#,
        r#"{"feedback":"incorrect"}"#,
        r#"{"squats_correct":2,"squats_incorrect":1,"feedback":"2"}"#,
        r#"{"image":"data:image/jpeg;base64,BBBB","feedback":null}"#,
        r#"{"squats_correct":5,"squats_incorrect":3}"#,
        r#"{"feedback":"reset_counters"}"#,
        r#"{"status":"ok"}"#,
    ];
    for raw in sequence {
        session.apply(server(raw)).unwrap();
    }

    assert_eq!(session.counters(), RepCounters::new(5, 3));
    assert_eq!(session.frames_received(), sequence.len() as u64);
}

#[test]
fn test_counters_lower_than_before_are_accepted() {
    let mut session = streaming_session(Mode::Pro);
    session
        .apply(server(r#"{"squats_correct":9,"squats_incorrect":4}"#))
        .unwrap();
    session
        .apply(server(r#"{"squats_correct":0,"squats_incorrect":0}"#))
        .unwrap();
    assert_eq!(session.counters(), RepCounters::default());
}

#[test]
fn test_repeated_counters_emit_no_change() {
    let mut session = streaming_session(Mode::Beginner);
    let first = session
        .apply(server(r#"{"squats_correct":3,"squats_incorrect":1}"#))
        .unwrap();
    assert_eq!(
        first,
        vec![SessionEffect::CountersChanged(RepCounters::new(3, 1))]
    );

    let repeat = session
        .apply(server(r#"{"squats_correct":3,"squats_incorrect":1}"#))
        .unwrap();
    assert!(repeat.is_empty());
}

#[test]
fn test_annotated_image_replaces_previous() {
    let mut session = streaming_session(Mode::Beginner);
    session
        .apply(server(r#"{"image":"data:image/jpeg;base64,AAAA"}"#))
        .unwrap();
    session
        .apply(server(r#"{"image":"data:image/jpeg;base64,BBBB"}"#))
        .unwrap();
    session.apply(server(r#"{"image":""}"#)).unwrap();

    assert_eq!(
        session.processed_image(),
        Some(Arc::from("data:image/jpeg;base64,BBBB"))
    );
}

// ============================================================================
// Commit threshold
// ============================================================================

#[test]
fn test_short_sessions_never_commit() {
    for elapsed_ms in [0, 1_000, 4_999, 5_000] {
        let mut session = streaming_session(Mode::Beginner);
        session
            .apply(server(r#"{"squats_correct":2,"squats_incorrect":0}"#))
            .unwrap();

        let effects = session
            .apply(SessionEvent::StopRequested {
                at: after_ms(elapsed_ms),
            })
            .unwrap();

        assert!(committed(&effects).is_empty(), "committed at {elapsed_ms}ms");
        assert!(effects.contains(&SessionEffect::ReleaseCapture));
        assert!(session.history().is_empty());
        assert_eq!(session.phase(), Phase::Idle);
    }
}

#[test]
fn test_long_sessions_commit_exactly_once() {
    for elapsed_ms in [5_001, 6_000, 10_000, 95_400] {
        let mut session = streaming_session(Mode::Pro);
        session
            .apply(server(r#"{"squats_correct":7,"squats_incorrect":2}"#))
            .unwrap();

        let effects = session
            .apply(SessionEvent::StopRequested {
                at: after_ms(elapsed_ms),
            })
            .unwrap();
        let records = committed(&effects);

        assert_eq!(records.len(), 1, "at {elapsed_ms}ms");
        let record = &records[0];
        assert_eq!((record.correct, record.incorrect), (7, 2));
        assert_eq!(record.mode, Mode::Pro);
        let expected_secs = elapsed_ms as f64 / 1_000.0;
        assert!((record.duration_seconds as f64 - expected_secs).abs() <= 1.0);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().latest(), Some(record));

        let again = session
            .apply(SessionEvent::StopRequested {
                at: after_ms(elapsed_ms + 1_000),
            })
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(session.history().len(), 1);
    }
}

#[test]
fn test_connection_loss_ends_the_session() {
    let mut session = streaming_session(Mode::Beginner);
    session
        .apply(server(r#"{"squats_correct":4,"squats_incorrect":0}"#))
        .unwrap();

    let effects = session
        .apply(SessionEvent::LinkClosed { at: after_ms(8_000) })
        .unwrap();

    assert!(effects.contains(&SessionEffect::ReleaseCapture));
    assert_eq!(committed(&effects).len(), 1);
    assert!(!session.is_streaming());
    assert!(!session.is_connected());
}

#[test]
fn test_link_close_while_idle_only_clears_connection() {
    let mut session = SessionState::new(Mode::Beginner, Duration::from_secs(5));
    session.apply(SessionEvent::LinkOpened).unwrap();
    let effects = session
        .apply(SessionEvent::LinkClosed { at: t0() })
        .unwrap();
    assert!(effects.is_empty());
    assert!(!session.is_connected());
}

#[test]
fn test_failed_connect_attempt_keeps_the_session_running() {
    let mut session = SessionState::new(Mode::Beginner, Duration::from_secs(5));
    session.apply(SessionEvent::StartRequested).unwrap();
    session
        .apply(SessionEvent::CaptureStarted { at: t0() })
        .unwrap();

    for _ in 0..3 {
        let effects = session.apply(SessionEvent::ConnectFailed).unwrap();
        assert!(effects.is_empty(), "a failed attempt releases nothing");
    }
    assert!(session.is_streaming());
    assert!(!session.is_connected());

    session.apply(SessionEvent::LinkOpened).unwrap();
    assert!(session.is_connected());
    assert_eq!(session.started_at(), Some(t0()));
}

#[test]
fn test_history_keeps_seven_newest() {
    let mut session = SessionState::new(Mode::Beginner, Duration::from_secs(5));
    for day in 0..9_i64 {
        let start = t0() + ChronoDuration::days(day);
        session.apply(SessionEvent::StartRequested).unwrap();
        session
            .apply(SessionEvent::CaptureStarted { at: start })
            .unwrap();
        session
            .apply(SessionEvent::Server(ServerMessage {
                squats_correct: Some(u32::try_from(day).unwrap()),
                squats_incorrect: Some(0),
                ..ServerMessage::default()
            }))
            .unwrap();
        session
            .apply(SessionEvent::StopRequested {
                at: start + ChronoDuration::seconds(30),
            })
            .unwrap();
    }

    let kept: Vec<u32> = session.history().iter().map(|r| r.correct).collect();
    assert_eq!(kept, vec![8, 7, 6, 5, 4, 3, 2]);
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn test_reset_clears_everything() {
    let records = (0..5)
        .map(|i| WorkoutRecord {
            date: t0().date_naive(),
            correct: i,
            incorrect: 1,
            duration_seconds: 40,
            mode: Mode::Beginner,
            is_video: false,
        })
        .collect();
    let mut session = SessionState::new(Mode::Beginner, Duration::from_secs(5));
    session.restore(RepCounters::new(12, 4), WorkoutHistory::from_records(records));

    let pending = session.request_reset();
    assert_eq!(pending.counters, RepCounters::new(12, 4));
    assert_eq!(pending.workouts, 5);
    assert_eq!(session.counters(), RepCounters::new(12, 4), "request alone clears nothing");

    let effects = session.confirm_reset(pending);
    assert_eq!(session.counters(), RepCounters::default());
    assert!(session.history().is_empty());
    assert_eq!(
        effects,
        vec![
            SessionEffect::CountersChanged(RepCounters::default()),
            SessionEffect::HistoryChanged,
        ]
    );
}

#[test]
fn test_reset_from_empty_state() {
    let mut session = streaming_session(Mode::Pro);
    let pending = session.request_reset();
    let _ = session.confirm_reset(pending);
    assert_eq!(session.counters(), RepCounters::default());
    assert!(session.history().is_empty());
    assert!(session.is_streaming(), "reset does not stop streaming");
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_counted_session_is_recorded() {
    common::init_test_logging();
    let mut session = streaming_session(Mode::Beginner);

    session
        .apply(server(r#"{"squats_correct":3,"squats_incorrect":1}"#))
        .unwrap();
    let effects = session.apply(server(r#"{"feedback":"3"}"#)).unwrap();
    assert_eq!(
        effects,
        vec![SessionEffect::Present(FeedbackEvent::RepCount(3))]
    );

    let effects = session
        .apply(SessionEvent::StopRequested {
            at: after_ms(10_000),
        })
        .unwrap();

    assert_eq!(session.counters(), RepCounters::new(3, 1));
    let records = committed(&effects);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].correct, 3);
    assert_eq!(records[0].incorrect, 1);
    assert_eq!(records[0].duration_seconds, 10);
    assert_eq!(records[0].date, t0().date_naive());
}

#[test]
fn test_incorrect_feedback_presents_warning_only() {
    let mut session = streaming_session(Mode::Beginner);
    session
        .apply(server(r#"{"squats_correct":2,"squats_incorrect":0}"#))
        .unwrap();

    let effects = session
        .apply(server(r#"{"feedback":"incorrect"}"#))
        .unwrap();

    assert_eq!(
        effects,
        vec![SessionEffect::Present(FeedbackEvent::IncorrectForm)]
    );
    assert_eq!(session.counters(), RepCounters::new(2, 0));

    let cue = FeedbackPresenter::cue_for(&FeedbackEvent::IncorrectForm).unwrap();
    assert_eq!(cue.visual.tone, CueTone::Warning);
    assert_eq!(cue.visual.message, "Improper form detected");
    assert_eq!(cue.audio.asset, "incorrect.mp3");
}
