// ABOUTME: Session data models shared by the streaming client and its collaborators
// ABOUTME: Defines analysis modes, rep counters, feedback events, and workout records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Session data models
//!
//! The serialized shapes of [`RepCounters`] and [`WorkoutRecord`] match the
//! blobs already persisted by earlier clients, so existing local stores load
//! without migration.

use crate::constants::{protocol, storage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Strictness profile of the backend's form-analysis algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Lenient thresholds
    #[default]
    Beginner,
    /// Strict thresholds
    Pro,
}

impl Mode {
    /// Control string that selects this mode on the backend
    #[must_use]
    pub const fn control_message(self) -> &'static str {
        match self {
            Self::Beginner => protocol::MODE_BEGINNER,
            Self::Pro => protocol::MODE_PRO,
        }
    }

    /// Wire name used in `mode_changed` acknowledgements
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Pro => "pro",
        }
    }

    /// Parse from the wire name, `None` for anything else
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "pro" => Some(Self::Pro),
            _ => None,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-authoritative squat counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepCounters {
    /// Reps performed with correct form
    pub correct: u32,
    /// Reps flagged as incorrect
    pub incorrect: u32,
}

impl RepCounters {
    /// Create counters from explicit values
    #[must_use]
    pub const fn new(correct: u32, incorrect: u32) -> Self {
        Self { correct, incorrect }
    }

    /// Counters with `other` added, saturating at the bounds
    #[must_use]
    pub const fn combined(self, other: Self) -> Self {
        Self::new(
            self.correct.saturating_add(other.correct),
            self.incorrect.saturating_add(other.incorrect),
        )
    }

    /// Total reps observed
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.correct.saturating_add(self.incorrect)
    }

    /// Share of correct reps as a whole percentage, `None` before the first rep
    #[must_use]
    pub fn form_score(&self) -> Option<u8> {
        let total = u64::from(self.total());
        if total == 0 {
            return None;
        }
        let score = (u64::from(self.correct) * 100 / total).min(100);
        u8::try_from(score).ok()
    }
}

/// A feedback code emitted by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    /// Running count of correct reps
    RepCount(u32),
    /// Counters were reset after a period of inactivity
    ResetDueToInactivity,
    /// The last rep had incorrect form
    IncorrectForm,
    /// A code this client does not know
    Unrecognized(String),
}

impl FeedbackEvent {
    /// Classify a raw feedback string; empty values and the `"null"` literal yield `None`
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim();
        if code.is_empty() || code == protocol::FEEDBACK_NULL {
            return None;
        }
        let event = match code {
            protocol::FEEDBACK_RESET_COUNTERS => Self::ResetDueToInactivity,
            protocol::FEEDBACK_INCORRECT => Self::IncorrectForm,
            digits if digits.bytes().all(|b| b.is_ascii_digit()) => digits
                .parse()
                .map_or_else(|_| Self::Unrecognized(code.to_owned()), Self::RepCount),
            other => Self::Unrecognized(other.to_owned()),
        };
        Some(event)
    }
}

/// Immutable summary of one completed streaming session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    /// Calendar day the session ended (UTC)
    pub date: NaiveDate,
    /// Correct reps at stop time
    pub correct: u32,
    /// Incorrect reps at stop time
    pub incorrect: u32,
    /// Session length in whole seconds
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    /// Mode active when the session ended
    pub mode: Mode,
    /// Whether the record came from an uploaded video rather than a live session
    #[serde(rename = "isVideo", default, skip_serializing_if = "is_false")]
    pub is_video: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl WorkoutRecord {
    /// Build the record for a session that ended at `ended_at` after `elapsed_ms`
    #[must_use]
    pub fn from_session(
        counters: RepCounters,
        mode: Mode,
        ended_at: DateTime<Utc>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            date: ended_at.date_naive(),
            correct: counters.correct,
            incorrect: counters.incorrect,
            duration_seconds: (elapsed_ms + 500) / 1_000,
            mode,
            is_video: false,
        }
    }

    /// Counters captured in this record
    #[must_use]
    pub const fn counters(&self) -> RepCounters {
        RepCounters::new(self.correct, self.incorrect)
    }
}

/// Bounded, newest-first workout history
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkoutHistory {
    records: VecDeque<WorkoutRecord>,
}

impl WorkoutHistory {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from stored records, trimming to the cap
    #[must_use]
    pub fn from_records(records: Vec<WorkoutRecord>) -> Self {
        let mut records: VecDeque<_> = records.into();
        records.truncate(storage::HISTORY_CAP);
        Self { records }
    }

    /// Add a record at the front, evicting the oldest beyond the cap
    pub fn push(&mut self, record: WorkoutRecord) {
        self.records.push_front(record);
        self.records.truncate(storage::HISTORY_CAP);
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of records held
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent record
    #[must_use]
    pub fn latest(&self) -> Option<&WorkoutRecord> {
        self.records.front()
    }

    /// Iterate newest first
    pub fn iter(&self) -> impl Iterator<Item = &WorkoutRecord> {
        self.records.iter()
    }
}
