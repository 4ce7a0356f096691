// ABOUTME: Workout statistics derived from counters and history: form score and seven-day activity
// ABOUTME: Pure functions over the session models, used by the CLI history view
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::models::{RepCounters, WorkoutHistory, WorkoutRecord};
use chrono::{Days, NaiveDate};

/// Number of days covered by the activity view
pub const ACTIVITY_WINDOW_DAYS: u64 = 7;

/// One day of the activity view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayActivity {
    /// Calendar day
    pub date: NaiveDate,
    /// Most recent workout recorded that day
    pub workout: Option<WorkoutRecord>,
}

impl DayActivity {
    /// Whether a workout was recorded that day
    #[must_use]
    pub const fn has_workout(&self) -> bool {
        self.workout.is_some()
    }

    /// Correct reps of that day's workout, zero when there was none
    #[must_use]
    pub fn correct(&self) -> u32 {
        self.workout.as_ref().map_or(0, |w| w.correct)
    }
}

/// Everything the statistics view shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutSummary {
    /// Current counters
    pub counters: RepCounters,
    /// Share of correct reps, `None` before the first rep
    pub form_score: Option<u8>,
    /// Oldest day first, ending today
    pub last_seven_days: Vec<DayActivity>,
    /// Total reps across the stored history
    pub history_reps: u32,
}

/// Activity for the seven days ending `today`, oldest first
#[must_use]
pub fn weekly_activity(history: &WorkoutHistory, today: NaiveDate) -> Vec<DayActivity> {
    (0..ACTIVITY_WINDOW_DAYS)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .map(|date| DayActivity {
            date,
            workout: history.iter().find(|record| record.date == date).cloned(),
        })
        .collect()
}

/// Build the statistics view
#[must_use]
pub fn summarize(counters: RepCounters, history: &WorkoutHistory, today: NaiveDate) -> WorkoutSummary {
    WorkoutSummary {
        counters,
        form_score: counters.form_score(),
        last_seven_days: weekly_activity(history, today),
        history_reps: history
            .iter()
            .fold(0_u32, |acc, record| acc.saturating_add(record.counters().total())),
    }
}
