use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::operations::attempts::AttemptRecord;

pub const DEFAULT_RATING: f64 = 1500.0;
pub const DEFAULT_DEVIATION: f64 = 350.0;
pub const DEFAULT_VOLATILITY: f64 = 0.06;

/// Per-learner skill estimate and practice counters.
///
/// Created lazily with defaults on the first attempt, never deleted.
/// `version` is bumped on every commit and guards concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRatingState {
    pub rating: f64,
    pub rating_deviation: f64,
    pub volatility: f64,
    pub total_attempted: u64,
    pub total_solved: u64,
    pub correct_count: u64,
    pub incorrect_count: u64,
    pub current_streak: u64,
    pub longest_streak: u64,
    pub average_time_per_attempt: f64,
    pub last_solved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl Default for LearnerRatingState {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            rating_deviation: DEFAULT_DEVIATION,
            volatility: DEFAULT_VOLATILITY,
            total_attempted: 0,
            total_solved: 0,
            correct_count: 0,
            incorrect_count: 0,
            current_streak: 0,
            longest_streak: 0,
            average_time_per_attempt: 0.0,
            last_solved_at: None,
            version: 0,
        }
    }
}

/// Score of one attempt in `[0, 1]`: 1 solved, 0 failed, 0.5 partial.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(f64);

impl Outcome {
    pub const SOLVED: Outcome = Outcome(1.0);
    pub const FAILED: Outcome = Outcome(0.0);
    pub const PARTIAL: Outcome = Outcome(0.5);

    /// Returns `None` for non-finite values or values outside `[0, 1]`.
    pub fn new(score: f64) -> Option<Self> {
        if score.is_finite() && (0.0..=1.0).contains(&score) {
            Some(Self(score))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_solved(self) -> bool {
        self.0 >= 1.0
    }
}

impl From<bool> for Outcome {
    fn from(success: bool) -> Self {
        if success {
            Outcome::SOLVED
        } else {
            Outcome::FAILED
        }
    }
}

/// One learner attempt as submitted by the caller.
#[derive(Debug, Clone)]
pub struct AttemptInput {
    pub puzzle_id: String,
    pub outcome: Outcome,
    /// Seconds spent on the puzzle.
    pub time_spent: f64,
    pub attempts_made: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakInfo {
    pub current: u64,
    pub longest: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub new_rating: f64,
    pub rating_change: f64,
    pub rating_deviation: f64,
    pub volatility: f64,
    pub streak_info: StreakInfo,
    pub record: AttemptRecord,
}
