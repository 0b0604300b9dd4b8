//! Calibration ladder used while a learner has few attempts.
//!
//! A literal step table keyed by attempt count: the first puzzle is a
//! midpoint probe, the second jumps by a fixed step from the first result,
//! and later steps shift the mean recent opponent rating by a tiered amount
//! chosen from the recent solve rate.

use crate::rating::types::DEFAULT_RATING;
use crate::store::operations::attempts::AttemptRecord;

/// Target rating and half-width of the window to search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    pub target: f64,
    pub range: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendTier {
    /// Inclusive lower bound on the recent solve rate.
    pub min_success_rate: f64,
    pub adjustment: f64,
    pub range: f64,
}

const OPENING: SearchWindow = SearchWindow {
    target: DEFAULT_RATING,
    range: 100.0,
};

const FOLLOW_UP_STEP: f64 = 200.0;
const FOLLOW_UP_RANGE: f64 = 100.0;

pub const EARLY_TIERS: [TrendTier; 4] = [
    TrendTier { min_success_rate: 0.8, adjustment: 300.0, range: 150.0 },
    TrendTier { min_success_rate: 0.6, adjustment: 150.0, range: 100.0 },
    TrendTier { min_success_rate: 0.4, adjustment: 0.0, range: 100.0 },
    TrendTier { min_success_rate: 0.0, adjustment: -300.0, range: 150.0 },
];

pub const LATE_TIERS: [TrendTier; 4] = [
    TrendTier { min_success_rate: 0.7, adjustment: 100.0, range: 75.0 },
    TrendTier { min_success_rate: 0.5, adjustment: 50.0, range: 50.0 },
    TrendTier { min_success_rate: 0.3, adjustment: -50.0, range: 50.0 },
    TrendTier { min_success_rate: 0.0, adjustment: -150.0, range: 75.0 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    /// No attempts yet.
    Opening,
    /// One attempt: step away from the first puzzle.
    FollowUp,
    /// Attempts 2 to 4: large trend-driven jumps.
    EarlyTrend,
    /// Attempts 5 and later: fine trend-driven adjustments.
    LateTrend,
}

impl CalibrationStep {
    pub fn for_attempt_count(total_attempted: u64) -> Self {
        match total_attempted {
            0 => CalibrationStep::Opening,
            1 => CalibrationStep::FollowUp,
            2..=4 => CalibrationStep::EarlyTrend,
            _ => CalibrationStep::LateTrend,
        }
    }

    fn tiers(self) -> Option<&'static [TrendTier]> {
        match self {
            CalibrationStep::EarlyTrend => Some(&EARLY_TIERS),
            CalibrationStep::LateTrend => Some(&LATE_TIERS),
            CalibrationStep::Opening | CalibrationStep::FollowUp => None,
        }
    }
}

/// Solve rate and mean puzzle rating over `recent`, `None` when empty.
pub fn recent_trend(recent: &[AttemptRecord]) -> Option<(f64, f64)> {
    if recent.is_empty() {
        return None;
    }
    let n = recent.len() as f64;
    let solved = recent.iter().filter(|r| r.outcome.is_solved()).count() as f64;
    let mean_rating = recent.iter().map(|r| r.puzzle_rating).sum::<f64>() / n;
    Some((solved / n, mean_rating))
}

fn pick_tier(tiers: &'static [TrendTier], success_rate: f64) -> &'static TrendTier {
    tiers
        .iter()
        .find(|tier| success_rate >= tier.min_success_rate)
        .unwrap_or(&tiers[tiers.len() - 1])
}

/// Unclamped search window for a calibrating learner.
///
/// `recent` is the learner's latest attempts, most recent first. Missing
/// history falls back to the opening probe.
pub fn calibration_window(total_attempted: u64, recent: &[AttemptRecord]) -> SearchWindow {
    let step = CalibrationStep::for_attempt_count(total_attempted);
    match step {
        CalibrationStep::Opening => OPENING,
        CalibrationStep::FollowUp => match recent.first() {
            Some(last) => {
                let direction = if last.outcome.is_solved() { 1.0 } else { -1.0 };
                SearchWindow {
                    target: last.puzzle_rating + direction * FOLLOW_UP_STEP,
                    range: FOLLOW_UP_RANGE,
                }
            }
            None => OPENING,
        },
        CalibrationStep::EarlyTrend | CalibrationStep::LateTrend => {
            let (Some(tiers), Some((success_rate, mean_rating))) =
                (step.tiers(), recent_trend(recent))
            else {
                return OPENING;
            };
            let tier = pick_tier(tiers, success_rate);
            SearchWindow {
                target: mean_rating + tier.adjustment,
                range: tier.range,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::rating::types::Outcome;

    fn attempt(puzzle_rating: f64, solved: bool) -> AttemptRecord {
        AttemptRecord {
            id: "r".to_string(),
            learner_id: "u1".to_string(),
            puzzle_id: "p".to_string(),
            sequence: 1,
            puzzle_rating,
            rating_before: 1500.0,
            rating_after: 1500.0,
            outcome: Outcome::from(solved),
            time_spent: 10.0,
            attempts_made: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn step_table_buckets() {
        assert_eq!(CalibrationStep::for_attempt_count(0), CalibrationStep::Opening);
        assert_eq!(CalibrationStep::for_attempt_count(1), CalibrationStep::FollowUp);
        assert_eq!(CalibrationStep::for_attempt_count(2), CalibrationStep::EarlyTrend);
        assert_eq!(CalibrationStep::for_attempt_count(4), CalibrationStep::EarlyTrend);
        assert_eq!(CalibrationStep::for_attempt_count(5), CalibrationStep::LateTrend);
        assert_eq!(CalibrationStep::for_attempt_count(9), CalibrationStep::LateTrend);
    }

    #[test]
    fn opening_probe_is_midpoint() {
        assert_eq!(
            calibration_window(0, &[]),
            SearchWindow { target: 1500.0, range: 100.0 }
        );
    }

    #[test]
    fn follow_up_steps_by_first_result() {
        let up = calibration_window(1, &[attempt(1400.0, true)]);
        assert_eq!(up, SearchWindow { target: 1600.0, range: 100.0 });
        let down = calibration_window(1, &[attempt(1400.0, false)]);
        assert_eq!(down, SearchWindow { target: 1200.0, range: 100.0 });
    }

    #[test]
    fn early_trend_tiers() {
        let all_solved = vec![attempt(1500.0, true), attempt(1700.0, true)];
        assert_eq!(
            calibration_window(2, &all_solved),
            SearchWindow { target: 1900.0, range: 150.0 }
        );

        let mixed = vec![
            attempt(1500.0, true),
            attempt(1500.0, true),
            attempt(1500.0, false),
        ];
        // 2/3 solved
        assert_eq!(
            calibration_window(3, &mixed),
            SearchWindow { target: 1650.0, range: 100.0 }
        );

        let half = vec![attempt(1500.0, true), attempt(1500.0, false)];
        assert_eq!(
            calibration_window(2, &half),
            SearchWindow { target: 1500.0, range: 100.0 }
        );

        let failures = vec![attempt(1600.0, false); 4];
        assert_eq!(
            calibration_window(4, &failures),
            SearchWindow { target: 1300.0, range: 150.0 }
        );
    }

    #[test]
    fn late_trend_tiers() {
        let strong = vec![attempt(1800.0, true); 5];
        assert_eq!(
            calibration_window(7, &strong),
            SearchWindow { target: 1900.0, range: 75.0 }
        );

        let mut mostly_failed = vec![attempt(1600.0, false); 4];
        mostly_failed.push(attempt(1600.0, true));
        // 1/5 solved falls below the 0.3 threshold
        assert_eq!(
            calibration_window(9, &mostly_failed),
            SearchWindow { target: 1450.0, range: 75.0 }
        );

        let mut borderline = vec![attempt(1600.0, false); 7];
        borderline.extend(vec![attempt(1600.0, true); 3]);
        assert_eq!(
            calibration_window(9, &borderline),
            SearchWindow { target: 1550.0, range: 50.0 }
        );
    }

    #[test]
    fn partial_outcomes_do_not_count_as_solved() {
        let mut partial = attempt(1500.0, false);
        partial.outcome = Outcome::PARTIAL;
        let window = calibration_window(1, &[partial]);
        assert_eq!(window.target, 1300.0);
    }

    #[test]
    fn missing_history_falls_back_to_opening() {
        assert_eq!(calibration_window(1, &[]), OPENING);
        assert_eq!(calibration_window(6, &[]), OPENING);
    }
}
