//! Chooses the next puzzle for a learner.
//!
//! Calibration phase: step-table window, then the doubled window, then any
//! unattempted puzzle. Steady state: symmetric bands around the current
//! rating, narrowest first. Selection only reads; the same catalog and
//! history always yield the same puzzle.

use std::collections::HashSet;

use serde::Serialize;

use crate::rating::calibration::{calibration_window, SearchWindow};
use crate::rating::config::SelectorConfig;
use crate::rating::types::LearnerRatingState;
use crate::store::contracts::{PuzzleCatalog, RatingRange};
use crate::store::operations::attempts::AttemptRecord;
use crate::store::operations::puzzles::Puzzle;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionPhase {
    Calibration,
    SteadyState,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub puzzle: Puzzle,
    pub phase: SelectionPhase,
    /// Window the puzzle was found in; `None` for the unrestricted fallback.
    pub window: Option<RatingRange>,
}

pub fn phase_for(state: &LearnerRatingState, config: &SelectorConfig) -> SelectionPhase {
    if state.total_attempted < config.calibration_attempts {
        SelectionPhase::Calibration
    } else {
        SelectionPhase::SteadyState
    }
}

/// Next puzzle for `state`, or `None` once every search step is exhausted.
///
/// `recent` holds the latest attempts, most recent first; only the first
/// `trend_window` entries are used. `attempted` is excluded from every query.
pub fn select_next<C>(
    state: &LearnerRatingState,
    recent: &[AttemptRecord],
    attempted: &HashSet<String>,
    catalog: &C,
    config: &SelectorConfig,
) -> Result<Option<Selection>, StoreError>
where
    C: PuzzleCatalog + ?Sized,
{
    match phase_for(state, config) {
        SelectionPhase::Calibration => select_calibrating(state, recent, attempted, catalog, config),
        SelectionPhase::SteadyState => select_steady(state, attempted, catalog, config),
    }
}

fn clamp_window(window: SearchWindow, config: &SelectorConfig) -> SearchWindow {
    SearchWindow {
        target: window
            .target
            .clamp(config.min_target_rating, config.max_target_rating),
        range: window.range,
    }
}

fn select_calibrating<C>(
    state: &LearnerRatingState,
    recent: &[AttemptRecord],
    attempted: &HashSet<String>,
    catalog: &C,
    config: &SelectorConfig,
) -> Result<Option<Selection>, StoreError>
where
    C: PuzzleCatalog + ?Sized,
{
    let window_len = recent.len().min(config.trend_window);
    let window = clamp_window(
        calibration_window(state.total_attempted, &recent[..window_len]),
        config,
    );

    for multiplier in [1.0, 2.0] {
        let range = RatingRange::around(window.target, window.range * multiplier);
        tracing::debug!(
            target_rating = window.target,
            min = range.min,
            max = range.max,
            "Calibration search window"
        );
        if let Some(puzzle) = catalog.find_unattempted(attempted, range)? {
            return Ok(Some(Selection {
                puzzle,
                phase: SelectionPhase::Calibration,
                window: Some(range),
            }));
        }
    }

    Ok(catalog
        .find_any_unattempted(attempted)?
        .map(|puzzle| Selection {
            puzzle,
            phase: SelectionPhase::Calibration,
            window: None,
        }))
}

fn select_steady<C>(
    state: &LearnerRatingState,
    attempted: &HashSet<String>,
    catalog: &C,
    config: &SelectorConfig,
) -> Result<Option<Selection>, StoreError>
where
    C: PuzzleCatalog + ?Sized,
{
    for band in &config.steady_bands {
        let half_width = (state.rating * band).round();
        let range = RatingRange::around(state.rating, half_width);
        tracing::debug!(band, min = range.min, max = range.max, "Steady-state search band");
        if let Some(puzzle) = catalog.find_unattempted(attempted, range)? {
            return Ok(Some(Selection {
                puzzle,
                phase: SelectionPhase::SteadyState,
                window: Some(range),
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::rating::types::Outcome;

    /// In-memory catalog with the same tie-break as the sled store.
    struct VecCatalog(Vec<Puzzle>);

    impl VecCatalog {
        fn new(ratings: &[(&str, f64)]) -> Self {
            Self(
                ratings
                    .iter()
                    .map(|(id, rating)| Puzzle {
                        id: id.to_string(),
                        rating: *rating,
                        themes: vec![],
                        created_at: Utc::now(),
                    })
                    .collect(),
            )
        }

        fn smallest<'a>(&self, iter: impl Iterator<Item = &'a Puzzle>) -> Option<Puzzle> {
            iter.min_by(|a, b| a.id.cmp(&b.id)).cloned()
        }
    }

    impl PuzzleCatalog for VecCatalog {
        fn get_puzzle(&self, puzzle_id: &str) -> Result<Option<Puzzle>, StoreError> {
            Ok(self.0.iter().find(|p| p.id == puzzle_id).cloned())
        }

        fn find_unattempted(
            &self,
            exclude: &HashSet<String>,
            range: RatingRange,
        ) -> Result<Option<Puzzle>, StoreError> {
            Ok(self.smallest(
                self.0
                    .iter()
                    .filter(|p| !exclude.contains(&p.id) && range.contains(p.rating)),
            ))
        }

        fn find_any_unattempted(
            &self,
            exclude: &HashSet<String>,
        ) -> Result<Option<Puzzle>, StoreError> {
            Ok(self.smallest(self.0.iter().filter(|p| !exclude.contains(&p.id))))
        }
    }

    fn attempt(puzzle_id: &str, puzzle_rating: f64, solved: bool) -> AttemptRecord {
        AttemptRecord {
            id: format!("r-{puzzle_id}"),
            learner_id: "u1".to_string(),
            puzzle_id: puzzle_id.to_string(),
            sequence: 1,
            puzzle_rating,
            rating_before: 1500.0,
            rating_after: 1500.0,
            outcome: Outcome::from(solved),
            time_spent: 20.0,
            attempts_made: 1,
            created_at: Utc::now(),
        }
    }

    fn steady_state(rating: f64) -> LearnerRatingState {
        LearnerRatingState {
            rating,
            total_attempted: 25,
            ..LearnerRatingState::default()
        }
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn first_puzzle_is_near_midpoint() {
        let catalog = VecCatalog::new(&[("a", 1000.0), ("b", 1580.0), ("c", 2000.0)]);
        let selection = select_next(
            &LearnerRatingState::default(),
            &[],
            &HashSet::new(),
            &catalog,
            &SelectorConfig::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(selection.puzzle.id, "b");
        assert_eq!(selection.phase, SelectionPhase::Calibration);
    }

    #[test]
    fn calibration_widens_then_falls_back() {
        let cfg = SelectorConfig::default();
        let state = LearnerRatingState::default();

        let doubled = VecCatalog::new(&[("far", 1690.0), ("z", 900.0)]);
        let selection = select_next(&state, &[], &HashSet::new(), &doubled, &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(selection.puzzle.id, "far");
        assert_eq!(selection.window, Some(RatingRange::around(1500.0, 200.0)));

        let anywhere = VecCatalog::new(&[("z", 900.0)]);
        let selection = select_next(&state, &[], &HashSet::new(), &anywhere, &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(selection.puzzle.id, "z");
        assert!(selection.window.is_none());

        let exhausted = select_next(&state, &[], &ids(&["z"]), &anywhere, &cfg).unwrap();
        assert!(exhausted.is_none());
    }

    #[test]
    fn calibration_target_is_clamped() {
        let cfg = SelectorConfig::default();
        let state = LearnerRatingState {
            total_attempted: 3,
            ..LearnerRatingState::default()
        };
        let recent = vec![
            attempt("x1", 2300.0, true),
            attempt("x2", 2300.0, true),
            attempt("x3", 2300.0, true),
        ];
        let catalog = VecCatalog::new(&[("top", 2450.0), ("beyond", 2600.0)]);
        let selection = select_next(&state, &recent, &ids(&["x1", "x2", "x3"]), &catalog, &cfg)
            .unwrap()
            .unwrap();
        // 2300 + 300 clamps to 2400, window [2250, 2550]
        assert_eq!(selection.puzzle.id, "top");
        assert_eq!(selection.window, Some(RatingRange::around(2400.0, 150.0)));
    }

    #[test]
    fn calibration_uses_only_trend_window() {
        let cfg = SelectorConfig::default();
        let state = LearnerRatingState {
            total_attempted: 9,
            ..LearnerRatingState::default()
        };
        let mut recent = vec![attempt("f", 1600.0, false); 5];
        recent.extend(vec![attempt("s", 1600.0, true); 4]);
        let catalog = VecCatalog::new(&[("low", 1300.0), ("mid", 1450.0)]);
        let selection = select_next(&state, &recent, &HashSet::new(), &catalog, &cfg)
            .unwrap()
            .unwrap();
        // only the five failures count: 1600 - 150, range 75
        assert_eq!(selection.puzzle.id, "mid");
    }

    #[test]
    fn steady_state_prefers_narrowest_band() {
        let cfg = SelectorConfig::default();
        let catalog = VecCatalog::new(&[("a-wide", 1300.0), ("z-close", 1530.0)]);
        let selection = select_next(&steady_state(1500.0), &[], &HashSet::new(), &catalog, &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(selection.puzzle.id, "z-close");
        assert_eq!(selection.phase, SelectionPhase::SteadyState);
        assert_eq!(selection.window, Some(RatingRange::around(1500.0, 75.0)));
    }

    #[test]
    fn steady_state_expands_past_attempted_bands() {
        let cfg = SelectorConfig::default();
        let catalog = VecCatalog::new(&[
            ("p1", 1800.0),
            ("p2", 1880.0),
            ("p3", 1950.0),
            ("p4", 2000.0),
        ]);
        let selection = select_next(
            &steady_state(1800.0),
            &[],
            &ids(&["p1", "p2", "p3"]),
            &catalog,
            &cfg,
        )
        .unwrap()
        .unwrap();
        assert_eq!(selection.puzzle.id, "p4");
    }

    #[test]
    fn steady_state_stops_at_widest_band() {
        let cfg = SelectorConfig::default();
        let catalog = VecCatalog::new(&[("huge", 3100.0)]);
        let selection =
            select_next(&steady_state(1500.0), &[], &HashSet::new(), &catalog, &cfg).unwrap();
        assert!(selection.is_none());
    }

    #[test]
    fn selection_is_repeatable() {
        let cfg = SelectorConfig::default();
        let catalog = VecCatalog::new(&[("b", 1510.0), ("a", 1490.0), ("c", 1500.0)]);
        let state = steady_state(1500.0);
        let first = select_next(&state, &[], &HashSet::new(), &catalog, &cfg)
            .unwrap()
            .unwrap();
        let second = select_next(&state, &[], &HashSet::new(), &catalog, &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(first.puzzle.id, "a");
        assert_eq!(first.puzzle.id, second.puzzle.id);
    }
}
