use std::sync::Arc;

use chrono::Utc;

use crate::constants::MAX_CAS_RETRIES;
use crate::rating::config::EngineConfig;
use crate::rating::error::EngineError;
use crate::rating::selector::{self, Selection};
use crate::rating::types::{AttemptInput, AttemptResult, LearnerRatingState, StreakInfo};
use crate::rating::updater;
use crate::store::operations::attempts::AttemptRecord;
use crate::store::{EngineStore, Store, StoreError};

/// Stateless facade over the updater and the selector.
///
/// Learner state lives in the store. Concurrent `record_attempt` calls for
/// the same learner are serialized by the store's versioned commit: the
/// loser re-reads and recomputes. A recommendation racing an attempt may
/// offer the puzzle that attempt is about to record; that is accepted.
pub struct PuzzleEngine<S = Store> {
    config: EngineConfig,
    store: Arc<S>,
}

impl<S: EngineStore> PuzzleEngine<S> {
    pub fn new(config: EngineConfig, store: Arc<S>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn initial_state(&self) -> LearnerRatingState {
        LearnerRatingState {
            rating: self.config.glicko.default_rating,
            rating_deviation: self.config.glicko.default_deviation,
            volatility: self.config.glicko.default_volatility,
            ..LearnerRatingState::default()
        }
    }

    fn load_or_init_state(&self, learner_id: &str) -> Result<LearnerRatingState, EngineError> {
        Ok(self
            .store
            .get_learner_state(learner_id)?
            .unwrap_or_else(|| self.initial_state()))
    }

    /// Rates one attempt and persists the new state with its audit record.
    pub fn record_attempt(
        &self,
        learner_id: &str,
        input: AttemptInput,
    ) -> Result<AttemptResult, EngineError> {
        let puzzle = self
            .store
            .get_puzzle(&input.puzzle_id)?
            .ok_or_else(|| EngineError::PuzzleNotFound(input.puzzle_id.clone()))?;

        for attempt in 1..=MAX_CAS_RETRIES {
            let state = self.load_or_init_state(learner_id)?;
            let (next, record) = updater::apply_attempt(
                learner_id,
                &state,
                puzzle.rating,
                &input,
                Utc::now(),
                &self.config.glicko,
            )
            .inspect_err(|e| {
                if matches!(e, EngineError::RatingComputation(_)) {
                    tracing::error!(learner_id, puzzle_id = %puzzle.id, error = %e, "Rating update failed");
                }
            })?;

            match self
                .store
                .commit_attempt(learner_id, state.version, &next, &record)
            {
                Ok(()) => {
                    tracing::info!(
                        learner_id,
                        puzzle_id = %puzzle.id,
                        outcome = input.outcome.value(),
                        rating_before = record.rating_before,
                        rating_after = record.rating_after,
                        deviation = next.rating_deviation,
                        "Attempt recorded"
                    );
                    return Ok(AttemptResult {
                        new_rating: next.rating,
                        rating_change: record.rating_after - record.rating_before,
                        rating_deviation: next.rating_deviation,
                        volatility: next.volatility,
                        streak_info: StreakInfo {
                            current: next.current_streak,
                            longest: next.longest_streak,
                        },
                        record,
                    });
                }
                Err(StoreError::Conflict { .. }) => {
                    tracing::warn!(learner_id, attempt, "Learner state changed concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: "learner_state".to_string(),
            key: learner_id.to_string(),
            attempts: MAX_CAS_RETRIES,
        }
        .into())
    }

    /// Next puzzle for the learner. Reads only.
    pub fn recommend_next(&self, learner_id: &str) -> Result<Selection, EngineError> {
        let state = self.load_or_init_state(learner_id)?;
        let recent = if selector::phase_for(&state, &self.config.selector)
            == selector::SelectionPhase::Calibration
        {
            self.store
                .recent_attempts(learner_id, self.config.selector.trend_window)?
        } else {
            Vec::new()
        };
        let attempted = self.store.attempted_puzzle_ids(learner_id)?;

        match selector::select_next(
            &state,
            &recent,
            &attempted,
            self.store.as_ref(),
            &self.config.selector,
        )? {
            Some(selection) => {
                tracing::debug!(
                    learner_id,
                    puzzle_id = %selection.puzzle.id,
                    phase = ?selection.phase,
                    "Puzzle recommended"
                );
                Ok(selection)
            }
            None => {
                tracing::warn!(
                    learner_id,
                    attempted = attempted.len(),
                    rating = state.rating,
                    "No puzzle available"
                );
                Err(EngineError::NoPuzzleAvailable {
                    learner_id: learner_id.to_string(),
                })
            }
        }
    }

    /// Current state, or the initial state for an unseen learner.
    pub fn learner_stats(&self, learner_id: &str) -> Result<LearnerRatingState, EngineError> {
        self.load_or_init_state(learner_id)
    }

    pub fn attempt_history(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> Result<Vec<AttemptRecord>, EngineError> {
        Ok(self.store.recent_attempts(learner_id, limit)?)
    }
}
