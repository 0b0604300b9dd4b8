//! Collaborator contracts the rating engine is written against.
//!
//! `Store` implements all of them on sled; tests may substitute their own.

use std::collections::HashSet;

use crate::rating::types::LearnerRatingState;
use crate::store::operations::attempts::AttemptRecord;
use crate::store::operations::puzzles::Puzzle;
use crate::store::StoreError;

/// Inclusive rating window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingRange {
    pub min: f64,
    pub max: f64,
}

impl RatingRange {
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            min: center - half_width,
            max: center + half_width,
        }
    }

    pub fn contains(&self, rating: f64) -> bool {
        rating >= self.min && rating <= self.max
    }
}

pub trait LearnerStore {
    fn get_learner_state(&self, learner_id: &str) -> Result<Option<LearnerRatingState>, StoreError>;

    fn put_learner_state(&self, learner_id: &str, state: &LearnerRatingState)
        -> Result<(), StoreError>;
}

pub trait AttemptStore {
    fn append_attempt(&self, record: &AttemptRecord) -> Result<(), StoreError>;

    /// Most recent first.
    fn recent_attempts(&self, learner_id: &str, limit: usize)
        -> Result<Vec<AttemptRecord>, StoreError>;

    fn attempted_puzzle_ids(&self, learner_id: &str) -> Result<HashSet<String>, StoreError>;
}

pub trait PuzzleCatalog {
    fn get_puzzle(&self, puzzle_id: &str) -> Result<Option<Puzzle>, StoreError>;

    /// Smallest-id puzzle inside `range` whose id is not in `exclude`.
    fn find_unattempted(
        &self,
        exclude: &HashSet<String>,
        range: RatingRange,
    ) -> Result<Option<Puzzle>, StoreError>;

    /// Smallest-id puzzle whose id is not in `exclude`, regardless of rating.
    fn find_any_unattempted(&self, exclude: &HashSet<String>)
        -> Result<Option<Puzzle>, StoreError>;
}

/// Everything the engine needs, plus an atomic commit of one attempt.
pub trait EngineStore: LearnerStore + AttemptStore + PuzzleCatalog {
    /// Persists `state` and appends `record` only if the stored learner state
    /// still carries `expected_version` (0 when no state exists yet).
    ///
    /// Fails with `StoreError::Conflict` when another writer got there first.
    fn commit_attempt(
        &self,
        learner_id: &str,
        expected_version: u64,
        state: &LearnerRatingState,
        record: &AttemptRecord,
    ) -> Result<(), StoreError>;
}
