pub mod contracts;
pub mod keys;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

pub use contracts::{AttemptStore, EngineStore, LearnerStore, PuzzleCatalog, RatingRange};

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub puzzles: sled::Tree,
    pub puzzles_by_rating: sled::Tree,
    pub puzzle_attempt_counts: sled::Tree,
    pub learner_states: sled::Tree,
    pub attempts: sled::Tree,
    pub learner_puzzles: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("CAS retry exhausted after {attempts} attempts: entity={entity}, key={key}")]
    CasRetryExhausted {
        entity: String,
        key: String,
        attempts: u32,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let puzzles = db.open_tree(trees::PUZZLES)?;
        let puzzles_by_rating = db.open_tree(trees::PUZZLES_BY_RATING)?;
        let puzzle_attempt_counts = db.open_tree(trees::PUZZLE_ATTEMPT_COUNTS)?;
        let learner_states = db.open_tree(trees::LEARNER_STATES)?;
        let attempts = db.open_tree(trees::ATTEMPTS)?;
        let learner_puzzles = db.open_tree(trees::LEARNER_PUZZLES)?;

        Ok(Self {
            db,
            puzzles,
            puzzles_by_rating,
            puzzle_attempt_counts,
            learner_states,
            attempts,
            learner_puzzles,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
