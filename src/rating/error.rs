use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Convergence failure or a corrupt learner state. Nothing is persisted.
    #[error("rating computation failed: {0}")]
    RatingComputation(String),
    #[error("no puzzle available for learner {learner_id}")]
    NoPuzzleAvailable { learner_id: String },
    #[error("puzzle not found: {0}")]
    PuzzleNotFound(String),
    #[error("invalid attempt: {0}")]
    InvalidAttempt(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
