use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::Transactional;

use crate::rating::types::{LearnerRatingState, Outcome};
use crate::store::contracts::{AttemptStore, EngineStore};
use crate::store::keys;
use crate::store::operations::map_transaction_error;
use crate::store::{Store, StoreError};

/// Immutable audit entry for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: String,
    pub learner_id: String,
    pub puzzle_id: String,
    /// 1-based position in the learner's attempt history.
    pub sequence: u64,
    pub puzzle_rating: f64,
    pub rating_before: f64,
    pub rating_after: f64,
    pub outcome: Outcome,
    pub time_spent: f64,
    pub attempts_made: u32,
    pub created_at: DateTime<Utc>,
}

/// Per learner/puzzle summary backing the attempted set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerPuzzleMark {
    pub attempts: u64,
    pub solved: bool,
}

struct AttemptPayload {
    attempt_key: String,
    record_bytes: Vec<u8>,
    mark_key: String,
    count_key: String,
    solved: bool,
}

impl AttemptPayload {
    fn new(record: &AttemptRecord) -> Result<Self, StoreError> {
        Ok(Self {
            attempt_key: keys::attempt_key(&record.learner_id, record.sequence)?,
            record_bytes: Store::serialize(record)?,
            mark_key: keys::learner_puzzle_key(&record.learner_id, &record.puzzle_id)?,
            count_key: keys::puzzle_key(&record.puzzle_id)?,
            solved: record.outcome.is_solved(),
        })
    }
}

fn abort_serialization<T>(
    result: Result<T, serde_json::Error>,
) -> ConflictableTransactionResult<T, StoreError> {
    result.map_err(|error| ConflictableTransactionError::Abort(StoreError::Serialization(error)))
}

fn write_attempt(
    tx_attempts: &TransactionalTree,
    tx_marks: &TransactionalTree,
    tx_counts: &TransactionalTree,
    payload: &AttemptPayload,
) -> ConflictableTransactionResult<(), StoreError> {
    if tx_attempts.get(payload.attempt_key.as_bytes())?.is_some() {
        return Err(ConflictableTransactionError::Abort(StoreError::Conflict {
            entity: "attempt".to_string(),
            key: payload.attempt_key.clone(),
        }));
    }
    tx_attempts.insert(payload.attempt_key.as_bytes(), payload.record_bytes.as_slice())?;

    let mut mark = match tx_marks.get(payload.mark_key.as_bytes())? {
        Some(raw) => abort_serialization(serde_json::from_slice::<LearnerPuzzleMark>(&raw))?,
        None => LearnerPuzzleMark::default(),
    };
    mark.attempts += 1;
    mark.solved |= payload.solved;
    let mark_bytes = abort_serialization(serde_json::to_vec(&mark))?;
    tx_marks.insert(payload.mark_key.as_bytes(), mark_bytes)?;

    let count = match tx_counts.get(payload.count_key.as_bytes())? {
        Some(raw) => abort_serialization(serde_json::from_slice::<u64>(&raw))?,
        None => 0,
    };
    let count_bytes = abort_serialization(serde_json::to_vec(&(count + 1)))?;
    tx_counts.insert(payload.count_key.as_bytes(), count_bytes)?;
    Ok(())
}

impl Store {
    pub fn get_learner_puzzle_mark(
        &self,
        learner_id: &str,
        puzzle_id: &str,
    ) -> Result<Option<LearnerPuzzleMark>, StoreError> {
        let key = keys::learner_puzzle_key(learner_id, puzzle_id)?;
        match self.learner_puzzles.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn has_solved_puzzle(&self, learner_id: &str, puzzle_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .get_learner_puzzle_mark(learner_id, puzzle_id)?
            .is_some_and(|mark| mark.solved))
    }
}

impl AttemptStore for Store {
    fn append_attempt(&self, record: &AttemptRecord) -> Result<(), StoreError> {
        let payload = AttemptPayload::new(record)?;
        (&self.attempts, &self.learner_puzzles, &self.puzzle_attempt_counts)
            .transaction(|(tx_attempts, tx_marks, tx_counts)| {
                write_attempt(tx_attempts, tx_marks, tx_counts, &payload)
            })
            .map_err(map_transaction_error)
    }

    fn recent_attempts(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        let prefix = keys::attempt_prefix(learner_id)?;
        let mut records = Vec::new();
        if limit == 0 {
            return Ok(records);
        }
        for item in self.attempts.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            records.push(Self::deserialize::<AttemptRecord>(&value)?);
            if records.len() >= limit {
                break;
            }
        }
        Ok(records)
    }

    fn attempted_puzzle_ids(&self, learner_id: &str) -> Result<HashSet<String>, StoreError> {
        let prefix = keys::learner_puzzle_prefix(learner_id)?;
        let mut ids = HashSet::new();
        for item in self.learner_puzzles.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let key_text = String::from_utf8_lossy(&key);
            if let Some(puzzle_id) = key_text.strip_prefix(prefix.as_str()) {
                ids.insert(puzzle_id.to_string());
            }
        }
        Ok(ids)
    }
}

impl EngineStore for Store {
    fn commit_attempt(
        &self,
        learner_id: &str,
        expected_version: u64,
        state: &LearnerRatingState,
        record: &AttemptRecord,
    ) -> Result<(), StoreError> {
        let state_key = keys::learner_state_key(learner_id)?;
        let state_bytes = Self::serialize(state)?;
        let payload = AttemptPayload::new(record)?;

        (
            &self.learner_states,
            &self.attempts,
            &self.learner_puzzles,
            &self.puzzle_attempt_counts,
        )
            .transaction(|(tx_states, tx_attempts, tx_marks, tx_counts)| {
                let stored_version = match tx_states.get(state_key.as_bytes())? {
                    Some(raw) => {
                        abort_serialization(serde_json::from_slice::<LearnerRatingState>(&raw))?
                            .version
                    }
                    None => 0,
                };
                if stored_version != expected_version {
                    return Err(ConflictableTransactionError::Abort(StoreError::Conflict {
                        entity: "learner_state".to_string(),
                        key: state_key.clone(),
                    }));
                }

                tx_states.insert(state_key.as_bytes(), state_bytes.as_slice())?;
                write_attempt(tx_attempts, tx_marks, tx_counts, &payload)
            })
            .map_err(map_transaction_error)
    }
}
