use crate::rating::types::LearnerRatingState;
use crate::store::contracts::LearnerStore;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// Stored state, or defaults for a learner with no attempts. Never writes.
    pub fn get_learner_stats(&self, learner_id: &str) -> Result<LearnerRatingState, StoreError> {
        Ok(self.get_learner_state(learner_id)?.unwrap_or_default())
    }

    pub fn count_learners(&self) -> usize {
        self.learner_states.len()
    }
}

impl LearnerStore for Store {
    fn get_learner_state(&self, learner_id: &str) -> Result<Option<LearnerRatingState>, StoreError> {
        let key = keys::learner_state_key(learner_id)?;
        match self.learner_states.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn put_learner_state(
        &self,
        learner_id: &str,
        state: &LearnerRatingState,
    ) -> Result<(), StoreError> {
        let key = keys::learner_state_key(learner_id)?;
        self.learner_states
            .insert(key.as_bytes(), Self::serialize(state)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn stats_default_when_missing() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();

        let stats = store.get_learner_stats("u1").unwrap();
        assert_eq!(stats.rating, 1500.0);
        assert_eq!(stats.rating_deviation, 350.0);
        assert_eq!(stats.total_attempted, 0);
        assert!(store.get_learner_state("u1").unwrap().is_none());
        assert_eq!(store.count_learners(), 0);
    }

    #[test]
    fn learner_state_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();

        let state = LearnerRatingState {
            rating: 1712.0,
            total_attempted: 12,
            correct_count: 8,
            incorrect_count: 4,
            version: 12,
            ..LearnerRatingState::default()
        };
        store.put_learner_state("u1", &state).unwrap();
        assert_eq!(store.get_learner_state("u1").unwrap(), Some(state));
    }
}
