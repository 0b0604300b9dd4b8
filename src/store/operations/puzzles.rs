use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::ConflictableTransactionError;
use sled::Transactional;

use crate::store::contracts::{PuzzleCatalog, RatingRange};
use crate::store::keys;
use crate::store::operations::map_transaction_error;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: String,
    pub rating: f64,
    #[serde(default)]
    pub themes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Catalog query: inclusive rating bounds and an optional theme, matched as a
/// case-insensitive substring of any of the puzzle's themes.
#[derive(Debug, Clone)]
pub struct PuzzleFilter {
    pub min_rating: f64,
    pub max_rating: f64,
    pub theme: Option<String>,
}

impl Default for PuzzleFilter {
    fn default() -> Self {
        Self {
            min_rating: 0.0,
            max_rating: f64::MAX,
            theme: None,
        }
    }
}

impl PuzzleFilter {
    fn matches_theme(&self, puzzle: &Puzzle) -> bool {
        let Some(needle) = self.theme.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        puzzle
            .themes
            .iter()
            .any(|theme| theme.to_lowercase().contains(&needle))
    }
}

fn validate_puzzle(puzzle: &Puzzle) -> Result<(), StoreError> {
    if !(puzzle.rating.is_finite() && puzzle.rating > 0.0) {
        return Err(StoreError::Validation(format!(
            "puzzle rating must be finite and positive, got {}",
            puzzle.rating
        )));
    }
    Ok(())
}

impl Store {
    /// Inserts a new puzzle; fails with `Conflict` if the id is taken.
    pub fn create_puzzle(&self, puzzle: &Puzzle) -> Result<(), StoreError> {
        validate_puzzle(puzzle)?;
        let key = keys::puzzle_key(&puzzle.id)?;
        let index_key = keys::puzzle_rating_index_key(puzzle.rating, &puzzle.id)?;
        let bytes = Self::serialize(puzzle)?;

        (&self.puzzles, &self.puzzles_by_rating)
            .transaction(|(tx_puzzles, tx_index)| {
                if tx_puzzles.get(key.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(StoreError::Conflict {
                        entity: "puzzle".to_string(),
                        key: key.clone(),
                    }));
                }
                tx_puzzles.insert(key.as_bytes(), bytes.as_slice())?;
                tx_index.insert(index_key.as_bytes(), &[])?;
                Ok(())
            })
            .map_err(map_transaction_error)
    }

    /// Inserts or replaces a puzzle, moving its rating index entry.
    pub fn upsert_puzzle(&self, puzzle: &Puzzle) -> Result<(), StoreError> {
        validate_puzzle(puzzle)?;
        let key = keys::puzzle_key(&puzzle.id)?;
        let index_key = keys::puzzle_rating_index_key(puzzle.rating, &puzzle.id)?;
        let bytes = Self::serialize(puzzle)?;

        (&self.puzzles, &self.puzzles_by_rating)
            .transaction(|(tx_puzzles, tx_index)| {
                if let Some(old_raw) = tx_puzzles.insert(key.as_bytes(), bytes.as_slice())? {
                    let old: Puzzle = serde_json::from_slice(&old_raw).map_err(|error| {
                        ConflictableTransactionError::Abort(StoreError::Serialization(error))
                    })?;
                    let old_index_key = keys::puzzle_rating_index_key(old.rating, &old.id)
                        .map_err(ConflictableTransactionError::Abort)?;
                    tx_index.remove(old_index_key.as_bytes())?;
                }
                tx_index.insert(index_key.as_bytes(), &[])?;
                Ok(())
            })
            .map_err(map_transaction_error)
    }

    /// Removes a puzzle and its rating index entry. Recorded attempts stay in
    /// learner history.
    pub fn remove_puzzle(&self, puzzle_id: &str) -> Result<Puzzle, StoreError> {
        let key = keys::puzzle_key(puzzle_id)?;

        (&self.puzzles, &self.puzzles_by_rating, &self.puzzle_attempt_counts)
            .transaction(|(tx_puzzles, tx_index, tx_counts)| {
                let Some(raw) = tx_puzzles.remove(key.as_bytes())? else {
                    return Err(ConflictableTransactionError::Abort(StoreError::NotFound {
                        entity: "puzzle".to_string(),
                        key: key.clone(),
                    }));
                };
                let old: Puzzle = serde_json::from_slice(&raw).map_err(|error| {
                    ConflictableTransactionError::Abort(StoreError::Serialization(error))
                })?;
                let index_key = keys::puzzle_rating_index_key(old.rating, &old.id)
                    .map_err(ConflictableTransactionError::Abort)?;
                tx_index.remove(index_key.as_bytes())?;
                tx_counts.remove(key.as_bytes())?;
                Ok(old)
            })
            .map_err(map_transaction_error)
    }

    /// One page of puzzles matching `filter`, ordered by rating then id, plus
    /// the total number of matches.
    pub fn list_puzzles(
        &self,
        filter: &PuzzleFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Puzzle>, u64), StoreError> {
        let mut puzzles = Vec::new();
        let mut total = 0u64;
        if !(filter.min_rating <= filter.max_rating) {
            return Ok((puzzles, total));
        }
        let (start, end) = keys::puzzle_rating_index_bounds(filter.min_rating, filter.max_rating);
        for item in self.puzzles_by_rating.range(start.as_bytes()..end.as_bytes()) {
            let (index_key, _) = item?;
            let Some(puzzle_id) = index_puzzle_id(&index_key) else {
                continue;
            };
            let Some(puzzle) = self.get_puzzle(&puzzle_id)? else {
                continue;
            };
            if !filter.matches_theme(&puzzle) {
                continue;
            }
            if total >= offset as u64 && puzzles.len() < limit {
                puzzles.push(puzzle);
            }
            total += 1;
        }
        Ok((puzzles, total))
    }

    pub fn count_puzzles(&self) -> usize {
        self.puzzles.len()
    }

    /// Number of attempts recorded against a puzzle by any learner.
    pub fn count_puzzle_attempts(&self, puzzle_id: &str) -> Result<u64, StoreError> {
        let key = keys::puzzle_key(puzzle_id)?;
        match self.puzzle_attempt_counts.get(key.as_bytes())? {
            Some(raw) => Ok(Self::deserialize(&raw)?),
            None => Ok(0),
        }
    }
}

fn index_puzzle_id(index_key: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(index_key).ok()?;
    match text.split_once(':') {
        Some((_, id)) => Some(id.to_string()),
        None => {
            tracing::warn!(key = %text, "Malformed puzzle rating index key");
            None
        }
    }
}

impl PuzzleCatalog for Store {
    fn get_puzzle(&self, puzzle_id: &str) -> Result<Option<Puzzle>, StoreError> {
        let key = keys::puzzle_key(puzzle_id)?;
        match self.puzzles.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn find_unattempted(
        &self,
        exclude: &HashSet<String>,
        range: RatingRange,
    ) -> Result<Option<Puzzle>, StoreError> {
        if !(range.min <= range.max) {
            return Ok(None);
        }
        let (start, end) = keys::puzzle_rating_index_bounds(range.min, range.max);
        let mut best: Option<String> = None;
        for item in self.puzzles_by_rating.range(start.as_bytes()..end.as_bytes()) {
            let (index_key, _) = item?;
            let Some(puzzle_id) = index_puzzle_id(&index_key) else {
                continue;
            };
            if exclude.contains(&puzzle_id) {
                continue;
            }
            if best.as_ref().map_or(true, |current| puzzle_id < *current) {
                best = Some(puzzle_id);
            }
        }

        match best {
            Some(puzzle_id) => self.get_puzzle(&puzzle_id),
            None => Ok(None),
        }
    }

    fn find_any_unattempted(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<Puzzle>, StoreError> {
        for item in self.puzzles.iter() {
            let (key, value) = item?;
            let puzzle_id = String::from_utf8_lossy(&key).into_owned();
            if exclude.contains(&puzzle_id) {
                continue;
            }
            return Ok(Some(Self::deserialize(&value)?));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn puzzle(id: &str, rating: f64) -> Puzzle {
        Puzzle {
            id: id.to_string(),
            rating,
            themes: vec!["fork".to_string()],
            created_at: Utc::now(),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> Store {
        Store::open(dir.path().join("db").to_str().unwrap()).unwrap()
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_puzzle(&puzzle("p1", 1500.0)).unwrap();
        let err = store.create_puzzle(&puzzle("p1", 1600.0)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn create_rejects_non_positive_rating() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let err = store.create_puzzle(&puzzle("p1", 0.0)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn upsert_moves_rating_index() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.upsert_puzzle(&puzzle("p1", 1200.0)).unwrap();
        store.upsert_puzzle(&puzzle("p1", 1900.0)).unwrap();

        let low = PuzzleFilter {
            min_rating: 1100.0,
            max_rating: 1300.0,
            theme: None,
        };
        assert_eq!(store.list_puzzles(&low, 0, 10).unwrap().1, 0);
        let high = PuzzleFilter {
            min_rating: 1800.0,
            max_rating: 2000.0,
            theme: None,
        };
        let (found, total) = store.list_puzzles(&high, 0, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].rating, 1900.0);
        assert_eq!(store.puzzles_by_rating.len(), 1);
    }

    #[test]
    fn remove_drops_puzzle_and_index_entry() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_puzzle(&puzzle("p1", 1500.0)).unwrap();
        store.create_puzzle(&puzzle("p2", 1500.0)).unwrap();

        let removed = store.remove_puzzle("p1").unwrap();
        assert_eq!(removed.id, "p1");
        assert!(store.get_puzzle("p1").unwrap().is_none());
        assert_eq!(store.puzzles_by_rating.len(), 1);
        let found = store
            .find_unattempted(&HashSet::new(), RatingRange::around(1500.0, 100.0))
            .unwrap();
        assert_eq!(found.unwrap().id, "p2");

        let err = store.remove_puzzle("p1").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn list_filters_theme_case_insensitively_and_pages() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        for (idx, themes) in [
            vec!["Fork", "middlegame"],
            vec!["pin"],
            vec!["discoveredAttack", "FORKING"],
            vec!["endgame", "fork"],
        ]
        .into_iter()
        .enumerate()
        {
            store
                .create_puzzle(&Puzzle {
                    themes: themes.into_iter().map(String::from).collect(),
                    ..puzzle(&format!("p{idx}"), 1000.0 + idx as f64 * 100.0)
                })
                .unwrap();
        }

        let forks = PuzzleFilter {
            theme: Some("fOrK".to_string()),
            ..PuzzleFilter::default()
        };
        let (page, total) = store.list_puzzles(&forks, 0, 2).unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = page.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p0", "p2"]);

        let (page, total) = store.list_puzzles(&forks, 2, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "p3");

        let blank = PuzzleFilter {
            theme: Some("  ".to_string()),
            ..PuzzleFilter::default()
        };
        assert_eq!(store.list_puzzles(&blank, 0, 10).unwrap().1, 4);
    }

    #[test]
    fn find_unattempted_prefers_smallest_id_in_range() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_puzzle(&puzzle("c", 1450.0)).unwrap();
        store.create_puzzle(&puzzle("b", 1550.0)).unwrap();
        store.create_puzzle(&puzzle("a", 1700.0)).unwrap();

        let range = RatingRange::around(1500.0, 100.0);
        let found = store.find_unattempted(&HashSet::new(), range).unwrap();
        assert_eq!(found.unwrap().id, "b");

        let exclude: HashSet<String> = ["b".to_string()].into_iter().collect();
        let found = store.find_unattempted(&exclude, range).unwrap();
        assert_eq!(found.unwrap().id, "c");
    }

    #[test]
    fn find_unattempted_range_is_inclusive() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_puzzle(&puzzle("edge", 1600.0)).unwrap();
        let found = store
            .find_unattempted(&HashSet::new(), RatingRange::around(1500.0, 100.0))
            .unwrap();
        assert_eq!(found.unwrap().id, "edge");
    }

    #[test]
    fn find_any_unattempted_skips_excluded() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.create_puzzle(&puzzle("a", 900.0)).unwrap();
        store.create_puzzle(&puzzle("b", 2900.0)).unwrap();

        let exclude: HashSet<String> = ["a".to_string()].into_iter().collect();
        let found = store.find_any_unattempted(&exclude).unwrap();
        assert_eq!(found.unwrap().id, "b");

        let all: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        assert!(store.find_any_unattempted(&all).unwrap().is_none());
    }
}
