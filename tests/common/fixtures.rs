use chrono::Utc;

use puzzle_backend::rating::types::LearnerRatingState;
use puzzle_backend::store::operations::puzzles::Puzzle;
use puzzle_backend::store::{LearnerStore, Store};

pub fn seed_puzzle(store: &Store, id: &str, rating: f64) -> Puzzle {
    seed_themed_puzzle(store, id, rating, &["seed"])
}

pub fn seed_themed_puzzle(store: &Store, id: &str, rating: f64, themes: &[&str]) -> Puzzle {
    let puzzle = Puzzle {
        id: id.to_string(),
        rating,
        themes: themes.iter().map(|theme| theme.to_string()).collect(),
        created_at: Utc::now(),
    };
    store.create_puzzle(&puzzle).expect("create seed puzzle");
    puzzle
}

/// Puzzles `p0000`, `p0001`, ... spaced `step` apart starting at `from`.
pub fn seed_ladder(store: &Store, from: f64, step: f64, count: usize) -> Vec<Puzzle> {
    (0..count)
        .map(|idx| seed_puzzle(store, &format!("p{idx:04}"), from + step * idx as f64))
        .collect()
}

pub fn seed_learner_state(store: &Store, learner_id: &str, state: LearnerRatingState) {
    store
        .put_learner_state(learner_id, &state)
        .expect("persist learner state");
}
