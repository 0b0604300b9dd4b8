pub const PUZZLES: &str = "puzzles";
pub const PUZZLES_BY_RATING: &str = "puzzles_by_rating";
pub const PUZZLE_ATTEMPT_COUNTS: &str = "puzzle_attempt_counts";
pub const LEARNER_STATES: &str = "learner_states";
pub const ATTEMPTS: &str = "attempts";
pub const LEARNER_PUZZLES: &str = "learner_puzzles";
