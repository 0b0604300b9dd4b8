use crate::store::StoreError;

const SEPARATOR: char = ':';

fn validate_id(entity: &str, id: &str) -> Result<(), StoreError> {
    if id.is_empty() {
        return Err(StoreError::Validation(format!("{entity} id must not be empty")));
    }
    if id.contains(SEPARATOR) {
        return Err(StoreError::Validation(format!(
            "{entity} id must not contain '{SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Maps a finite rating onto a `u64` whose natural order matches the float order.
pub fn rating_sort_key(rating: f64) -> u64 {
    let bits = rating.to_bits();
    if rating.is_sign_negative() {
        !bits
    } else {
        bits | (1 << 63)
    }
}

pub fn puzzle_key(puzzle_id: &str) -> Result<String, StoreError> {
    validate_id("puzzle", puzzle_id)?;
    Ok(puzzle_id.to_string())
}

pub fn puzzle_rating_index_key(rating: f64, puzzle_id: &str) -> Result<String, StoreError> {
    validate_id("puzzle", puzzle_id)?;
    Ok(format!("{:020}:{}", rating_sort_key(rating), puzzle_id))
}

/// Key bounds covering every index entry with `min <= rating <= max`.
pub fn puzzle_rating_index_bounds(min: f64, max: f64) -> (String, String) {
    // ';' sorts directly after ':' so the upper bound includes all ids at `max`.
    (
        format!("{:020}:", rating_sort_key(min)),
        format!("{:020};", rating_sort_key(max)),
    )
}

pub fn learner_state_key(learner_id: &str) -> Result<String, StoreError> {
    validate_id("learner", learner_id)?;
    Ok(learner_id.to_string())
}

/// Newest attempt sorts first within a learner prefix.
pub fn attempt_key(learner_id: &str, sequence: u64) -> Result<String, StoreError> {
    validate_id("learner", learner_id)?;
    Ok(format!("{}:{:020}", learner_id, u64::MAX - sequence))
}

pub fn attempt_prefix(learner_id: &str) -> Result<String, StoreError> {
    validate_id("learner", learner_id)?;
    Ok(format!("{}:", learner_id))
}

pub fn learner_puzzle_key(learner_id: &str, puzzle_id: &str) -> Result<String, StoreError> {
    validate_id("learner", learner_id)?;
    validate_id("puzzle", puzzle_id)?;
    Ok(format!("{}:{}", learner_id, puzzle_id))
}

pub fn learner_puzzle_prefix(learner_id: &str) -> Result<String, StoreError> {
    attempt_prefix(learner_id)
}
