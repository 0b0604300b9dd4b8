use chrono::{DateTime, Utc};

use crate::constants::MAX_TIME_SPENT_SECS;
use crate::rating::config::Glicko2Config;
use crate::rating::error::EngineError;
use crate::rating::glicko::{self, GlickoRating};
use crate::rating::types::{AttemptInput, LearnerRatingState};
use crate::store::operations::attempts::AttemptRecord;

fn validate_input(input: &AttemptInput) -> Result<(), EngineError> {
    if !(input.time_spent.is_finite()
        && (0.0..=MAX_TIME_SPENT_SECS).contains(&input.time_spent))
    {
        return Err(EngineError::InvalidAttempt(format!(
            "timeSpent must be between 0 and {MAX_TIME_SPENT_SECS} seconds, got {}",
            input.time_spent
        )));
    }
    if input.attempts_made < 1 {
        return Err(EngineError::InvalidAttempt(
            "attemptsMade must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Every float that gets persisted must survive a JSON round trip.
fn ensure_finite(next: &LearnerRatingState, record: &AttemptRecord) -> Result<(), EngineError> {
    let fields = [
        ("rating", next.rating),
        ("ratingDeviation", next.rating_deviation),
        ("volatility", next.volatility),
        ("averageTimePerAttempt", next.average_time_per_attempt),
        ("puzzleRating", record.puzzle_rating),
        ("ratingBefore", record.rating_before),
        ("ratingAfter", record.rating_after),
        ("timeSpent", record.time_spent),
    ];
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, value)) => Err(EngineError::RatingComputation(format!(
            "{name} is not finite ({value})"
        ))),
        None => Ok(()),
    }
}

/// Applies one attempt against a puzzle of `puzzle_rating` to `state`.
///
/// Returns the next state (version bumped) and the audit record to append.
/// `state` is never modified; on error the caller keeps the previous state.
pub fn apply_attempt(
    learner_id: &str,
    state: &LearnerRatingState,
    puzzle_rating: f64,
    input: &AttemptInput,
    now: DateTime<Utc>,
    config: &Glicko2Config,
) -> Result<(LearnerRatingState, AttemptRecord), EngineError> {
    validate_input(input)?;

    let player = GlickoRating {
        rating: state.rating,
        deviation: state.rating_deviation,
        volatility: state.volatility,
    };
    let rated = glicko::rate(&player, puzzle_rating, input.outcome, config)?;

    let mut next = state.clone();
    next.rating = rated.rating.round();
    next.rating_deviation = rated.deviation;
    next.volatility = rated.volatility;
    next.total_attempted += 1;

    if input.outcome.is_solved() {
        next.total_solved += 1;
        next.correct_count += 1;
        next.current_streak += 1;
        next.longest_streak = next.longest_streak.max(next.current_streak);
    } else {
        next.incorrect_count += 1;
        next.current_streak = 0;
    }

    let n = next.total_attempted as f64;
    next.average_time_per_attempt = state.average_time_per_attempt
        + (input.time_spent - state.average_time_per_attempt) / n;
    next.last_solved_at = Some(now);
    next.version = state.version + 1;

    let record = AttemptRecord {
        id: uuid::Uuid::new_v4().to_string(),
        learner_id: learner_id.to_string(),
        puzzle_id: input.puzzle_id.clone(),
        sequence: next.total_attempted,
        puzzle_rating,
        rating_before: state.rating,
        rating_after: next.rating,
        outcome: input.outcome,
        time_spent: input.time_spent,
        attempts_made: input.attempts_made,
        created_at: now,
    };

    ensure_finite(&next, &record)?;
    Ok((next, record))
}
