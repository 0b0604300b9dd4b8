use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_PAGE_SIZE, MAX_HISTORY_LIMIT, MAX_PAGE_SIZE,
};
use crate::extractors::{JsonBody, LearnerId};
use crate::rating::selector::SelectionPhase;
use crate::rating::types::{AttemptInput, Outcome};
use crate::response::{created, ok, paginated, AppError};
use crate::state::AppState;
use crate::store::operations::puzzles::{Puzzle, PuzzleFilter};
use crate::store::{PuzzleCatalog, StoreError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_puzzles).post(create_puzzle))
        .route("/solve", post(solve_puzzle))
        .route("/recommended", get(recommended_puzzle))
        .route("/stats", get(learner_stats))
        .route("/history", get(attempt_history))
        .route("/theme/:theme", get(list_puzzles_by_theme))
        .route(
            "/:id",
            get(get_puzzle).patch(update_puzzle).delete(delete_puzzle),
        )
        .route("/:id/solve-count", get(solve_count))
        .route("/:id/solved", get(has_solved))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolveRequest {
    puzzle_id: String,
    outcome: Option<f64>,
    success: Option<bool>,
    #[serde(default)]
    time_spent: f64,
    attempts_made: Option<u32>,
}

impl SolveRequest {
    fn into_input(self) -> Result<AttemptInput, AppError> {
        let outcome = match (self.outcome, self.success) {
            (Some(score), _) => Outcome::new(score).ok_or_else(|| {
                AppError::bad_request(
                    "INVALID_ATTEMPT",
                    "outcome must be a number between 0 and 1",
                )
            })?,
            (None, Some(success)) => Outcome::from(success),
            (None, None) => {
                return Err(AppError::bad_request(
                    "INVALID_ATTEMPT",
                    "either outcome or success is required",
                ))
            }
        };
        if self.puzzle_id.trim().is_empty() {
            return Err(AppError::bad_request(
                "INVALID_ATTEMPT",
                "puzzleId is required",
            ));
        }
        Ok(AttemptInput {
            puzzle_id: self.puzzle_id,
            outcome,
            time_spent: self.time_spent,
            attempts_made: self.attempts_made.unwrap_or(1),
        })
    }
}

async fn solve_puzzle(
    LearnerId(learner_id): LearnerId,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SolveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = req.into_input()?;
    let result = state.engine().record_attempt(&learner_id, input)?;
    Ok(created(result))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WindowBody {
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationBody {
    puzzle: Puzzle,
    phase: SelectionPhase,
    window: Option<WindowBody>,
}

async fn recommended_puzzle(
    LearnerId(learner_id): LearnerId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let selection = state.engine().recommend_next(&learner_id)?;
    Ok(ok(RecommendationBody {
        puzzle: selection.puzzle,
        phase: selection.phase,
        window: selection.window.map(|range| WindowBody {
            min: range.min,
            max: range.max,
        }),
    }))
}

async fn learner_stats(
    LearnerId(learner_id): LearnerId,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.engine().learner_stats(&learner_id)?;
    Ok(ok(stats))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn attempt_history(
    LearnerId(learner_id): LearnerId,
    Query(q): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let history = state.engine().attempt_history(&learner_id, limit)?;
    Ok(ok(history))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePuzzleRequest {
    id: Option<String>,
    rating: f64,
    #[serde(default)]
    themes: Vec<String>,
}

async fn create_puzzle(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreatePuzzleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let puzzle = Puzzle {
        id: req
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        rating: req.rating,
        themes: req.themes,
        created_at: Utc::now(),
    };
    state.store().create_puzzle(&puzzle)?;
    tracing::info!(puzzle_id = %puzzle.id, rating = puzzle.rating, "Puzzle created");
    Ok(created(puzzle))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPuzzlesQuery {
    min_rating: Option<f64>,
    max_rating: Option<f64>,
    theme: Option<String>,
    page: Option<u64>,
    #[serde(alias = "limit")]
    per_page: Option<u64>,
}

impl ListPuzzlesQuery {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    fn filter(&self) -> Result<PuzzleFilter, AppError> {
        let defaults = PuzzleFilter::default();
        let min_rating = self.min_rating.unwrap_or(defaults.min_rating);
        let max_rating = self.max_rating.unwrap_or(defaults.max_rating);
        if !(min_rating.is_finite() && max_rating.is_finite()) || min_rating > max_rating {
            return Err(AppError::bad_request(
                "VALIDATION_ERROR",
                "minRating must not exceed maxRating",
            ));
        }
        Ok(PuzzleFilter {
            min_rating,
            max_rating,
            theme: self.theme.clone(),
        })
    }
}

fn list_page(state: &AppState, query: &ListPuzzlesQuery) -> Result<impl IntoResponse, AppError> {
    let filter = query.filter()?;
    let page = query.page();
    let per_page = query.per_page();
    let offset = usize::try_from(page.saturating_sub(1).saturating_mul(per_page))
        .unwrap_or(usize::MAX);
    let (puzzles, total) = state
        .store()
        .list_puzzles(&filter, offset, per_page as usize)?;
    Ok(paginated(puzzles, total, page, per_page))
}

async fn list_puzzles(
    Query(q): Query<ListPuzzlesQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    list_page(&state, &q)
}

async fn list_puzzles_by_theme(
    Path(theme): Path<String>,
    Query(q): Query<ListPuzzlesQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let q = ListPuzzlesQuery {
        theme: Some(theme),
        ..q
    };
    list_page(&state, &q)
}

async fn get_puzzle(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let puzzle = state
        .store()
        .get_puzzle(&id)?
        .ok_or_else(|| AppError::not_found("PUZZLE_NOT_FOUND", &format!("Puzzle not found: {id}")))?;
    Ok(ok(puzzle))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePuzzleRequest {
    rating: Option<f64>,
    themes: Option<Vec<String>>,
}

async fn update_puzzle(
    Path(id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<UpdatePuzzleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut puzzle = state
        .store()
        .get_puzzle(&id)?
        .ok_or_else(|| AppError::not_found("PUZZLE_NOT_FOUND", &format!("Puzzle not found: {id}")))?;
    if let Some(rating) = req.rating {
        puzzle.rating = rating;
    }
    if let Some(themes) = req.themes {
        puzzle.themes = themes;
    }
    state.store().upsert_puzzle(&puzzle)?;
    tracing::info!(puzzle_id = %puzzle.id, rating = puzzle.rating, "Puzzle updated");
    Ok(ok(puzzle))
}

async fn delete_puzzle(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state.store().remove_puzzle(&id).map_err(|e| match e {
        StoreError::NotFound { .. } => {
            AppError::not_found("PUZZLE_NOT_FOUND", &format!("Puzzle not found: {id}"))
        }
        other => other.into(),
    })?;
    tracing::info!(puzzle_id = %removed.id, "Puzzle deleted");
    Ok(ok(serde_json::json!({ "deleted": true, "id": removed.id })))
}

async fn solve_count(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let count = state.store().count_puzzle_attempts(&id)?;
    Ok(ok(serde_json::json!({ "puzzleId": id, "solveCount": count })))
}

async fn has_solved(
    LearnerId(learner_id): LearnerId,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let solved = state.store().has_solved_puzzle(&learner_id, &id)?;
    Ok(ok(serde_json::json!({ "puzzleId": id, "solved": solved })))
}
