//! Quiz submission endpoint

use axum::{extract::State, http::StatusCode, Json};
use bizen_common::progression::{QuizSubmission, QuizSubmitOutcome};

use super::{ApiJson, CurrentUser};
use crate::{ApiResult, AppState};

/// POST /api/quiz-submit
///
/// Records the attempt and advances the section in one transaction.
/// Returns 409 if the page was already submitted and 403 if the section
/// is still locked.
pub async fn submit_quiz(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(submission): ApiJson<QuizSubmission>,
) -> ApiResult<(StatusCode, Json<QuizSubmitOutcome>)> {
    let outcome = state
        .progression
        .submit_quiz(&state.db, &user.id, &submission)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}
