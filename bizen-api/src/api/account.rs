//! Signed-in account endpoints

use axum::{extract::State, Json};
use bizen_common::db::models::User;
use bizen_common::db::schools::redeem_license as redeem;
use serde::Deserialize;
use tracing::info;

use super::{ApiJson, CurrentUser};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/me
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

/// POST /api/licenses/redeem
pub async fn redeem_license(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<RedeemRequest>,
) -> ApiResult<Json<User>> {
    if request.code.trim().is_empty() {
        return Err(ApiError::BadRequest("code must not be empty".to_string()));
    }

    let updated = redeem(&state.db, &user.id, &request.code).await?;
    info!(
        "User {} redeemed a license for school {:?}",
        updated.id, updated.school_id
    );

    Ok(Json(updated))
}
