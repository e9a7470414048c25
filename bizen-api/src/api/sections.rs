use axum::{extract::State, Json};
use bizen_common::progression::ProgressOutcome;
use serde::Deserialize;

use super::{ApiJson, CurrentUser};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSectionRequest {
    pub module_id: u32,
    pub section_id: u32,
    #[serde(default)]
    pub pages_visited: Vec<u32>,
}

/// POST /api/sections/complete
pub async fn complete_section(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CompleteSectionRequest>,
) -> ApiResult<Json<ProgressOutcome>> {
    let outcome = state
        .progression
        .complete_section(
            &state.db,
            &user.id,
            request.module_id,
            request.section_id,
            &request.pages_visited,
        )
        .await?;
    Ok(Json(outcome))
}
