//! Curriculum and progress endpoints

use axum::{extract::State, Json};
use bizen_common::progression::{ModuleProgressView, ResetSummary};
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiPath, CurrentUser};
use crate::{ApiResult, AppState};

/// Section entry in the curriculum listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSection {
    pub section_id: u32,
    pub title: String,
    pub pages: u32,
    pub quiz_pages: Vec<u32>,
    pub unlocked: bool,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumModule {
    pub module_id: u32,
    pub title: String,
    pub completed: bool,
    pub sections: Vec<CurriculumSection>,
}

#[derive(Debug, Serialize)]
pub struct CurriculumResponse {
    pub modules: Vec<CurriculumModule>,
}

impl From<ModuleProgressView> for CurriculumModule {
    fn from(view: ModuleProgressView) -> Self {
        Self {
            module_id: view.module_id,
            title: view.title,
            completed: view.completed,
            sections: view
                .sections
                .into_iter()
                .map(|s| CurriculumSection {
                    completed: s.completion.as_ref().map(|c| c.is_complete).unwrap_or(false),
                    section_id: s.section_id,
                    title: s.title,
                    pages: s.pages,
                    quiz_pages: s.quiz_pages,
                    unlocked: s.unlocked,
                })
                .collect(),
        }
    }
}

/// GET /api/curriculum
pub async fn get_curriculum(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<CurriculumResponse>> {
    let views = state.progression.course_progress(&state.db, &user.id).await?;

    Ok(Json(CurriculumResponse {
        modules: views.into_iter().map(CurriculumModule::from).collect(),
    }))
}

/// GET /api/progress
pub async fn get_course_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<ModuleProgressView>>> {
    let views = state.progression.course_progress(&state.db, &user.id).await?;
    Ok(Json(views))
}

/// GET /api/progress/:module_id
pub async fn get_module_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(module_id): ApiPath<u32>,
) -> ApiResult<Json<ModuleProgressView>> {
    let view = state
        .progression
        .module_progress(&state.db, &user.id, module_id)
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    #[serde(default)]
    pub module_id: Option<u32>,
}

/// POST /api/progress/reset
///
/// Without `moduleId` the whole course is reset.
pub async fn reset_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<ResetRequest>,
) -> ApiResult<Json<ResetSummary>> {
    let summary = state
        .progression
        .reset_progress(&state.db, &user.id, request.module_id)
        .await?;
    Ok(Json(summary))
}
