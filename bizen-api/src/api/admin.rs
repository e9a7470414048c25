//! Admin endpoints: users, quiz attempt cleanup, schools and licenses
//!
//! Mounted behind [`require_admin`](super::require_admin).

use axum::{extract::State, http::StatusCode, Json};
use bizen_common::db::models::{License, Role, School, User};
use bizen_common::db::schools::{self, SchoolSummary};
use bizen_common::db::users;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::pagination::{calculate_pagination, Page, PageQuery, ADMIN_PAGE_SIZE};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/admin/users?page=
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Page<User>>> {
    let total = users::count_users(&state.db).await?;
    let pagination = calculate_pagination(total, query.page, ADMIN_PAGE_SIZE);
    let rows = users::list_users(&state.db, pagination.page_size, pagination.offset).await?;
    Ok(Json(Page::new(pagination, total, rows)))
}

/// DELETE /api/admin/users/:id
///
/// Removes the user and, through cascading foreign keys, every attempt,
/// visit, completion, progress row and forum entry they own.
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    if admin.id == id {
        return Err(ApiError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    users::delete_user(&state.db, &id).await?;
    warn!("Admin {} deleted user {}", admin.id, id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// PATCH /api/admin/users/:id/role
pub async fn set_user_role(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<SetRoleRequest>,
) -> ApiResult<Json<User>> {
    if admin.id == id && request.role != Role::Admin {
        return Err(ApiError::BadRequest(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }

    let user = users::set_role(&state.db, &id, request.role).await?;
    info!("Admin {} set role of {} to {:?}", admin.id, id, request.role);
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAttemptsRequest {
    pub user_id: String,
    #[serde(default)]
    pub module_id: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAttemptsResponse {
    pub attempts_deleted: u64,
}

/// POST /api/admin/quiz-attempts/delete
///
/// Affected sections are recomputed; unlocks already granted are kept.
pub async fn delete_quiz_attempts(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    ApiJson(request): ApiJson<DeleteAttemptsRequest>,
) -> ApiResult<Json<DeleteAttemptsResponse>> {
    if users::get_user(&state.db, &request.user_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("User {}", request.user_id)));
    }

    let attempts_deleted = state
        .progression
        .delete_attempts(&state.db, &request.user_id, request.module_id)
        .await?;

    warn!(
        "Admin {} deleted {} quiz attempts for user {} (module {:?})",
        admin.id, attempts_deleted, request.user_id, request.module_id
    );

    Ok(Json(DeleteAttemptsResponse { attempts_deleted }))
}

/// GET /api/admin/schools
pub async fn list_schools(State(state): State<AppState>) -> ApiResult<Json<Vec<SchoolSummary>>> {
    Ok(Json(schools::list_schools(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateSchoolRequest {
    pub name: String,
}

/// POST /api/admin/schools
pub async fn create_school(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateSchoolRequest>,
) -> ApiResult<(StatusCode, Json<School>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }

    let school = schools::create_school(&state.db, name).await?;
    Ok((StatusCode::CREATED, Json(school)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLicenseRequest {
    pub school_id: String,
    pub seats: u32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// POST /api/admin/licenses
pub async fn issue_license(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<IssueLicenseRequest>,
) -> ApiResult<(StatusCode, Json<License>)> {
    if let Some(expires_at) = request.expires_at {
        if expires_at <= Utc::now() {
            return Err(ApiError::BadRequest(
                "expiresAt must be in the future".to_string(),
            ));
        }
    }

    let license = schools::issue_license(
        &state.db,
        &request.school_id,
        request.seats,
        request.expires_at,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(license)))
}
