//! Discussion forum endpoints
//!
//! Any signed-in user may read and post. Only the author may edit; the
//! author or an admin may delete.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use bizen_common::db::forum::{self, ThreadSummary};
use bizen_common::db::models::{ForumPost, ForumThread, User};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::pagination::{calculate_pagination, default_page, Page, FORUM_PAGE_SIZE};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default)]
    pub module_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub module_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateThreadRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostBody {
    pub body: String,
}

/// Thread with its replies, oldest first
#[derive(Debug, Serialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ForumThread,
    pub posts: Vec<ForumPost>,
}

fn ensure_author(user: &User, author_id: &str) -> ApiResult<()> {
    if user.id != author_id {
        return Err(ApiError::Forbidden("Only the author may edit this".to_string()));
    }
    Ok(())
}

fn ensure_author_or_admin(user: &User, author_id: &str) -> ApiResult<()> {
    if user.id != author_id && !user.role.is_admin() {
        return Err(ApiError::Forbidden(
            "Only the author or an admin may delete this".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/forum/threads?page=&moduleId=
pub async fn list_threads(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ThreadListQuery>,
) -> ApiResult<Json<Page<ThreadSummary>>> {
    if let Some(module_id) = query.module_id {
        if state.progression.curriculum().module(module_id).is_none() {
            return Err(ApiError::NotFound(format!("Module {}", module_id)));
        }
    }

    let total = forum::count_threads(&state.db, query.module_id).await?;
    let pagination = calculate_pagination(total, query.page, FORUM_PAGE_SIZE);
    let threads = forum::list_threads(
        &state.db,
        query.module_id,
        pagination.page_size,
        pagination.offset,
    )
    .await?;

    Ok(Json(Page::new(pagination, total, threads)))
}

/// POST /api/forum/threads
pub async fn create_thread(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<ForumThread>)> {
    if let Some(module_id) = request.module_id {
        if state.progression.curriculum().module(module_id).is_none() {
            return Err(ApiError::BadRequest(format!("Unknown module {}", module_id)));
        }
    }

    let thread = forum::create_thread(
        &state.db,
        &user.id,
        &request.title,
        &request.body,
        request.module_id,
    )
    .await?;
    info!("Thread {} created by {}", thread.id, user.id);

    Ok((StatusCode::CREATED, Json(thread)))
}

/// GET /api/forum/threads/:id
pub async fn get_thread(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<ThreadDetail>> {
    let thread = forum::get_thread(&state.db, &id).await?;
    let posts = forum::list_posts(&state.db, &id).await?;
    Ok(Json(ThreadDetail { thread, posts }))
}

/// PATCH /api/forum/threads/:id
pub async fn update_thread(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateThreadRequest>,
) -> ApiResult<Json<ForumThread>> {
    if request.title.is_none() && request.body.is_none() {
        return Err(ApiError::BadRequest(
            "Nothing to update: send title and/or body".to_string(),
        ));
    }

    let existing = forum::get_thread(&state.db, &id).await?;
    ensure_author(&user, &existing.author_id)?;

    let thread = forum::update_thread(
        &state.db,
        &id,
        request.title.as_deref(),
        request.body.as_deref(),
    )
    .await?;
    Ok(Json(thread))
}

/// DELETE /api/forum/threads/:id
pub async fn delete_thread(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    let existing = forum::get_thread(&state.db, &id).await?;
    ensure_author_or_admin(&user, &existing.author_id)?;

    forum::delete_thread(&state.db, &id).await?;
    info!("Thread {} deleted by {}", id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/forum/threads/:id/posts
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(thread_id): ApiPath<String>,
    ApiJson(request): ApiJson<PostBody>,
) -> ApiResult<(StatusCode, Json<ForumPost>)> {
    let post = forum::create_post(&state.db, &thread_id, &user.id, &request.body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PATCH /api/forum/posts/:id
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<PostBody>,
) -> ApiResult<Json<ForumPost>> {
    let existing = forum::get_post(&state.db, &id).await?;
    ensure_author(&user, &existing.author_id)?;

    let post = forum::update_post(&state.db, &id, &request.body).await?;
    Ok(Json(post))
}

/// DELETE /api/forum/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    let existing = forum::get_post(&state.db, &id).await?;
    ensure_author_or_admin(&user, &existing.author_id)?;

    forum::delete_post(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build forum routes
pub fn forum_routes() -> Router<AppState> {
    Router::new()
        .route("/api/forum/threads", get(list_threads).post(create_thread))
        .route(
            "/api/forum/threads/:id",
            get(get_thread).patch(update_thread).delete(delete_thread),
        )
        .route("/api/forum/threads/:id/posts", post(create_post))
        .route("/api/forum/posts/:id", patch(update_post).delete(delete_post))
}
