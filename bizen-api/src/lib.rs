//! bizen-api library - HTTP service for the BIZEN learning platform
//!
//! Exposes the router and state for the binary and for integration tests.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use bizen_common::identity::IdentityProvider;
use bizen_common::Progression;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cli;
pub mod error;
pub mod pagination;

pub use crate::error::{ApiError, ApiResult};

/// Request bodies above this size are rejected with 413
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Progression engine bound to the active curriculum
    pub progression: Progression,
    /// Resolves access tokens to users
    pub identity: Arc<dyn IdentityProvider>,
    /// Session cookie consulted when no bearer token is sent
    pub cookie_name: Arc<str>,
    /// Lowercased e-mails promoted to admin on sign-in
    pub admin_emails: Arc<HashSet<String>>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        progression: Progression,
        identity: Arc<dyn IdentityProvider>,
        cookie_name: &str,
        admin_emails: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            db,
            progression,
            identity,
            cookie_name: Arc::from(cookie_name),
            admin_emails: Arc::new(
                admin_emails
                    .into_iter()
                    .map(|e| e.trim().to_ascii_lowercase())
                    .collect(),
            ),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Everything under `/api` requires a session; `/api/admin` additionally
/// requires the admin role. `/health` is public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, patch, post};

    let admin = Router::new()
        .route("/api/admin/users", get(api::admin::list_users))
        .route("/api/admin/users/:id", axum::routing::delete(api::admin::delete_user))
        .route("/api/admin/users/:id/role", patch(api::admin::set_user_role))
        .route(
            "/api/admin/quiz-attempts/delete",
            post(api::admin::delete_quiz_attempts),
        )
        .route(
            "/api/admin/schools",
            get(api::admin::list_schools).post(api::admin::create_school),
        )
        .route("/api/admin/licenses", post(api::admin::issue_license))
        .route_layer(middleware::from_fn(api::require_admin));

    let protected = Router::new()
        .route("/api/me", get(api::account::get_me))
        .route("/api/licenses/redeem", post(api::account::redeem_license))
        .route("/api/curriculum", get(api::progress::get_curriculum))
        .route("/api/progress", get(api::progress::get_course_progress))
        .route("/api/progress/reset", post(api::progress::reset_progress))
        .route("/api/progress/:module_id", get(api::progress::get_module_progress))
        .route("/api/quiz-submit", post(api::quiz::submit_quiz))
        .route("/api/sections/complete", post(api::sections::complete_section))
        .merge(api::forum::forum_routes())
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
