//! Session authentication middleware
//!
//! Resolves the access token (bearer header or session cookie) through the
//! hosted identity provider, refreshes the local user row and stores it in
//! the request extensions for handlers.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use bizen_common::db::models::User;
use bizen_common::db::users::upsert_user;
use bizen_common::identity::extract_access_token;
use tracing::{debug, warn};

use crate::{ApiError, AppState};

/// Signed-in user attached by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Not signed in".to_string()))
    }
}

/// Authentication middleware
///
/// Returns 401 when no token is present or the provider does not recognize it.
/// Applied to every `/api` route; `/health` does NOT use it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let cookies = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());

    let token = extract_access_token(authorization, cookies, &state.cookie_name)
        .ok_or_else(|| ApiError::Unauthorized("Missing access token".to_string()))?;

    let identity = state.identity.get_user(&token).await?.ok_or_else(|| {
        debug!("Rejected unknown access token for {}", request.uri().path());
        ApiError::Unauthorized("Invalid or expired session".to_string())
    })?;

    let promote = state
        .admin_emails
        .contains(&identity.email.to_ascii_lowercase());

    let user = upsert_user(
        &state.db,
        &identity.id,
        &identity.email,
        identity.display_name.as_deref(),
        promote,
    )
    .await?;

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Admin gate; must run inside [`auth_middleware`]
pub async fn require_admin(
    CurrentUser(user): CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.role.is_admin() {
        warn!("Non-admin user {} denied {}", user.id, request.uri().path());
        return Err(ApiError::Forbidden("Admin role required".to_string()));
    }

    Ok(next.run(request).await)
}
