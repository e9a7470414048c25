//! Hosted identity provider client
//!
//! Sessions are owned by the hosted auth service. The platform only resolves
//! an access token to the provider's user record (`GET /auth/v1/user`) and
//! never sees passwords.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{Error, Result};

/// User as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Resolves access tokens to users
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` for unknown or expired tokens; `Err` when the provider
    /// could not be asked
    async fn get_user(&self, access_token: &str) -> Result<Option<IdentityUser>>;
}

/// Provider user payload; display name lives in `user_metadata`
#[derive(Debug, Deserialize)]
struct HostedUserResponse {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: HashMap<String, serde_json::Value>,
}

impl HostedUserResponse {
    fn into_identity(self) -> Option<IdentityUser> {
        let email = self.email?;
        let display_name = ["full_name", "name", "display_name"]
            .iter()
            .find_map(|key| self.user_metadata.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string);
        Some(IdentityUser {
            id: self.id,
            email,
            display_name,
        })
    }
}

/// HTTP client for the hosted auth service
pub struct HostedIdentity {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HostedIdentity {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Identity(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn get_user(&self, access_token: &str) -> Result<Option<IdentityUser>> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Identity(format!("Request to {} failed: {}", url, e)))?;

        match response.status() {
            StatusCode::OK => {
                let body: HostedUserResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Identity(format!("Invalid user payload: {}", e)))?;
                let user = body.into_identity();
                if user.is_none() {
                    warn!("Identity provider returned a user without an e-mail address");
                }
                Ok(user)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Identity provider rejected access token");
                Ok(None)
            }
            status => Err(Error::Identity(format!(
                "Identity provider returned {}",
                status
            ))),
        }
    }
}

/// Fixed token table for local development and tests
#[derive(Debug, Default, Clone)]
pub struct StaticIdentity {
    users: HashMap<String, IdentityUser>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, user: IdentityUser) -> Self {
        self.users.insert(token.to_string(), user);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn get_user(&self, access_token: &str) -> Result<Option<IdentityUser>> {
        Ok(self.users.get(access_token).cloned())
    }
}

/// Pull the access token from an `Authorization: Bearer` value or a cookie header
pub fn extract_access_token(
    authorization: Option<&str>,
    cookie_header: Option<&str>,
    cookie_name: &str,
) -> Option<String> {
    if let Some(value) = authorization {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
