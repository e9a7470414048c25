//! HTTP API handlers for bizen-api

pub mod account;
pub mod admin;
pub mod auth;
pub mod extract;
pub mod forum;
pub mod health;
pub mod progress;
pub mod quiz;
pub mod sections;

pub use auth::{auth_middleware, require_admin, CurrentUser};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use health::health_routes;
