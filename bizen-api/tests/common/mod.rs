//! Shared helpers for bizen-api integration tests
//!
//! Every test gets a private in-memory database, the built-in curriculum
//! and a fixed token table:
//! - `student-token` / `other-token`: students
//! - `admin-token`: admin@example.com, promoted through `admin_emails`

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bizen_api::{build_router, AppState};
use bizen_common::db::init_in_memory_database;
use bizen_common::identity::{IdentityUser, StaticIdentity};
use bizen_common::{Curriculum, Progression};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

pub const STUDENT: &str = "student-token";
pub const OTHER: &str = "other-token";
pub const ADMIN: &str = "admin-token";

pub const STUDENT_ID: &str = "student-1";
pub const OTHER_ID: &str = "student-2";
pub const ADMIN_ID: &str = "admin-1";

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
}

fn identity_user(id: &str, email: &str, name: &str) -> IdentityUser {
    IdentityUser {
        id: id.to_string(),
        email: email.to_string(),
        display_name: Some(name.to_string()),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let db = init_in_memory_database()
            .await
            .expect("Should create in-memory database");

        let identity = StaticIdentity::new()
            .with_user(STUDENT, identity_user(STUDENT_ID, "ana@example.com", "Ana"))
            .with_user(OTHER, identity_user(OTHER_ID, "ben@example.com", "Ben"))
            .with_user(ADMIN, identity_user(ADMIN_ID, "Admin@Example.com", "Admin"));

        let curriculum = Curriculum::builtin().expect("Built-in curriculum should load");
        let state = AppState::new(
            db.clone(),
            Progression::new(Arc::new(curriculum)),
            Arc::new(identity),
            "bizen-access-token",
            vec!["admin@example.com".to_string()],
        );

        Self {
            router: build_router(state),
            db,
        }
    }

    /// Send a request and return status plus parsed JSON body (`Null` when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router should respond");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(request("GET", uri, Some(token), None)).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(request("POST", uri, Some(token), Some(body))).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(request("PATCH", uri, Some(token), Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(request("DELETE", uri, Some(token), None)).await
    }

    /// Submit one quiz page, asserting it was accepted
    pub async fn pass_quiz(&self, token: &str, module: u32, section: u32, page: u32) -> Value {
        let (status, body) = self
            .post("/api/quiz-submit", token, quiz(module, section, page))
            .await;
        assert_eq!(
            status,
            StatusCode::CREATED,
            "quiz {}/{}/{} rejected: {}",
            module,
            section,
            page,
            body
        );
        body
    }

    /// Record page visits for a section, asserting success
    pub async fn visit(&self, token: &str, module: u32, section: u32, pages: &[u32]) -> Value {
        let (status, body) = self
            .post(
                "/api/sections/complete",
                token,
                json!({ "moduleId": module, "sectionId": section, "pagesVisited": pages }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "visit rejected: {}", body);
        body
    }

    /// Finish Module 1 Section 1 (4 pages, quiz on page 4)
    pub async fn finish_first_section(&self, token: &str) -> Value {
        self.visit(token, 1, 1, &[1, 2, 3]).await;
        self.pass_quiz(token, 1, 1, 4).await
    }
}

pub fn quiz(module: u32, section: u32, page: u32) -> Value {
    json!({
        "moduleId": module,
        "sectionId": section,
        "pageId": page,
        "score": 4,
        "totalQuestions": 5,
    })
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
