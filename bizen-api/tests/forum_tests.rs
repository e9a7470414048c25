//! Integration tests for the discussion forum

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{json, Value};

async fn create_thread(app: &TestApp, token: &str, title: &str, module_id: Option<u32>) -> Value {
    let (status, body) = app
        .post(
            "/api/forum/threads",
            token,
            json!({ "title": title, "body": "What counts as income?", "moduleId": module_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "thread rejected: {}", body);
    body
}

#[tokio::test]
async fn test_create_and_read_thread() {
    let app = TestApp::new().await;

    let thread = create_thread(&app, STUDENT, "  Budget question  ", Some(2)).await;
    assert_eq!(thread["title"], "Budget question");
    assert_eq!(thread["authorId"], STUDENT_ID);
    assert_eq!(thread["moduleId"], 2);

    let id = thread["id"].as_str().unwrap();
    let (status, _) = app
        .post(
            &format!("/api/forum/threads/{}/posts", id),
            OTHER,
            json!({ "body": "Salary and allowance" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, detail) = app.get(&format!("/api/forum/threads/{}", id), OTHER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["title"], "Budget question");
    assert_eq!(detail["posts"].as_array().unwrap().len(), 1);
    assert_eq!(detail["posts"][0]["authorId"], OTHER_ID);
}

#[tokio::test]
async fn test_list_threads_paginated_and_filtered() {
    let app = TestApp::new().await;
    create_thread(&app, STUDENT, "General", None).await;
    create_thread(&app, STUDENT, "Module one", Some(1)).await;
    create_thread(&app, OTHER, "Module one again", Some(1)).await;

    let (status, page) = app.get("/api/forum/threads", STUDENT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalItems"], 3);
    assert_eq!(page["page"], 1);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["items"].as_array().unwrap().len(), 3);
    assert_eq!(page["items"][0]["postCount"], 0);

    let (_, page) = app.get("/api/forum/threads?moduleId=1", STUDENT).await;
    assert_eq!(page["totalItems"], 2);
    assert!(page["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|t| t["moduleId"] == 1));

    let (status, _) = app.get("/api/forum/threads?moduleId=77", STUDENT).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_thread_validation() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post("/api/forum/threads", STUDENT, json!({ "title": "   ", "body": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/forum/threads",
            STUDENT,
            json!({ "title": "t".repeat(201), "body": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/forum/threads",
            STUDENT,
            json!({ "title": "t".repeat(200), "body": "b".repeat(10_000) }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            "/api/forum/threads",
            STUDENT,
            json!({ "title": "Unknown module", "body": "x", "moduleId": 12 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_author_edits_thread() {
    let app = TestApp::new().await;
    let thread = create_thread(&app, STUDENT, "Original", None).await;
    let uri = format!("/api/forum/threads/{}", thread["id"].as_str().unwrap());

    let (status, _) = app.patch(&uri, OTHER, json!({ "title": "Hijacked" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.patch(&uri, ADMIN, json!({ "title": "Moderated" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.patch(&uri, STUDENT, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.patch(&uri, STUDENT, json!({ "title": "Edited" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Edited");
    assert_eq!(body["body"], "What counts as income?");
}

#[tokio::test]
async fn test_delete_thread_author_or_admin() {
    let app = TestApp::new().await;
    let first = create_thread(&app, STUDENT, "First", None).await;
    let second = create_thread(&app, STUDENT, "Second", None).await;
    let first_uri = format!("/api/forum/threads/{}", first["id"].as_str().unwrap());
    let second_uri = format!("/api/forum/threads/{}", second["id"].as_str().unwrap());

    app.post(
        &format!("{}/posts", first_uri),
        OTHER,
        json!({ "body": "reply" }),
    )
    .await;

    let (status, _) = app.delete(&first_uri, OTHER).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&first_uri, STUDENT).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&first_uri, STUDENT).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM forum_posts")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(posts, 0);

    let (status, _) = app.delete(&second_uri, ADMIN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.delete(&second_uri, ADMIN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_permissions() {
    let app = TestApp::new().await;
    let thread = create_thread(&app, STUDENT, "Thread", None).await;
    let (_, post) = app
        .post(
            &format!("/api/forum/threads/{}/posts", thread["id"].as_str().unwrap()),
            OTHER,
            json!({ "body": "First reply" }),
        )
        .await;
    let uri = format!("/api/forum/posts/{}", post["id"].as_str().unwrap());

    let (status, _) = app.patch(&uri, STUDENT, json!({ "body": "Not mine" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.patch(&uri, OTHER, json!({ "body": "Edited reply" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "Edited reply");

    let (status, _) = app.delete(&uri, STUDENT).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, ADMIN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_reply_to_unknown_thread() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/forum/threads/no-such-thread/posts",
            STUDENT,
            json!({ "body": "hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
