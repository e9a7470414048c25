//! Discussion forum threads and posts

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::{ForumPost, ForumThread};
use crate::{Error, Result};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_BODY_CHARS: usize = 10_000;

/// Thread listing row with its reply count
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub thread: ForumThread,
    pub author_name: Option<String>,
    pub post_count: i64,
}

/// Trim and bound-check a user-supplied text field
pub fn clean_text(field: &str, value: &str, max_chars: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(Error::InvalidInput(format!(
            "{} exceeds {} characters",
            field, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

pub async fn count_threads(pool: &SqlitePool, module_id: Option<u32>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM forum_threads WHERE (? IS NULL OR module_id = ?)",
    )
    .bind(module_id)
    .bind(module_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Newest threads first, optionally restricted to one module
pub async fn list_threads(
    pool: &SqlitePool,
    module_id: Option<u32>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ThreadSummary>> {
    let threads = sqlx::query_as::<_, ThreadSummary>(
        r#"
        SELECT t.id, t.author_id, t.title, t.body, t.module_id, t.created_at, t.updated_at,
               u.display_name AS author_name,
               (SELECT COUNT(*) FROM forum_posts p WHERE p.thread_id = t.id) AS post_count
        FROM forum_threads t
        LEFT JOIN users u ON u.id = t.author_id
        WHERE (? IS NULL OR t.module_id = ?)
        ORDER BY t.created_at DESC, t.id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(module_id)
    .bind(module_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(threads)
}

pub async fn create_thread(
    pool: &SqlitePool,
    author_id: &str,
    title: &str,
    body: &str,
    module_id: Option<u32>,
) -> Result<ForumThread> {
    let now = Utc::now();
    let thread = ForumThread {
        id: Uuid::new_v4().to_string(),
        author_id: author_id.to_string(),
        title: clean_text("title", title, MAX_TITLE_CHARS)?,
        body: clean_text("body", body, MAX_BODY_CHARS)?,
        module_id,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO forum_threads (id, author_id, title, body, module_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&thread.id)
    .bind(&thread.author_id)
    .bind(&thread.title)
    .bind(&thread.body)
    .bind(thread.module_id)
    .bind(thread.created_at)
    .bind(thread.updated_at)
    .execute(pool)
    .await?;

    Ok(thread)
}

pub async fn get_thread(pool: &SqlitePool, id: &str) -> Result<ForumThread> {
    sqlx::query_as::<_, ForumThread>(
        "SELECT id, author_id, title, body, module_id, created_at, updated_at FROM forum_threads WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Thread {}", id)))
}

/// Replace title and/or body; `None` keeps the current value
pub async fn update_thread(
    pool: &SqlitePool,
    id: &str,
    title: Option<&str>,
    body: Option<&str>,
) -> Result<ForumThread> {
    let mut thread = get_thread(pool, id).await?;
    if let Some(title) = title {
        thread.title = clean_text("title", title, MAX_TITLE_CHARS)?;
    }
    if let Some(body) = body {
        thread.body = clean_text("body", body, MAX_BODY_CHARS)?;
    }
    thread.updated_at = Utc::now();

    sqlx::query("UPDATE forum_threads SET title = ?, body = ?, updated_at = ? WHERE id = ?")
        .bind(&thread.title)
        .bind(&thread.body)
        .bind(thread.updated_at)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(thread)
}

/// Delete a thread and, through the foreign key, its posts
pub async fn delete_thread(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM forum_threads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Thread {}", id)));
    }
    Ok(())
}

pub async fn list_posts(pool: &SqlitePool, thread_id: &str) -> Result<Vec<ForumPost>> {
    let posts = sqlx::query_as::<_, ForumPost>(
        r#"
        SELECT id, thread_id, author_id, body, created_at, updated_at
        FROM forum_posts
        WHERE thread_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(thread_id)
    .fetch_all(pool)
    .await?;

    Ok(posts)
}

pub async fn create_post(
    pool: &SqlitePool,
    thread_id: &str,
    author_id: &str,
    body: &str,
) -> Result<ForumPost> {
    // 404 rather than a foreign key failure for unknown threads
    get_thread(pool, thread_id).await?;

    let now = Utc::now();
    let post = ForumPost {
        id: Uuid::new_v4().to_string(),
        thread_id: thread_id.to_string(),
        author_id: author_id.to_string(),
        body: clean_text("body", body, MAX_BODY_CHARS)?,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO forum_posts (id, thread_id, author_id, body, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.id)
    .bind(&post.thread_id)
    .bind(&post.author_id)
    .bind(&post.body)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(pool)
    .await?;

    Ok(post)
}

pub async fn get_post(pool: &SqlitePool, id: &str) -> Result<ForumPost> {
    sqlx::query_as::<_, ForumPost>(
        "SELECT id, thread_id, author_id, body, created_at, updated_at FROM forum_posts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Post {}", id)))
}

pub async fn update_post(pool: &SqlitePool, id: &str, body: &str) -> Result<ForumPost> {
    let mut post = get_post(pool, id).await?;
    post.body = clean_text("body", body, MAX_BODY_CHARS)?;
    post.updated_at = Utc::now();

    sqlx::query("UPDATE forum_posts SET body = ?, updated_at = ? WHERE id = ?")
        .bind(&post.body)
        .bind(post.updated_at)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(post)
}

pub async fn delete_post(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM forum_posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Post {}", id)));
    }
    Ok(())
}
