//! User account operations
//!
//! Rows are keyed by the identity provider's user id and refreshed from the
//! provider on every authenticated request.

use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{Role, User};
use crate::{Error, Result};

/// Insert or refresh a user from identity provider data
///
/// `promote_admin` raises the role to admin (configured admin e-mails);
/// it never demotes an existing admin.
pub async fn upsert_user(
    pool: &SqlitePool,
    id: &str,
    email: &str,
    display_name: Option<&str>,
    promote_admin: bool,
) -> Result<User> {
    let initial_role = if promote_admin { Role::Admin } else { Role::Student };

    sqlx::query(
        r#"
        INSERT INTO users (id, email, display_name, role, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            display_name = COALESCE(excluded.display_name, users.display_name),
            role = CASE WHEN ? THEN 'admin' ELSE users.role END
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(display_name)
    .bind(initial_role)
    .bind(Utc::now())
    .bind(promote_admin)
    .execute(pool)
    .await?;

    get_user(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("User {} missing after upsert", id)))
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, display_name, role, school_id, license_id, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// One page of users ordered by sign-up time
pub async fn list_users(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, display_name, role, school_id, license_id, created_at
        FROM users
        ORDER BY created_at ASC, id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

pub async fn set_role(pool: &SqlitePool, id: &str, role: Role) -> Result<User> {
    let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }

    get_user(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))
}

/// Delete a user; attempts, visits, completions, progress and forum content cascade
pub async fn delete_user(pool: &SqlitePool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    // Release the license seat before the row disappears
    sqlx::query(
        r#"
        UPDATE licenses SET seats_used = seats_used - 1
        WHERE seats_used > 0
          AND id = (SELECT license_id FROM users WHERE id = ?)
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }

    tx.commit().await?;
    Ok(())
}
