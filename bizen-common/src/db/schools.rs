//! Schools and seat licenses

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::models::{License, School, User};
use super::users::get_user;
use crate::{Error, Result};

const LICENSE_CODE_LEN: usize = 12;

/// School row plus aggregate counts for the admin listing
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub school: School,
    pub license_count: i64,
    pub student_count: i64,
}

pub async fn create_school(pool: &SqlitePool, name: &str) -> Result<School> {
    let school = School {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO schools (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&school.id)
        .bind(&school.name)
        .bind(school.created_at)
        .execute(pool)
        .await
        .map_err(|e| {
            if Error::is_unique_violation(&e) {
                Error::Conflict(format!("School '{}' already exists", name))
            } else {
                Error::Database(e)
            }
        })?;

    info!("Created school {} ({})", school.name, school.id);
    Ok(school)
}

pub async fn list_schools(pool: &SqlitePool) -> Result<Vec<SchoolSummary>> {
    let schools = sqlx::query_as::<_, SchoolSummary>(
        r#"
        SELECT s.id, s.name, s.created_at,
               (SELECT COUNT(*) FROM licenses l WHERE l.school_id = s.id) AS license_count,
               (SELECT COUNT(*) FROM users u WHERE u.school_id = s.id) AS student_count
        FROM schools s
        ORDER BY s.name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(schools)
}

fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LICENSE_CODE_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

/// Issue a license with a fresh redemption code
pub async fn issue_license(
    pool: &SqlitePool,
    school_id: &str,
    seats: u32,
    expires_at: Option<DateTime<Utc>>,
) -> Result<License> {
    if seats == 0 {
        return Err(Error::InvalidInput("seats must be at least 1".to_string()));
    }

    let school_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM schools WHERE id = ?)")
        .bind(school_id)
        .fetch_one(pool)
        .await?;
    if !school_exists {
        return Err(Error::NotFound(format!("School {}", school_id)));
    }

    let license = License {
        id: Uuid::new_v4().to_string(),
        school_id: school_id.to_string(),
        code: generate_code(),
        seats,
        seats_used: 0,
        expires_at,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO licenses (id, school_id, code, seats, seats_used, expires_at, created_at)
        VALUES (?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&license.id)
    .bind(&license.school_id)
    .bind(&license.code)
    .bind(license.seats)
    .bind(license.expires_at)
    .bind(license.created_at)
    .execute(pool)
    .await?;

    info!("Issued license {} for school {} ({} seats)", license.id, school_id, seats);
    Ok(license)
}

const LICENSE_COLUMNS: &str = "id, school_id, code, seats, seats_used, expires_at, created_at";

/// Attach a user to the license's school and consume one seat
///
/// The seat claim is the first statement of the transaction so the
/// connection takes the write lock up front; a read-first transaction
/// cannot upgrade under WAL once another writer has committed.
pub async fn redeem_license(pool: &SqlitePool, user_id: &str, code: &str) -> Result<User> {
    let code = code.trim().to_ascii_uppercase();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let claimed = sqlx::query_as::<_, License>(&format!(
        "UPDATE licenses SET seats_used = seats_used + 1 \
         WHERE code = ? AND seats_used < seats RETURNING {}",
        LICENSE_COLUMNS
    ))
    .bind(&code)
    .fetch_optional(&mut *tx)
    .await?;

    let license = match claimed {
        Some(license) => license,
        None => return Err(unclaimable(&mut tx, &code, now).await),
    };

    // Dropping the transaction on any early return releases the seat
    if license.is_expired(now) {
        return Err(Error::InvalidInput("License has expired".to_string()));
    }

    let current: Option<String> = sqlx::query_scalar("SELECT license_id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;
    if current.is_some() {
        return Err(Error::Conflict("User already holds a license".to_string()));
    }

    sqlx::query("UPDATE users SET school_id = ?, license_id = ? WHERE id = ?")
        .bind(&license.school_id)
        .bind(&license.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!("User {} redeemed license {}", user_id, license.id);

    get_user(pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
}

/// Explain why no seat could be claimed for `code`
async fn unclaimable(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    code: &str,
    now: DateTime<Utc>,
) -> Error {
    let license = sqlx::query_as::<_, License>(&format!(
        "SELECT {} FROM licenses WHERE code = ?",
        LICENSE_COLUMNS
    ))
    .bind(code)
    .fetch_optional(&mut **tx)
    .await;

    match license {
        Ok(None) => Error::NotFound("License code".to_string()),
        Ok(Some(license)) if license.is_expired(now) => {
            Error::InvalidInput("License has expired".to_string())
        }
        Ok(Some(_)) => Error::Conflict("License has no free seats".to_string()),
        Err(e) => Error::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_in_memory_database;
    use crate::db::users::upsert_user;
    use chrono::Duration;

    #[tokio::test]
    async fn test_duplicate_school_name_conflicts() {
        let pool = init_in_memory_database().await.unwrap();
        create_school(&pool, "Lincoln High").await.unwrap();
        let err = create_school(&pool, "Lincoln High").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_redeem_consumes_seats() {
        let pool = init_in_memory_database().await.unwrap();
        let school = create_school(&pool, "Lincoln High").await.unwrap();
        let license = issue_license(&pool, &school.id, 1, None).await.unwrap();
        upsert_user(&pool, "u1", "a@example.com", None, false).await.unwrap();
        upsert_user(&pool, "u2", "b@example.com", None, false).await.unwrap();

        let user = redeem_license(&pool, "u1", &license.code.to_lowercase()).await.unwrap();
        assert_eq!(user.school_id.as_deref(), Some(school.id.as_str()));

        let again = redeem_license(&pool, "u1", &license.code).await.unwrap_err();
        assert!(matches!(again, Error::Conflict(_)));

        let full = redeem_license(&pool, "u2", &license.code).await.unwrap_err();
        assert!(matches!(full, Error::Conflict(_)));

        let summary = list_schools(&pool).await.unwrap();
        assert_eq!(summary[0].license_count, 1);
        assert_eq!(summary[0].student_count, 1);
    }

    #[tokio::test]
    async fn test_expired_license_rejected() {
        let pool = init_in_memory_database().await.unwrap();
        let school = create_school(&pool, "Lincoln High").await.unwrap();
        let expired = Utc::now() - Duration::days(1);
        let license = issue_license(&pool, &school.id, 5, Some(expired)).await.unwrap();
        upsert_user(&pool, "u1", "a@example.com", None, false).await.unwrap();

        let err = redeem_license(&pool, "u1", &license.code).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rejected_redemption_releases_seat() {
        let pool = init_in_memory_database().await.unwrap();
        let school = create_school(&pool, "Lincoln High").await.unwrap();
        let first = issue_license(&pool, &school.id, 3, None).await.unwrap();
        let second = issue_license(&pool, &school.id, 3, None).await.unwrap();
        upsert_user(&pool, "u1", "a@example.com", None, false).await.unwrap();
        redeem_license(&pool, "u1", &first.code).await.unwrap();

        let err = redeem_license(&pool, "u1", &second.code).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        let err = redeem_license(&pool, "ghost", &second.code).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let used: i64 = sqlx::query_scalar("SELECT seats_used FROM licenses WHERE id = ?")
            .bind(&second.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(used, 0);
    }

    #[tokio::test]
    async fn test_issue_license_unknown_school() {
        let pool = init_in_memory_database().await.unwrap();
        let err = issue_license(&pool, "missing", 3, None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
