//! Section and module progression gating
//!
//! A section moves through three states for each user:
//!
//! ```text
//! locked --(previous section complete)--> unlocked --(pages + quizzes done)--> complete
//! ```
//!
//! Section 1 of every module starts unlocked. Completing section `n` raises
//! `unlocked_section` to `min(n + 1, section_count)`; it is never lowered.
//! A module is complete once all of its sections are complete.
//!
//! Every operation that writes more than one row runs in a single
//! transaction, so an attempt is never recorded without the matching
//! completion and unlock.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::curriculum::{Curriculum, ModuleSpec, SectionSpec};
use crate::db::models::{QuizAttempt, SectionCompletion, UserModuleProgress};
use crate::{Error, Result};

/// Quiz submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub module_id: u32,
    pub section_id: u32,
    pub page_id: u32,
    pub score: u32,
    pub total_questions: u32,
    #[serde(default = "default_quiz_type")]
    pub quiz_type: String,
}

fn default_quiz_type() -> String {
    "multiple_choice".to_string()
}

/// State of a section and its module after a progression step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOutcome {
    pub section: SectionCompletion,
    /// True only on the call that flipped the section to complete
    pub newly_completed: bool,
    pub unlocked_section: u32,
    pub module_completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmitOutcome {
    pub attempt: QuizAttempt,
    #[serde(flatten)]
    pub progress: ProgressOutcome,
}

/// Per-section entry in a module progress view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionProgressView {
    pub section_id: u32,
    pub title: String,
    pub pages: u32,
    pub quiz_pages: Vec<u32>,
    pub unlocked: bool,
    pub completion: Option<SectionCompletion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgressView {
    pub module_id: u32,
    pub title: String,
    pub unlocked_section: u32,
    pub completed: bool,
    pub sections: Vec<SectionProgressView>,
}

/// Rows removed by a progress reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub attempts_deleted: u64,
    pub visits_deleted: u64,
    pub completions_deleted: u64,
    pub modules_reset: u64,
}

/// Result of a full recomputation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub sections_examined: u64,
    pub sections_newly_completed: u64,
    pub sections_skipped: u64,
    pub dry_run: bool,
}

/// Progression engine over one curriculum
#[derive(Clone)]
pub struct Progression {
    curriculum: Arc<Curriculum>,
}

impl Progression {
    pub fn new(curriculum: Arc<Curriculum>) -> Self {
        Self { curriculum }
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    /// Record a quiz attempt and advance the section
    ///
    /// # Errors
    /// - `NotFound`: unknown module/section
    /// - `InvalidInput`: page has no quiz, or score/total out of range
    /// - `Forbidden`: section is still locked for this user
    /// - `Conflict`: this page was already submitted
    pub async fn submit_quiz(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        submission: &QuizSubmission,
    ) -> Result<QuizSubmitOutcome> {
        let (module, section) = self
            .curriculum
            .require_section(submission.module_id, submission.section_id)?;

        if !section.is_quiz_page(submission.page_id) {
            return Err(Error::InvalidInput(format!(
                "Module {} section {} page {} has no quiz",
                module.id, section.id, submission.page_id
            )));
        }
        if submission.total_questions == 0 {
            return Err(Error::InvalidInput("totalQuestions must be at least 1".to_string()));
        }
        if submission.score > submission.total_questions {
            return Err(Error::InvalidInput(format!(
                "score {} exceeds totalQuestions {}",
                submission.score, submission.total_questions
            )));
        }
        let quiz_type = submission.quiz_type.trim();
        if quiz_type.is_empty() {
            return Err(Error::InvalidInput("quizType must not be empty".to_string()));
        }

        let mut tx = pool.begin().await?;

        let progress = ensure_module_progress(&mut tx, user_id, module.id).await?;
        check_unlocked(&progress, section.id)?;

        let attempt = QuizAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            module_id: module.id,
            section_id: section.id,
            page_id: submission.page_id,
            score: submission.score,
            total_questions: submission.total_questions,
            quiz_type: quiz_type.to_string(),
            created_at: Utc::now(),
        };
        insert_attempt(&mut tx, &attempt).await?;

        // Answering a quiz implies the page was seen
        record_page_visit(&mut tx, user_id, module.id, section.id, submission.page_id).await?;

        let outcome = self.settle_section(&mut tx, user_id, module, section).await?;
        tx.commit().await?;

        info!(
            "Quiz submitted: user={} module={} section={} page={} score={}/{}",
            user_id, module.id, section.id, attempt.page_id, attempt.score, attempt.total_questions
        );

        Ok(QuizSubmitOutcome {
            attempt,
            progress: outcome,
        })
    }

    /// Record page visits for a section and re-evaluate its completion
    ///
    /// An empty `pages_visited` still runs the completion check, creating the
    /// completion row if it does not exist yet.
    pub async fn complete_section(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        module_id: u32,
        section_id: u32,
        pages_visited: &[u32],
    ) -> Result<ProgressOutcome> {
        let (module, section) = self.curriculum.require_section(module_id, section_id)?;

        if let Some(bad) = pages_visited.iter().find(|&&p| !section.has_page(p)) {
            return Err(Error::InvalidInput(format!(
                "Module {} section {} has no page {} (pages 1..={})",
                module.id, section.id, bad, section.pages
            )));
        }

        let mut tx = pool.begin().await?;

        let progress = ensure_module_progress(&mut tx, user_id, module.id).await?;
        check_unlocked(&progress, section.id)?;

        for &page in pages_visited {
            record_page_visit(&mut tx, user_id, module.id, section.id, page).await?;
        }

        let outcome = self.settle_section(&mut tx, user_id, module, section).await?;
        tx.commit().await?;

        debug!(
            "Section check: user={} module={} section={} complete={}",
            user_id, module.id, section.id, outcome.section.is_complete
        );

        Ok(outcome)
    }

    /// Read-only progress view for one module
    pub async fn module_progress(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        module_id: u32,
    ) -> Result<ModuleProgressView> {
        let module = self
            .curriculum
            .module(module_id)
            .ok_or_else(|| Error::NotFound(format!("Module {}", module_id)))?;

        let progress = sqlx::query_as::<_, UserModuleProgress>(
            r#"
            SELECT user_id, module_id, unlocked_section, completed, completed_at, updated_at
            FROM user_module_progress
            WHERE user_id = ? AND module_id = ?
            "#,
        )
        .bind(user_id)
        .bind(module.id)
        .fetch_optional(pool)
        .await?;

        let completions = sqlx::query_as::<_, SectionCompletion>(
            r#"
            SELECT user_id, module_id, section_id, pages_visited, total_pages,
                   quizzes_completed, quizzes_total, is_complete, completed_at, updated_at
            FROM section_completions
            WHERE user_id = ? AND module_id = ?
            ORDER BY section_id ASC
            "#,
        )
        .bind(user_id)
        .bind(module.id)
        .fetch_all(pool)
        .await?;

        let unlocked_section = progress.as_ref().map(|p| p.unlocked_section).unwrap_or(1);
        let completed = progress.as_ref().map(|p| p.completed).unwrap_or(false);

        let sections = module
            .sections
            .iter()
            .map(|section| SectionProgressView {
                section_id: section.id,
                title: section.title.clone(),
                pages: section.pages,
                quiz_pages: section.quiz_pages.clone(),
                unlocked: section.id <= unlocked_section,
                completion: completions
                    .iter()
                    .find(|c| c.section_id == section.id)
                    .cloned(),
            })
            .collect();

        Ok(ModuleProgressView {
            module_id: module.id,
            title: module.title.clone(),
            unlocked_section,
            completed,
            sections,
        })
    }

    /// Progress views for every module of the course
    pub async fn course_progress(
        &self,
        pool: &SqlitePool,
        user_id: &str,
    ) -> Result<Vec<ModuleProgressView>> {
        let mut views = Vec::with_capacity(self.curriculum.modules.len());
        for module in &self.curriculum.modules {
            views.push(self.module_progress(pool, user_id, module.id).await?);
        }
        Ok(views)
    }

    /// Delete a user's progress for one module, or for every module when `None`
    pub async fn reset_progress(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        module_id: Option<u32>,
    ) -> Result<ResetSummary> {
        if let Some(id) = module_id {
            if self.curriculum.module(id).is_none() {
                return Err(Error::NotFound(format!("Module {}", id)));
            }
        }

        let mut tx = pool.begin().await?;

        let attempts_deleted = delete_scoped(&mut tx, "quiz_attempts", user_id, module_id).await?;
        let visits_deleted = delete_scoped(&mut tx, "page_visits", user_id, module_id).await?;
        let completions_deleted =
            delete_scoped(&mut tx, "section_completions", user_id, module_id).await?;
        let modules_reset =
            delete_scoped(&mut tx, "user_module_progress", user_id, module_id).await?;

        tx.commit().await?;

        info!(
            "Progress reset: user={} module={:?} attempts={} visits={}",
            user_id, module_id, attempts_deleted, visits_deleted
        );

        Ok(ResetSummary {
            attempts_deleted,
            visits_deleted,
            completions_deleted,
            modules_reset,
        })
    }

    /// Admin bulk delete of quiz attempts, allowing the quizzes to be retaken
    ///
    /// Completion rows in scope are rebuilt from the remaining visits and
    /// attempts. Unlocks already granted are kept.
    pub async fn delete_attempts(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        module_id: Option<u32>,
    ) -> Result<u64> {
        if let Some(id) = module_id {
            if self.curriculum.module(id).is_none() {
                return Err(Error::NotFound(format!("Module {}", id)));
            }
        }

        let mut tx = pool.begin().await?;

        let deleted = delete_scoped(&mut tx, "quiz_attempts", user_id, module_id).await?;
        delete_scoped(&mut tx, "section_completions", user_id, module_id).await?;

        let modules: Vec<&ModuleSpec> = match module_id {
            Some(id) => self.curriculum.module(id).into_iter().collect(),
            None => self.curriculum.modules.iter().collect(),
        };
        for module in modules {
            for section in &module.sections {
                if has_activity(&mut tx, user_id, module.id, section.id).await? {
                    self.settle_section(&mut tx, user_id, module, section).await?;
                }
            }
        }

        tx.commit().await?;

        info!(
            "Deleted {} quiz attempts for user={} module={:?}",
            deleted, user_id, module_id
        );
        Ok(deleted)
    }

    /// Recompute every stored section against the current curriculum
    ///
    /// Used after the quiz table changes. Sections that now meet their totals
    /// flip to complete and unlock the next section; nothing is re-locked.
    /// With `dry_run` each change is rolled back after being counted.
    pub async fn recompute_all(&self, pool: &SqlitePool, dry_run: bool) -> Result<BackfillReport> {
        let keys: Vec<(String, u32, u32)> = sqlx::query_as(
            r#"
            SELECT user_id, module_id, section_id FROM section_completions
            UNION
            SELECT user_id, module_id, section_id FROM quiz_attempts
            UNION
            SELECT user_id, module_id, section_id FROM page_visits
            ORDER BY 1, 2, 3
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut report = BackfillReport {
            dry_run,
            ..BackfillReport::default()
        };

        for (user_id, module_id, section_id) in keys {
            let Ok((module, section)) = self.curriculum.require_section(module_id, section_id)
            else {
                warn!(
                    "Skipping user={} module={} section={}: not in curriculum",
                    user_id, module_id, section_id
                );
                report.sections_skipped += 1;
                continue;
            };

            let mut tx = pool.begin().await?;
            let outcome = self.settle_section(&mut tx, &user_id, module, section).await?;
            if dry_run {
                tx.rollback().await?;
            } else {
                tx.commit().await?;
            }

            report.sections_examined += 1;
            if outcome.newly_completed {
                report.sections_newly_completed += 1;
                info!(
                    "Backfill completed user={} module={} section={} (unlocked {})",
                    user_id, module_id, section_id, outcome.unlocked_section
                );
            }
        }

        Ok(report)
    }

    /// Recompute a section, then apply the unlock and module completion steps
    async fn settle_section(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        module: &ModuleSpec,
        section: &SectionSpec,
    ) -> Result<ProgressOutcome> {
        ensure_module_progress(conn, user_id, module.id).await?;

        let (completion, newly_completed) =
            recompute_section(conn, user_id, module.id, section).await?;

        if completion.is_complete {
            apply_unlock(conn, user_id, module, section.id).await?;
        }
        let progress = refresh_module_completion(conn, user_id, module).await?;

        Ok(ProgressOutcome {
            section: completion,
            newly_completed,
            unlocked_section: progress.unlocked_section,
            module_completed: progress.completed,
        })
    }
}

fn check_unlocked(progress: &UserModuleProgress, section_id: u32) -> Result<()> {
    if section_id > progress.unlocked_section {
        return Err(Error::Forbidden(format!(
            "Module {} section {} is locked (unlocked through section {})",
            progress.module_id, section_id, progress.unlocked_section
        )));
    }
    Ok(())
}

/// Create the module progress row (section 1 unlocked) if absent and return it
async fn ensure_module_progress(
    conn: &mut SqliteConnection,
    user_id: &str,
    module_id: u32,
) -> Result<UserModuleProgress> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO user_module_progress
            (user_id, module_id, unlocked_section, completed, updated_at)
        VALUES (?, ?, 1, 0, ?)
        "#,
    )
    .bind(user_id)
    .bind(module_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    load_module_progress(conn, user_id, module_id).await
}

async fn load_module_progress(
    conn: &mut SqliteConnection,
    user_id: &str,
    module_id: u32,
) -> Result<UserModuleProgress> {
    let progress = sqlx::query_as::<_, UserModuleProgress>(
        r#"
        SELECT user_id, module_id, unlocked_section, completed, completed_at, updated_at
        FROM user_module_progress
        WHERE user_id = ? AND module_id = ?
        "#,
    )
    .bind(user_id)
    .bind(module_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(progress)
}

async fn insert_attempt(conn: &mut SqliteConnection, attempt: &QuizAttempt) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO quiz_attempts
            (id, user_id, module_id, section_id, page_id, score, total_questions, quiz_type, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&attempt.id)
    .bind(&attempt.user_id)
    .bind(attempt.module_id)
    .bind(attempt.section_id)
    .bind(attempt.page_id)
    .bind(attempt.score)
    .bind(attempt.total_questions)
    .bind(&attempt.quiz_type)
    .bind(attempt.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if Error::is_unique_violation(&e) {
            Error::Conflict(format!(
                "Quiz for module {} section {} page {} already submitted",
                attempt.module_id, attempt.section_id, attempt.page_id
            ))
        } else {
            Error::Database(e)
        }
    })?;

    Ok(())
}

async fn record_page_visit(
    conn: &mut SqliteConnection,
    user_id: &str,
    module_id: u32,
    section_id: u32,
    page_id: u32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO page_visits (user_id, module_id, section_id, page_id, visited_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(module_id)
    .bind(section_id)
    .bind(page_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn has_activity(
    conn: &mut SqliteConnection,
    user_id: &str,
    module_id: u32,
    section_id: u32,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM page_visits WHERE user_id = ? AND module_id = ? AND section_id = ?
            UNION ALL
            SELECT 1 FROM quiz_attempts WHERE user_id = ? AND module_id = ? AND section_id = ?
        )
        "#,
    )
    .bind(user_id)
    .bind(module_id)
    .bind(section_id)
    .bind(user_id)
    .bind(module_id)
    .bind(section_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Count visits and attempts that the curriculum recognizes and upsert the completion row
///
/// Completion is sticky: once complete, a later recount never clears it.
/// Returns the row and whether this call flipped it to complete.
async fn recompute_section(
    conn: &mut SqliteConnection,
    user_id: &str,
    module_id: u32,
    section: &SectionSpec,
) -> Result<(SectionCompletion, bool)> {
    let visited: Vec<u32> = sqlx::query_scalar(
        "SELECT page_id FROM page_visits WHERE user_id = ? AND module_id = ? AND section_id = ?",
    )
    .bind(user_id)
    .bind(module_id)
    .bind(section.id)
    .fetch_all(&mut *conn)
    .await?;

    let attempted: Vec<u32> = sqlx::query_scalar(
        "SELECT page_id FROM quiz_attempts WHERE user_id = ? AND module_id = ? AND section_id = ?",
    )
    .bind(user_id)
    .bind(module_id)
    .bind(section.id)
    .fetch_all(&mut *conn)
    .await?;

    let pages_visited = visited.iter().filter(|&&p| section.has_page(p)).count() as u32;
    let quizzes_completed = attempted.iter().filter(|&&p| section.is_quiz_page(p)).count() as u32;
    let total_pages = section.pages;
    let quizzes_total = section.quizzes_total();

    let previous: Option<(bool, Option<chrono::DateTime<Utc>>)> = sqlx::query_as(
        r#"
        SELECT is_complete, completed_at FROM section_completions
        WHERE user_id = ? AND module_id = ? AND section_id = ?
        "#,
    )
    .bind(user_id)
    .bind(module_id)
    .bind(section.id)
    .fetch_optional(&mut *conn)
    .await?;

    let was_complete = previous.as_ref().map(|(c, _)| *c).unwrap_or(false);
    let meets_totals = pages_visited >= total_pages && quizzes_completed >= quizzes_total;
    let is_complete = was_complete || meets_totals;
    let newly_completed = is_complete && !was_complete;

    let now = Utc::now();
    let completed_at = match previous.and_then(|(_, at)| at) {
        Some(at) => Some(at),
        None if is_complete => Some(now),
        None => None,
    };

    let completion = SectionCompletion {
        user_id: user_id.to_string(),
        module_id,
        section_id: section.id,
        pages_visited,
        total_pages,
        quizzes_completed,
        quizzes_total,
        is_complete,
        completed_at,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO section_completions (
            user_id, module_id, section_id, pages_visited, total_pages,
            quizzes_completed, quizzes_total, is_complete, completed_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, module_id, section_id) DO UPDATE SET
            pages_visited = excluded.pages_visited,
            total_pages = excluded.total_pages,
            quizzes_completed = excluded.quizzes_completed,
            quizzes_total = excluded.quizzes_total,
            is_complete = excluded.is_complete,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&completion.user_id)
    .bind(completion.module_id)
    .bind(completion.section_id)
    .bind(completion.pages_visited)
    .bind(completion.total_pages)
    .bind(completion.quizzes_completed)
    .bind(completion.quizzes_total)
    .bind(completion.is_complete)
    .bind(completion.completed_at)
    .bind(completion.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok((completion, newly_completed))
}

/// Raise `unlocked_section` past a completed section, capped at the module size
async fn apply_unlock(
    conn: &mut SqliteConnection,
    user_id: &str,
    module: &ModuleSpec,
    completed_section: u32,
) -> Result<()> {
    let target = (completed_section + 1).min(module.section_count());

    sqlx::query(
        r#"
        UPDATE user_module_progress
        SET unlocked_section = MAX(unlocked_section, ?), updated_at = ?
        WHERE user_id = ? AND module_id = ? AND unlocked_section < ?
        "#,
    )
    .bind(target)
    .bind(Utc::now())
    .bind(user_id)
    .bind(module.id)
    .bind(target)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Mark the module complete once every section is complete; never reverts
async fn refresh_module_completion(
    conn: &mut SqliteConnection,
    user_id: &str,
    module: &ModuleSpec,
) -> Result<UserModuleProgress> {
    let complete_sections: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM section_completions
        WHERE user_id = ? AND module_id = ? AND is_complete = 1 AND section_id <= ?
        "#,
    )
    .bind(user_id)
    .bind(module.id)
    .bind(module.section_count())
    .fetch_one(&mut *conn)
    .await?;

    if complete_sections >= i64::from(module.section_count()) {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE user_module_progress
            SET completed = 1, completed_at = ?, updated_at = ?
            WHERE user_id = ? AND module_id = ? AND completed = 0
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(module.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            info!("Module {} completed by user {}", module.id, user_id);
        }
    }

    load_module_progress(conn, user_id, module.id).await
}

/// Delete one user's rows from a progression table, optionally for one module
async fn delete_scoped(
    conn: &mut SqliteConnection,
    table: &'static str,
    user_id: &str,
    module_id: Option<u32>,
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE user_id = ? AND (? IS NULL OR module_id = ?)",
        table
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(module_id)
        .bind(module_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
