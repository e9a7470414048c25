//! Progression backfill
//!
//! Recomputes every section completion from stored page visits and quiz
//! attempts against the current curriculum, then reapplies unlocks and
//! module completion. Run after editing the curriculum.
//!
//! **Usage:**
//! ```bash
//! bizen-backfill [--dry-run] [--database-path <FILE>] [--curriculum-path <FILE>]
//! ```
//!
//! Completion is never revoked and unlocks are never lowered.

use std::sync::Arc;

use anyhow::{Context, Result};
use bizen_api::cli::{env_filter, BackfillArgs};
use bizen_common::config::{log_config_source, StoragePaths};
use bizen_common::db::init_database;
use bizen_common::Progression;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BackfillArgs::parse();

    let dry_run = args.dry_run;
    // Resolved before tracing so the configured log level applies
    let paths = StoragePaths::resolve(&args.common.into_overrides())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(env_filter(&paths.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("BIZEN progression backfill v{}", env!("CARGO_PKG_VERSION"));
    log_config_source(paths.config_file.as_deref());

    let curriculum = paths.load_curriculum().context("Failed to load curriculum")?;

    info!("Database path: {}", paths.database_path.display());
    let pool = init_database(&paths.database_path)
        .await
        .context("Failed to open database")?;

    let progression = Progression::new(Arc::new(curriculum));
    let report = progression.recompute_all(&pool, dry_run).await?;

    info!(
        "{}: {} sections examined, {} newly completed, {} skipped (not in curriculum)",
        if report.dry_run { "Dry run" } else { "Backfill complete" },
        report.sections_examined,
        report.sections_newly_completed,
        report.sections_skipped
    );

    pool.close().await;
    Ok(())
}
