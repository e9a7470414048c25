//! bizen-api - HTTP service for the BIZEN financial literacy platform
//!
//! Serves course progression (quiz submission, section completion and
//! unlocks), the discussion forum and admin tooling over JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use bizen_api::cli::{env_filter, ServeArgs};
use bizen_api::{build_router, AppState};
use bizen_common::config::{log_config_source, Config};
use bizen_common::db::init_database;
use bizen_common::Progression;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServeArgs::parse();

    // Resolved before tracing so the configured log level applies
    let config = Config::resolve(args.into_overrides()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting BIZEN API (bizen-api) v{}", env!("CARGO_PKG_VERSION"));
    log_config_source(config.config_file.as_deref());

    let curriculum = config
        .load_curriculum()
        .context("Failed to load curriculum")?;
    info!(
        "Curriculum: {} modules, {} sections",
        curriculum.modules.len(),
        curriculum.modules.iter().map(|m| m.sections.len()).sum::<usize>()
    );

    info!("Database path: {}", config.database_path.display());
    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let identity = config
        .build_identity()
        .context("Failed to initialize identity provider")?;

    let state = AppState::new(
        pool.clone(),
        Progression::new(Arc::new(curriculum)),
        identity,
        &config.cookie_name,
        config.admin_emails.clone(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("bizen-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
