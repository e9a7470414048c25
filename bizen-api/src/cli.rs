//! Command-line arguments shared by the service and maintenance binaries

use bizen_common::config::ConfigOverrides;
use clap::{Args, Parser};
use std::path::PathBuf;

/// Settings common to every binary; each falls back to its env var
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Config file (default: ~/.config/bizen/config.toml)
    #[arg(short, long, env = "BIZEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "BIZEN_DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Course structure TOML (default: built-in curriculum)
    #[arg(long, env = "BIZEN_CURRICULUM_PATH")]
    pub curriculum_path: Option<PathBuf>,

    /// Log filter, e.g. `info` or `bizen_api=debug,tower_http=debug`
    #[arg(long, env = "BIZEN_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Command-line arguments for bizen-api
#[derive(Parser, Debug, Clone)]
#[command(name = "bizen-api")]
#[command(about = "HTTP API for the BIZEN learning platform")]
#[command(version)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Listen address, e.g. 127.0.0.1:5800
    #[arg(short, long, env = "BIZEN_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Identity provider base URL
    #[arg(long, env = "BIZEN_IDENTITY_URL")]
    pub identity_url: Option<String>,

    /// Identity provider API key
    #[arg(long, env = "BIZEN_IDENTITY_API_KEY", hide_env_values = true)]
    pub identity_api_key: Option<String>,
}

/// Command-line arguments for bizen-backfill
#[derive(Parser, Debug, Clone)]
#[command(name = "bizen-backfill")]
#[command(about = "Recompute section completions and unlocks against the current curriculum")]
#[command(version)]
pub struct BackfillArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,
}

impl CommonArgs {
    pub fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config,
            database_path: self.database_path,
            curriculum_path: self.curriculum_path,
            log_level: self.log_level,
            ..ConfigOverrides::default()
        }
    }
}

impl ServeArgs {
    pub fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            bind_addr: self.bind_addr,
            identity_url: self.identity_url,
            identity_api_key: self.identity_api_key,
            ..self.common.into_overrides()
        }
    }
}

/// Tracing filter: `RUST_LOG` wins, then the configured level
pub fn env_filter(log_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
}
