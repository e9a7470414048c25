//! Configuration loading
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (clap `env` fallback on the same argument)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error unless it was named explicitly.
//!
//! Resolution runs before the tracing subscriber exists, so nothing here
//! logs; binaries report the outcome through [`log_config_source`].

use crate::curriculum::Curriculum;
use crate::identity::{HostedIdentity, IdentityProvider, IdentityUser, StaticIdentity};
use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5800";
pub const DEFAULT_COOKIE_NAME: &str = "bizen-access-token";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// How access tokens are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    Hosted,
    Static,
}

/// Token entry for `identity.mode = "static"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticUserEntry {
    pub token: String,
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityToml {
    pub mode: Option<IdentityMode>,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub cookie_name: Option<String>,
    pub users: Vec<StaticUserEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthToml {
    pub admin_emails: Vec<String>,
}

/// On-disk configuration file; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub curriculum_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub identity: IdentityToml,
    pub auth: AuthToml,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub curriculum_path: Option<PathBuf>,
    pub identity_url: Option<String>,
    pub identity_api_key: Option<String>,
    pub log_level: Option<String>,
}

/// Resolved identity settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityConfig {
    Hosted { url: String, api_key: String },
    Static { users: Vec<StaticUserEntry> },
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// File the settings were read from, if any
    pub config_file: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub curriculum_path: Option<PathBuf>,
    pub log_level: String,
    pub identity: IdentityConfig,
    pub cookie_name: String,
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Resolve configuration from overrides, the config file and defaults
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let source = locate_config_file(overrides.config_file.as_deref());
        let file = load_config_file(source.as_deref())?;
        let mut config = Self::merge(overrides, file)?;
        config.config_file = source;
        Ok(config)
    }

    /// Merge overrides on top of a parsed config file
    pub fn merge(overrides: ConfigOverrides, file: TomlConfig) -> Result<Self> {
        let bind_addr_str = overrides
            .bind_addr
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr_str
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind_addr '{}': {}", bind_addr_str, e)))?;

        let database_path = overrides
            .database_path
            .or(file.database_path)
            .unwrap_or_else(default_database_path);

        let curriculum_path = overrides.curriculum_path.or(file.curriculum_path);

        let log_level = overrides
            .log_level
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let mode = file.identity.mode.unwrap_or(IdentityMode::Hosted);
        let identity = match mode {
            IdentityMode::Hosted => {
                let url = overrides.identity_url.or(file.identity.url).ok_or_else(|| {
                    Error::Config("identity.url is required in hosted mode".to_string())
                })?;
                let api_key = overrides
                    .identity_api_key
                    .or(file.identity.api_key)
                    .ok_or_else(|| {
                        Error::Config("identity.api_key is required in hosted mode".to_string())
                    })?;
                IdentityConfig::Hosted { url, api_key }
            }
            IdentityMode::Static => IdentityConfig::Static {
                users: file.identity.users,
            },
        };

        let cookie_name = file
            .identity
            .cookie_name
            .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());

        let admin_emails = file
            .auth
            .admin_emails
            .into_iter()
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            config_file: None,
            bind_addr,
            database_path,
            curriculum_path,
            log_level,
            identity,
            cookie_name,
            admin_emails,
        })
    }

    /// Build the identity provider client
    pub fn build_identity(&self) -> Result<Arc<dyn IdentityProvider>> {
        match &self.identity {
            IdentityConfig::Hosted { url, api_key } => {
                info!("Identity provider: {}", url);
                Ok(Arc::new(HostedIdentity::new(url, api_key)?))
            }
            IdentityConfig::Static { users } => {
                if users.is_empty() {
                    warn!("Static identity mode with no users configured");
                } else {
                    warn!("Using static identity tokens ({} users)", users.len());
                }
                let identity = users.iter().fold(StaticIdentity::new(), |acc, entry| {
                    acc.with_user(
                        &entry.token,
                        IdentityUser {
                            id: entry.id.clone(),
                            email: entry.email.clone(),
                            display_name: entry.display_name.clone(),
                        },
                    )
                });
                Ok(Arc::new(identity))
            }
        }
    }

    /// Load the configured curriculum, or the compiled-in one
    pub fn load_curriculum(&self) -> Result<Curriculum> {
        StoragePaths {
            config_file: self.config_file.clone(),
            database_path: self.database_path.clone(),
            curriculum_path: self.curriculum_path.clone(),
            log_level: self.log_level.clone(),
        }
        .load_curriculum()
    }
}

/// Database and curriculum locations plus log level, without identity settings
///
/// Used by maintenance tools that never authenticate anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub config_file: Option<PathBuf>,
    pub database_path: PathBuf,
    pub curriculum_path: Option<PathBuf>,
    pub log_level: String,
}

impl StoragePaths {
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let source = locate_config_file(overrides.config_file.as_deref());
        let file = load_config_file(source.as_deref())?;
        Ok(Self {
            config_file: source,
            ..Self::merge(overrides, &file)
        })
    }

    pub fn merge(overrides: &ConfigOverrides, file: &TomlConfig) -> Self {
        Self {
            config_file: None,
            database_path: overrides
                .database_path
                .clone()
                .or_else(|| file.database_path.clone())
                .unwrap_or_else(default_database_path),
            curriculum_path: overrides
                .curriculum_path
                .clone()
                .or_else(|| file.curriculum_path.clone()),
            log_level: overrides
                .log_level
                .clone()
                .or_else(|| file.log_level.clone())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    pub fn load_curriculum(&self) -> Result<Curriculum> {
        match &self.curriculum_path {
            Some(path) => {
                info!("Loading curriculum: {}", path.display());
                Curriculum::load(path)
            }
            None => Curriculum::builtin(),
        }
    }
}

/// The named config file, else the default one if it exists
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_file().filter(|path| path.exists()),
    }
}

/// Parse the config file at `path`; no file yields an empty config
///
/// A named file that cannot be read is an error.
pub fn load_config_file(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) => TomlConfig::load(path),
        None => Ok(TomlConfig::default()),
    }
}

/// Report where configuration came from; call once tracing is installed
pub fn log_config_source(config_file: Option<&Path>) {
    match config_file {
        Some(path) => info!("Loaded config file: {}", path.display()),
        None => warn!("No config file found; using defaults"),
    }
}

/// `~/.config/bizen/config.toml` (platform config dir)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bizen").join("config.toml"))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bizen"))
        .unwrap_or_else(|| PathBuf::from("./bizen_data"))
        .join("bizen.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosted_file() -> TomlConfig {
        TomlConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            database_path = "/srv/bizen/bizen.db"

            [identity]
            url = "https://auth.example.com"
            api_key = "anon-key"

            [auth]
            admin_emails = [" Admin@Example.com "]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_file_values_used() {
        let config = Config::merge(ConfigOverrides::default(), hosted_file()).unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.database_path, PathBuf::from("/srv/bizen/bizen.db"));
        assert_eq!(config.cookie_name, DEFAULT_COOKIE_NAME);
        assert_eq!(config.admin_emails, vec!["admin@example.com".to_string()]);
        assert_eq!(
            config.identity,
            IdentityConfig::Hosted {
                url: "https://auth.example.com".to_string(),
                api_key: "anon-key".to_string(),
            }
        );
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = ConfigOverrides {
            bind_addr: Some("127.0.0.1:7000".to_string()),
            identity_url: Some("https://other.example.com".to_string()),
            log_level: Some("debug".to_string()),
            ..ConfigOverrides::default()
        };
        let config = Config::merge(overrides, hosted_file()).unwrap();
        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.log_level, "debug");
        assert!(matches!(
            config.identity,
            IdentityConfig::Hosted { ref url, .. } if url == "https://other.example.com"
        ));
    }

    #[test]
    fn test_hosted_mode_requires_url() {
        let err = Config::merge(ConfigOverrides::default(), TomlConfig::default()).unwrap_err();
        assert!(err.to_string().contains("identity.url"));
    }

    #[test]
    fn test_static_mode() {
        let file = TomlConfig::from_toml_str(
            r#"
            [identity]
            mode = "static"
            cookie_name = "sid"

            [[identity.users]]
            token = "dev-token"
            id = "dev"
            email = "dev@example.com"
            "#,
        )
        .unwrap();
        let config = Config::merge(ConfigOverrides::default(), file).unwrap();
        assert_eq!(config.cookie_name, "sid");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        match config.identity {
            IdentityConfig::Static { users } => assert_eq!(users[0].id, "dev"),
            other => panic!("unexpected identity config: {:?}", other),
        }
    }

    #[test]
    fn test_storage_paths_ignore_identity() {
        // No identity settings at all; the backfill tool must still resolve
        let file = TomlConfig::from_toml_str(r#"database_path = "/tmp/b.db""#).unwrap();
        let paths = StoragePaths::merge(&ConfigOverrides::default(), &file);
        assert_eq!(paths.database_path, PathBuf::from("/tmp/b.db"));
        assert_eq!(paths.curriculum_path, None);

        let overrides = ConfigOverrides {
            curriculum_path: Some(PathBuf::from("/etc/bizen/course.toml")),
            ..ConfigOverrides::default()
        };
        let paths = StoragePaths::merge(&overrides, &file);
        assert_eq!(paths.curriculum_path, Some(PathBuf::from("/etc/bizen/course.toml")));
    }

    #[test]
    fn test_storage_paths_log_level() {
        let file = TomlConfig::from_toml_str(r#"log_level = "warn""#).unwrap();
        let paths = StoragePaths::merge(&ConfigOverrides::default(), &file);
        assert_eq!(paths.log_level, "warn");

        let overrides = ConfigOverrides {
            log_level: Some("trace".to_string()),
            ..ConfigOverrides::default()
        };
        assert_eq!(StoragePaths::merge(&overrides, &file).log_level, "trace");

        let paths = StoragePaths::merge(&ConfigOverrides::default(), &TomlConfig::default());
        assert_eq!(paths.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_explicit_config_file_is_located_even_if_missing() {
        let named = PathBuf::from("/nonexistent/bizen.toml");
        assert_eq!(locate_config_file(Some(&named)), Some(named.clone()));
        assert!(load_config_file(Some(&named)).is_err());
        assert!(load_config_file(None).unwrap().log_level.is_none());
    }

    #[test]
    fn test_invalid_bind_addr() {
        let overrides = ConfigOverrides {
            bind_addr: Some("not-an-address".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(Config::merge(overrides, hosted_file()).is_err());
    }
}
