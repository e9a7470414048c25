//! Configuration file loading tests
//!
//! Uses tempfile for on-disk config and curriculum files.

use bizen_common::config::{Config, ConfigOverrides, IdentityConfig, StoragePaths};
use std::io::Write;
use std::path::PathBuf;

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_explicit_config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "config.toml",
        r#"
        bind_addr = "127.0.0.1:6100"
        log_level = "warn"

        [identity]
        url = "https://auth.example.com"
        api_key = "anon"
        "#,
    );

    let config = Config::resolve(ConfigOverrides {
        config_file: Some(path.clone()),
        ..ConfigOverrides::default()
    })
    .unwrap();

    assert_eq!(config.bind_addr.port(), 6100);
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.config_file, Some(path));
    assert!(matches!(config.identity, IdentityConfig::Hosted { .. }));
}

#[test]
fn test_storage_paths_read_log_level_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "config.toml",
        r#"
        database_path = "/srv/bizen/bizen.db"
        log_level = "debug"
        "#,
    );

    let paths = StoragePaths::resolve(&ConfigOverrides {
        config_file: Some(path.clone()),
        ..ConfigOverrides::default()
    })
    .unwrap();

    assert_eq!(paths.log_level, "debug");
    assert_eq!(paths.database_path, PathBuf::from("/srv/bizen/bizen.db"));
    assert_eq!(paths.config_file, Some(path));
}

#[test]
fn test_explicit_missing_config_file_is_error() {
    let result = Config::resolve(ConfigOverrides {
        config_file: Some(PathBuf::from("/nonexistent/bizen/config.toml")),
        ..ConfigOverrides::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_malformed_config_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "config.toml", "bind_addr = [not toml");

    let result = Config::resolve(ConfigOverrides {
        config_file: Some(path),
        ..ConfigOverrides::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_curriculum_override_file() {
    let dir = tempfile::tempdir().unwrap();
    let curriculum = write_file(
        &dir,
        "curriculum.toml",
        r#"
        [[modules]]
        id = 1
        title = "Pilot"
          [[modules.sections]]
          id = 1
          title = "Only"
          pages = 2
          quiz_pages = [2]
        "#,
    );
    let path = write_file(
        &dir,
        "config.toml",
        r#"
        [identity]
        mode = "static"
        "#,
    );

    let config = Config::resolve(ConfigOverrides {
        config_file: Some(path),
        curriculum_path: Some(curriculum),
        ..ConfigOverrides::default()
    })
    .unwrap();

    let loaded = config.load_curriculum().unwrap();
    assert_eq!(loaded.modules.len(), 1);
    assert_eq!(loaded.quizzes_total(1, 1), 1);
}

#[test]
fn test_builtin_curriculum_when_unset() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "config.toml", "[identity]\nmode = \"static\"\n");

    let config = Config::resolve(ConfigOverrides {
        config_file: Some(path),
        ..ConfigOverrides::default()
    })
    .unwrap();

    assert!(config.curriculum_path.is_none());
    assert_eq!(config.load_curriculum().unwrap().modules.len(), 5);
}
