//! Unit tests for build manifest parsing and validation.

// Allow unwrap in tests - standard for test code
#![allow(clippy::unwrap_used)]

use glossa::config::{BuildConfig, SourceConfig};
use glossa_core::{GlossaError, SnapshotFormat};
use std::path::PathBuf;

fn source(name: &str, priority: u32) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        priority,
        path: PathBuf::from(format!("{}.json", name)),
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn test_full_manifest_parses() {
    let config = BuildConfig::parse(
        r#"
output = "out/glossa.msgpack.gz"
format = "msgpack.gz"
conflicts = "out/conflicts.json"
names = "out/names.redb"

[[sources]]
name = "glottolog"
priority = 10
path = "glottolog.json"
"#,
    )
    .unwrap();

    assert_eq!(config.output, PathBuf::from("out/glossa.msgpack.gz"));
    assert_eq!(config.snapshot_format().unwrap(), Some(SnapshotFormat::MsgpackGz));
    assert_eq!(config.conflicts, Some(PathBuf::from("out/conflicts.json")));
    assert_eq!(config.names, Some(PathBuf::from("out/names.redb")));
    assert_eq!(config.sources, vec![source("glottolog", 10)]);
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = BuildConfig::parse(
        r#"
output = "glossa.json"
colour = "blue"

[[sources]]
name = "a"
priority = 1
path = "a.json"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, GlossaError::Config(_)));
}

#[test]
fn test_missing_output_is_rejected() {
    let err = BuildConfig::parse(
        r#"
[[sources]]
name = "a"
priority = 1
path = "a.json"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, GlossaError::Config(_)));
}

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn test_empty_source_list_is_rejected() {
    let err = BuildConfig::parse(r#"output = "glossa.json""#).unwrap_err();
    assert!(err.to_string().contains("no [[sources]]"));
}

#[test]
fn test_duplicate_source_names_are_rejected() {
    let config = BuildConfig {
        output: PathBuf::from("glossa.json"),
        format: None,
        conflicts: None,
        names: None,
        sources: vec![source("iana", 10), source("iana", 20)],
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate source name 'iana'"));
}

#[test]
fn test_equal_priorities_are_allowed() {
    let config = BuildConfig {
        output: PathBuf::from("glossa.json"),
        format: Some("json".to_string()),
        conflicts: None,
        names: None,
        sources: vec![source("a", 10), source("b", 10)],
    };
    assert!(config.validate().is_ok());
    assert_eq!(config.pipeline().len(), 2);
}

#[test]
fn test_from_path_rebases_on_manifest_directory() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("glossa.toml");
    std::fs::write(
        &manifest,
        r#"
output = "data/glossa.json"

[[sources]]
name = "a"
priority = 1
path = "sources/a.json"
"#,
    )
    .unwrap();

    let config = BuildConfig::from_path(&manifest).unwrap();
    assert_eq!(config.output, dir.path().join("data/glossa.json"));
    assert_eq!(config.sources[0].path, dir.path().join("sources/a.json"));
}
