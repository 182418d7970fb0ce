use std::io::Write;

use trellis_core::config::{GlobalConfig, Severity};

#[test]
fn defaults_when_empty() {
    let config = GlobalConfig::parse_toml("").unwrap();
    assert_eq!(config.walk.max_concurrent_lookups, 8);
    assert_eq!(config.solver.max_steps, None);
    assert_eq!(config.policy.downgrades, Severity::Warn);
    assert_eq!(config.policy.conflicts, Severity::Warn);
    assert_eq!(config.policy.cycles, Severity::Error);
    assert_eq!(config.policy.unresolved, Severity::Error);
}

#[test]
fn parses_all_sections() {
    let config = GlobalConfig::parse_toml(
        r#"
[walk]
max-concurrent-lookups = 2

[solver]
max-steps = 500

[policy]
downgrades = "error"
cycles = "ignore"
"#,
    )
    .unwrap();
    assert_eq!(config.walk.max_concurrent_lookups, 2);
    assert_eq!(config.solver.max_steps, Some(500));
    assert_eq!(config.policy.downgrades, Severity::Error);
    assert_eq!(config.policy.cycles, Severity::Ignore);
    assert_eq!(config.policy.conflicts, Severity::Warn);
}

#[test]
fn rejects_unknown_severity() {
    let err = GlobalConfig::parse_toml("[policy]\ncycles = \"loud\"\n").unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"), "got: {err}");
}

#[test]
fn from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[solver]\nmax-steps = 7").unwrap();
    let config = GlobalConfig::from_path(file.path()).unwrap();
    assert_eq!(config.solver.max_steps, Some(7));
}

#[test]
fn from_path_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GlobalConfig::from_path(&dir.path().join("missing.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config"), "got: {err}");
}
