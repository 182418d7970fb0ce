use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CYCLIC: &str = r#"
[[package]]
name = "A"
version = "1.0"
dependencies = [{ id = "B", version = "2.0" }]

[[package]]
name = "B"
version = "2.0"
dependencies = [{ id = "A", version = "1.0" }]
"#;

const DOWNGRADE: &str = r#"
[[package]]
name = "A"
version = "1.0"
dependencies = [{ id = "B", version = "2.0" }, { id = "C", version = "1.0" }]

[[package]]
name = "B"
version = "2.0"
dependencies = [{ id = "C", version = "2.0" }]

[[package]]
name = "C"
version = "1.0"

[[package]]
name = "C"
version = "2.0"
"#;

const CLEAN: &str = r#"
[[package]]
name = "A"
version = "1.0"
dependencies = [{ id = "B", version = "1.0" }]

[[package]]
name = "B"
version = "1.0"
"#;

fn trellis_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("trellis").unwrap();
    cmd.env("HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_analyze_clean_graph() {
    let tmp = TempDir::new().unwrap();
    let universe = write(&tmp, "universe.toml", CLEAN);

    trellis_cmd(&tmp)
        .arg("analyze")
        .arg(&universe)
        .arg("A")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No downgrades, version conflicts or cycles.",
        ))
        .stderr(predicate::str::contains("Analyzed"));
}

#[test]
fn test_analyze_cycle_fails_by_default() {
    let tmp = TempDir::new().unwrap();
    let universe = write(&tmp, "universe.toml", CYCLIC);

    trellis_cmd(&tmp)
        .arg("analyze")
        .arg(&universe)
        .arg("A")
        .assert()
        .failure()
        .stdout(predicate::str::contains("A 1.0.0 -> B 2.0.0 -> A (>= 1.0.0)"))
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("cycles: 1"))
        .stderr(predicate::str::contains("Policy violation"));
}

#[test]
fn test_analyze_policy_from_config_file() {
    let tmp = TempDir::new().unwrap();
    let universe = write(&tmp, "universe.toml", CYCLIC);
    let config = write(&tmp, "config.toml", "[policy]\ncycles = \"warn\"\n");

    trellis_cmd(&tmp)
        .arg("analyze")
        .arg(&universe)
        .arg("A")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cycles (1):"))
        .stderr(predicate::str::contains("cycles: 1"));
}

#[test]
fn test_analyze_policy_from_home_config() {
    let tmp = TempDir::new().unwrap();
    let universe = write(&tmp, "universe.toml", CYCLIC);
    fs::create_dir_all(tmp.path().join(".trellis")).unwrap();
    write(&tmp, ".trellis/config.toml", "[policy]\ncycles = \"ignore\"\n");

    trellis_cmd(&tmp)
        .arg("analyze")
        .arg(&universe)
        .arg("A")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cycles").not());
}

#[test]
fn test_analyze_downgrade_warns() {
    let tmp = TempDir::new().unwrap();
    let universe = write(&tmp, "universe.toml", DOWNGRADE);

    trellis_cmd(&tmp)
        .arg("analyze")
        .arg(&universe)
        .arg("A")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "A 1.0.0 -> B 2.0.0 -> C (>= 2.0.0) downgraded to A 1.0.0 -> C 1.0.0",
        ))
        .stderr(predicate::str::contains("downgrades: 1"));
}

#[test]
fn test_analyze_unresolved_fails_by_default() {
    let tmp = TempDir::new().unwrap();
    let universe = write(
        &tmp,
        "universe.toml",
        &CLEAN.replace(r#"id = "B""#, r#"id = "Gone""#),
    );

    trellis_cmd(&tmp)
        .arg("analyze")
        .arg(&universe)
        .arg("A")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unresolved (1):"))
        .stdout(predicate::str::contains("A 1.0.0 -> Gone (>= 1.0.0)"));
}

#[test]
fn test_analyze_bad_config_fails() {
    let tmp = TempDir::new().unwrap();
    let universe = write(&tmp, "universe.toml", CLEAN);
    let config = write(&tmp, "config.toml", "[policy]\ncycles = \"loud\"\n");

    trellis_cmd(&tmp)
        .arg("analyze")
        .arg(&universe)
        .arg("A")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}
