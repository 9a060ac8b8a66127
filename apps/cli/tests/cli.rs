use assert_cmd::Command;
use predicates::prelude::*;

fn strata() -> Command {
    let mut cmd = Command::cargo_bin("strata").unwrap();
    cmd.env_remove("STRATA_CONFIG")
        .env_remove("STRATA_CREDENTIAL_KEY")
        .env_remove("STRATA_LOG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn check_reports_missing_config_file() {
    strata()
        .args(["check", "--config", "/nonexistent/strata.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/strata.toml"));
}

#[test]
fn check_without_names_summarizes_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.toml");
    std::fs::write(&path, "app_name = \"orders\"\nmode = \"test\"\n[redis.session]\nport = 6379\n")
        .unwrap();

    strata()
        .args(["check", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("orders (test mode)"))
        .stdout(predicate::str::contains("redis"));
}

#[test]
fn check_fails_on_cache_without_host() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.toml");
    std::fs::write(&path, "mode = \"test\"\n[redis.session]\nport = 6379\n").unwrap();

    strata()
        .args(["check", "--cache", "session", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL  cache session"))
        .stdout(predicate::str::contains("host"));
}

#[test]
fn check_builds_logger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.toml");
    std::fs::write(
        &path,
        format!("mode = \"test\"\n[log]\npath = '{}'\n", dir.path().display()),
    )
    .unwrap();

    strata()
        .args(["check", "--logger", "audit", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok    logger audit"));
    assert!(dir.path().join("audit.log").is_file());
}

#[test]
fn encrypt_requires_a_key() {
    strata()
        .args(["encrypt", "hunter2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("STRATA_CREDENTIAL_KEY"));
}

#[test]
fn encrypt_with_generated_key() {
    let output = strata().arg("generate-key").output().unwrap();
    assert!(output.status.success());
    let key = String::from_utf8(output.stdout).unwrap();

    strata()
        .args(["encrypt", "hunter2"])
        .env("STRATA_CREDENTIAL_KEY", key.trim())
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not())
        .stdout(predicate::str::contains("hunter2").not());
}
