//! Integration tests for `stackyard config`.

mod common;

use predicates::prelude::*;

use common::TestProject;

#[tokio::test]
async fn test_config_path_follows_env() {
    let project = TestProject::new();

    project
        .cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(project.config_path().display().to_string()));
}

#[tokio::test]
async fn test_config_show_defaults_when_missing() {
    let project = TestProject::new();

    project
        .cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("file not found, showing defaults"))
        .stdout(predicate::str::contains("[resolution]"))
        .stdout(predicate::str::contains("strict = false"));
}

#[tokio::test]
async fn test_config_init_then_refuses_overwrite() {
    let project = TestProject::new();

    project
        .cmd()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config"));
    assert!(project.config_path().exists());

    project
        .cmd()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    project.cmd().args(["config", "init", "--force"]).assert().success();
}

#[tokio::test]
async fn test_config_show_reads_file() {
    let project = TestProject::new();
    project.write_config("[resolution]\nstrict = true\nshell_timeout_secs = 5\n").await;

    project
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strict = true"))
        .stdout(predicate::str::contains("shell_timeout_secs = 5"))
        .stdout(predicate::str::contains("file not found").not());
}

#[tokio::test]
async fn test_config_rejects_unknown_keys() {
    let project = TestProject::new();
    project.write_config("[resolution]\nstrikt = true\n").await;

    project.cmd().args(["config", "show"]).assert().failure().code(1);
}

#[tokio::test]
async fn test_config_flag_overrides_env() {
    let project = TestProject::new();
    let other = project.path().join("elsewhere.toml");

    project
        .cmd()
        .args(["--config", other.to_str().unwrap(), "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere.toml"));
}
