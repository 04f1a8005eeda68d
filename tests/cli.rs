use assert_cmd::Command;
use predicates::prelude::*;

fn highlighter() -> Command {
    let mut cmd = Command::cargo_bin("highlighter").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn without_a_video_prints_usage() {
    highlighter()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_the_options() {
    highlighter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--format"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn missing_video_fails() {
    let dir = tempfile::tempdir().unwrap();

    highlighter()
        .arg(dir.path().join("no-such-video"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not open video"));
}

#[test]
fn video_without_frames_fails() {
    let dir = tempfile::tempdir().unwrap();

    highlighter()
        .arg(dir.path())
        .assert()
        .failure()
        .code(1);
}

#[test]
fn unreadable_config_fails() {
    let dir = tempfile::tempdir().unwrap();

    highlighter()
        .arg(dir.path())
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .assert()
        .failure()
        .code(1);
}
