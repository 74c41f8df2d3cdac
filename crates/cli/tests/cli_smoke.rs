//! Smoke tests for the anyunit binary surface.

use assert_cmd::Command;
use predicates::prelude::*;

fn anyunit() -> Command {
    Command::cargo_bin("anyunit").unwrap()
}

#[test]
fn help_lists_subcommands() {
    anyunit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("call"));
}

#[test]
fn version_prints() {
    anyunit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("anyunit"));
}

#[test]
fn unknown_subcommand_fails() {
    anyunit().arg("frobnicate").assert().failure();
}

#[test]
fn start_outside_a_unit_fails() {
    let temp = tempfile::TempDir::new().unwrap();
    anyunit()
        .arg("--unit-dir")
        .arg(temp.path())
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("state file"));
}
