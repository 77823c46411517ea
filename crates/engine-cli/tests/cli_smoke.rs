//! Smoke tests using assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_uci_quit_roundtrip() {
    let mut cmd = Command::cargo_bin("engine-cli").unwrap();
    cmd.write_stdin("uci\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("uciok"))
        .stdout(predicate::str::contains("id name RChess"));
}

#[test]
fn test_isready_before_position() {
    let mut cmd = Command::cargo_bin("engine-cli").unwrap();
    cmd.write_stdin("uci\nisready\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("readyok"));
}

#[test]
fn test_unknown_commands_are_ignored() {
    let mut cmd = Command::cargo_bin("engine-cli").unwrap();
    cmd.write_stdin("xyzzy\nuci\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("uciok"));
}
