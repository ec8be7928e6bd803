//! Tests for `syborg completions`.

use crate::support::*;

#[test]
fn test_completions_bash_outputs_script() {
    let t = Test::new();

    let output = t.cmd().args(["completions", "bash"]).output().unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "_syborg");
}

#[test]
fn test_completions_need_no_config() {
    let t = Test::new();

    let output = t.cmd().args(["completions", "zsh"]).output().unwrap();
    assert_success(&output);
    assert!(!stderr(&output).contains("config file not found"));
}

#[test]
fn test_completions_ignore_malformed_config() {
    let t = Test::with_config("orphan = 1\n");

    let output = t.cmd().args(["completions", "bash"]).output().unwrap();
    assert_success(&output);

    let output = t.wrapped("list", "home");
    assert_fatal(&output);
    assert_stderr_contains(&output, "key outside of any section");
}

#[test]
fn test_completions_reject_unknown_shell() {
    let t = Test::new();

    let output = t.cmd().args(["completions", "tcsh"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_completions_fish_mentions_commands() {
    use predicates::prelude::*;

    let t = Test::new();
    t.cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backup").and(predicate::str::contains("mount")));
}
