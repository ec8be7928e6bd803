//! Tests for error handling and CLI flags.

use crate::support::*;

#[test]
fn test_help_lists_commands() {
    let t = Test::new();

    let output = t.cmd().arg("--help").output().unwrap();
    assert_success(&output);
    for command in ["backup", "list", "info", "mount", "check", "completions"] {
        assert_stdout_contains(&output, command);
    }
}

#[test]
fn test_version_flag() {
    let t = Test::new();

    let output = t.cmd().arg("--version").output().unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "syborg");
}

#[test]
fn test_unknown_command_fails() {
    let t = Test::new();

    let output = t.cmd().arg("restore").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_repository_commands_need_a_name() {
    let t = Test::new();

    let output = t.cmd().arg("list").output().unwrap();
    assert!(!output.status.success());
    assert_stderr_contains(&output, "<REPOSITORY>");
}

#[test]
fn test_unknown_repository_is_fatal() {
    let t = Test::with_config(TWO_BY_TWO);

    let output = t.wrapped("info", "nowhere");
    assert_fatal(&output);
    assert_stderr_contains(&output, "syborg config has no section \"repository.nowhere\"");
}

#[test]
fn test_malformed_config_is_fatal() {
    let t = Test::with_config("archives = orphan\n");

    let output = t.backup("nightly");
    assert_fatal(&output);
    assert_stderr_contains(&output, "key outside of any section");
}

#[test]
fn test_config_flag_overrides_env() {
    let t = Test::with_config("[backup.other]\narchives = a\n");
    let alt = t.dir.path().join("alt.cfg");
    std::fs::write(&alt, TWO_BY_TWO).unwrap();

    let output = t
        .cmd()
        .arg("--config")
        .arg(&alt)
        .args(["backup", "missing"])
        .output()
        .unwrap();
    assert_fatal(&output);
    assert_stderr_contains(&output, "backup.missing");
    assert_stderr_contains(&output, "alt.cfg");
}
