//! Tests for `syborg backup` failures that happen before any tool runs.

use crate::support::*;

#[test]
fn test_unknown_job_exits_with_two() {
    let t = Test::with_config(TWO_BY_TWO);

    let output = t.backup("weekly");
    assert_fatal(&output);
    assert_stderr_contains(&output, "syborg config has no section \"backup.weekly\"");
}

#[test]
fn test_missing_config_file_warns_and_fails_on_job() {
    let t = Test::new();

    let output = t.backup("nightly");
    assert_fatal(&output);
    assert_stderr_contains(&output, "config file not found");
    assert_stderr_contains(&output, "backup.nightly");
}

#[test]
fn test_empty_archive_list_is_fatal() {
    let t = Test::with_config("[backup.nightly]\narchives =\nrepositories = local\n");

    let output = t.backup("nightly");
    assert_fatal(&output);
    assert_stderr_contains(&output, "backup.nightly.archives is empty");
}

#[test]
fn test_job_without_agent_tool() {
    let t = Test::with_config(TWO_BY_TWO);

    let output = t
        .cmd()
        .env("PATH", t.dir.path())
        .args(["backup", "nightly"])
        .output()
        .unwrap();
    assert_fatal(&output);
    assert_stderr_contains(&output, "ssh-agent not found in PATH");
}

#[test]
fn test_verbose_still_fails_cleanly() {
    use predicates::prelude::*;

    let t = Test::with_config(TWO_BY_TWO);
    t.cmd()
        .args(["--verbose", "backup", "weekly"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("backup.weekly"));
}
