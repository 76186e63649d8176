//! Integration tests for deckprep-cli.
//!
//! Note: Tests use `unwrap`/`expect` which is acceptable in test code.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use deckprep_core::document::PptxDeck;
use deckprep_core::document::SlideDeck;
use deckprep_core::test_utils::ZipTestBuilder;
use deckprep_core::test_utils::create_test_pptx;
use deckprep_core::test_utils::create_test_rar;
use deckprep_core::test_utils::create_test_zip;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn deckprep_cmd() -> Command {
    cargo_bin_cmd!("deckprep")
}

fn slide_count(path: &Path) -> usize {
    PptxDeck::parse(fs::read(path).unwrap())
        .unwrap()
        .slides()
        .len()
}

/// Inbox with one archive (`x/1.txt`, `x/2.txt`) and one 3-slide deck.
fn inbox() -> TempDir {
    let temp = TempDir::new().expect("failed to create temp dir");
    fs::write(
        temp.path().join("a.zip"),
        create_test_zip(&[("x/1.txt", "one"), ("x/2.txt", "two")]),
    )
    .unwrap();
    fs::write(temp.path().join("deck.pptx"), create_test_pptx(3)).unwrap();
    temp
}

#[test]
fn test_version_flag() {
    deckprep_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("deckprep"));
}

#[test]
fn test_run_help() {
    deckprep_cmd()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--until-stable"))
        .stdout(predicate::str::contains("--delete"));
}

#[test]
fn test_run_processes_inbox() {
    let temp = inbox();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--delete")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run complete"));

    assert!(!temp.path().join("a.zip").exists());
    assert_eq!(fs::read_to_string(temp.path().join("x/1.txt")).unwrap(), "one");
    assert_eq!(slide_count(&temp.path().join("deck.pptx")), 2);
    assert!(!temp.path().join("deck.pptx.bak").exists());
}

#[test]
fn test_run_keeps_archives_by_default() {
    let temp = inbox();

    deckprep_cmd().arg("run").arg(temp.path()).assert().success();

    assert!(temp.path().join("a.zip").exists());
    assert!(temp.path().join("x/2.txt").exists());
}

#[test]
fn test_run_json_output() {
    let temp = inbox();

    let output = deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("invalid JSON output");
    assert_eq!(json["operation"], "run");
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["archives"]["succeeded"], 1);
    assert_eq!(json["data"]["documents"]["succeeded"], 1);
    assert_eq!(json["data"]["units"].as_array().unwrap().len(), 2);
}

#[test]
fn test_unit_failure_exit_code() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("broken.pptx"), b"not a deck").unwrap();
    fs::write(temp.path().join("good.pptx"), create_test_pptx(2)).unwrap();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Failures:"))
        .stdout(predicate::str::contains("broken.pptx"));

    assert_eq!(slide_count(&temp.path().join("good.pptx")), 1);
    assert_eq!(fs::read(temp.path().join("broken.pptx")).unwrap(), b"not a deck");
}

#[test]
fn test_unit_failure_json_status() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("broken.zip"), b"not a zip").unwrap();

    let output = deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--json")
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("invalid JSON output");
    assert_eq!(json["status"], "partial");
    let unit = &json["data"]["units"][0];
    assert_eq!(unit["outcome"], "failed");
    assert_eq!(unit["kind"], "archive");
    assert!(unit["reason"].is_string());
}

#[test]
fn test_missing_directory_is_setup_error() {
    let temp = TempDir::new().unwrap();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path().join("missing"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Directory not found"))
        .stderr(predicate::str::contains("HINT"));
}

#[test]
fn test_invalid_target_is_setup_error() {
    let temp = inbox();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--target")
        .arg(temp.path().join("nope"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--target"));

    assert!(temp.path().join("a.zip").exists());
    assert_eq!(slide_count(&temp.path().join("deck.pptx")), 3);
}

#[test]
fn test_strict_conflict_fails_archive() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "existing").unwrap();
    fs::write(temp.path().join("a.zip"), create_test_zip(&[("a.txt", "incoming")])).unwrap();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--strict")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("refusing to overwrite"));

    assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "existing");
}

#[test]
fn test_skip_slides() {
    let temp = inbox();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--skip-slides")
        .assert()
        .success();

    assert!(temp.path().join("x/1.txt").exists());
    assert_eq!(slide_count(&temp.path().join("deck.pptx")), 3);
}

#[test]
fn test_parallel_jobs() {
    let temp = TempDir::new().unwrap();
    for n in 0..5 {
        fs::write(temp.path().join(format!("deck{n}.pptx")), create_test_pptx(2)).unwrap();
    }

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .args(["-j", "3"])
        .assert()
        .success();

    for n in 0..5 {
        assert_eq!(slide_count(&temp.path().join(format!("deck{n}.pptx"))), 1);
    }
}

#[test]
fn test_quiet_mode_success_prints_nothing() {
    let temp = inbox();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_verbose_lists_conflicts() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "existing").unwrap();
    fs::write(temp.path().join("a.zip"), create_test_zip(&[("a.txt", "incoming")])).unwrap();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--verbose")
        .assert()
        .success()
        .stdout(predicate::str::contains("conflict in"))
        .stdout(predicate::str::contains("overwrite"));

    assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "incoming");
}

#[test]
fn test_skipped_symlink_reported_as_warning() {
    let temp = TempDir::new().unwrap();
    let bytes = ZipTestBuilder::new()
        .add_symlink("link", "/etc/passwd")
        .add_file("a.txt", b"a")
        .build();
    fs::write(temp.path().join("a.zip"), bytes).unwrap();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Warnings:   1 unit(s)"));

    assert!(temp.path().join("a.txt").exists());
    assert!(fs::symlink_metadata(temp.path().join("link")).is_err());

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--verbose")
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped symlink entry link"));
}

#[test]
fn test_into_stem_extracts_beside_archive() {
    let temp = inbox();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--into-stem")
        .assert()
        .success();

    assert_eq!(fs::read_to_string(temp.path().join("a/x/1.txt")).unwrap(), "one");
    assert!(!temp.path().join("x").exists());
}

#[test]
fn test_run_extracts_rar_archive() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("pack.rar"),
        create_test_rar(&[("notes/a.txt", "alpha"), ("b.txt", "beta")]),
    )
    .unwrap();

    deckprep_cmd()
        .arg("run")
        .arg(temp.path())
        .arg("--delete")
        .assert()
        .success();

    assert_eq!(fs::read_to_string(temp.path().join("notes/a.txt")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "beta");
    assert!(!temp.path().join("pack.rar").exists());
}

#[test]
fn test_completion_bash() {
    deckprep_cmd()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deckprep"));
}
