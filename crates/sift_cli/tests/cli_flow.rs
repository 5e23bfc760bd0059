use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn cli_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sift"))
}

#[test]
fn single_segment_scan_and_get() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("store");
    let dir = dir.to_str().unwrap();
    let batch = tmp.path().join("b1.txt");
    fs::write(&batch, "set a 1\ndel b\nmerge c +5\n").unwrap();

    cli_cmd().args(["init", "--dir", dir]).assert().success();

    cli_cmd()
        .args(["write", "--dir", dir, "--input", batch.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 entries"));

    cli_cmd()
        .args(["scan", "--dir", dir])
        .assert()
        .success()
        .stdout(predicate::str::contains("a=1"))
        .stdout(predicate::str::contains("b (deleted)"))
        .stdout(predicate::str::contains("c !Merge operator missing"));

    cli_cmd()
        .args(["scan", "--dir", dir, "--raw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MERGE c +5"));

    cli_cmd()
        .args(["scan", "--dir", dir, "--start", "b", "--end", "c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("b (deleted)").and(predicate::str::contains("a=1").not()));

    cli_cmd()
        .args(["get", "--dir", dir, "--key", "a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1"));

    cli_cmd()
        .args(["get", "--dir", dir, "--key", "b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn stacked_segments_with_add_operator() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("store");
    let dir = dir.to_str().unwrap();
    let b1 = tmp.path().join("b1.txt");
    let b2 = tmp.path().join("b2.txt");
    fs::write(&b1, "set hits 10\nset gone x\n").unwrap();
    fs::write(&b2, "merge hits +5\ndel gone\n").unwrap();

    cli_cmd()
        .args(["init", "--dir", dir, "--merge-operator", "add"])
        .assert()
        .success();
    for b in [&b1, &b2] {
        cli_cmd()
            .args(["write", "--dir", dir, "--input", b.to_str().unwrap()])
            .assert()
            .success();
    }

    cli_cmd()
        .args(["scan", "--dir", dir])
        .assert()
        .success()
        .stdout(predicate::str::contains("hits=15"))
        .stdout(predicate::str::contains("gone (deleted)"));

    cli_cmd()
        .args(["info", "--dir", dir])
        .assert()
        .success()
        .stdout(predicate::str::contains("merge operator: add"))
        .stdout(predicate::str::contains("segments: 2"));
}

#[test]
fn unknown_merge_operator_fails_init() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().to_str().unwrap();
    cli_cmd()
        .args(["init", "--dir", dir, "--merge-operator", "mul"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown merge operator"));
}
