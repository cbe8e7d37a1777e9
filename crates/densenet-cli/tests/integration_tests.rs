use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("DenseNet-BC training on CIFAR-10 and ImageNet"));
}

#[test]
fn test_cli_summary_default() {
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Number of model parameters: 769162"))
        .stdout(predicate::str::contains("block3: 16 layers"));
}

#[test]
fn test_cli_summary_basic_blocks() {
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.args(["summary", "--layers", "40", "--reduce", "1.0", "--no-bottleneck"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Number of model parameters: 1059298"));
}

#[test]
fn test_cli_summary_rejects_uneven_depth() {
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.args(["summary", "--layers", "98"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_cli_train_help_lists_flags() {
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.args(["train", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-bottleneck"))
        .stdout(predicate::str::contains("--tensorboard"))
        .stdout(predicate::str::contains("--batch-size"));
}

#[test]
fn test_cli_train_rejects_bad_config() {
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.args(["train", "--batch-size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch size must be positive"));
}

#[test]
#[cfg(feature = "torch")]
fn test_cli_train_missing_cifar_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.arg("train")
        .arg("--cpu")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--runs-dir")
        .arg(dir.path().join("runs"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cifar-10-batches-bin"));
}

#[test]
#[cfg(not(feature = "torch"))]
fn test_cli_rust_log_silences_default_level() {
    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.env("RUST_LOG", "off")
        .arg("train")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Training requires").not());

    let mut cmd = Command::cargo_bin("densenet").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("train")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Training requires"));
}
