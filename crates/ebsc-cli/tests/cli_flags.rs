use std::fs;
use std::process::{Command, Output};
use tempfile::tempdir;

fn ebsc(args: &[&str], cwd: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ebsc"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn unknown_tier_exits_with_status_one() {
    let tmp = tempdir().unwrap();
    let output = ebsc(&["--env", "staging"], tmp.path());

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--env"), "stderr: {stderr}");
    assert!(!tmp.path().join("backup").exists());
}

#[test]
fn empty_region_exits_with_status_one() {
    let tmp = tempdir().unwrap();
    let output = ebsc(&["--region", ""], tmp.path());

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid region"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("starting backup"));
}

#[test]
fn empty_region_from_config_is_rejected() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("ebsc.toml");
    fs::write(&config, "[aws]\nregion = \"\"\n").unwrap();

    let output = ebsc(&["--config", config.to_str().unwrap()], tmp.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid region"));
}

#[test]
fn unreadable_config_exits_with_status_one() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("missing.toml");

    let output = ebsc(&["--config", missing.to_str().unwrap()], tmp.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read config"));
}

#[test]
fn partial_static_credentials_are_rejected_before_backup_starts() {
    let tmp = tempdir().unwrap();
    let config = tmp.path().join("ebsc.toml");
    fs::write(&config, "[aws]\naccess_key = \"AKIA\"\n").unwrap();

    let output = ebsc(&["--config", config.to_str().unwrap()], tmp.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("must be set together"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("starting backup"));
}

#[test]
fn help_exits_successfully() {
    let tmp = tempdir().unwrap();
    let output = ebsc(&["--help"], tmp.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--env"));
    assert!(stdout.contains("--keep-going"));
}
