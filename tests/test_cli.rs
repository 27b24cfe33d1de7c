// CLI integration tests for the tlog method binary

use std::process::Command;

/// Test that --help shows the program description and every option
#[test]
fn test_help_flag_shows_help_message() {
    let output = Command::new(env!("CARGO_BIN_EXE_tlog"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Help should exit with success");
    assert!(
        stdout.contains("InRelease"),
        "Help should contain description. Got: {}",
        stdout
    );
    for option in ["--config", "--child", "--log-file"] {
        assert!(
            stdout.contains(option),
            "Help should list {}. Got: {}",
            option,
            stdout
        );
    }
}

/// Test that --version prints the binary name
#[test]
fn test_version_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_tlog"))
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("tlog "));
}

/// Test that an unreadable explicit configuration file is fatal
#[test]
fn test_missing_config_file_exits_non_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_tlog"))
        .args(["--config", "/nonexistent/tlog.toml"])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr.contains("Invalid configuration"),
        "Should report the configuration error. Got: {}",
        stderr
    );
}

/// Test that a missing child transport is reported and fatal
#[test]
fn test_missing_child_exits_non_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("tlog.toml");
    std::fs::write(&config, "log_file = \"\"\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_tlog"))
        .arg("--config")
        .arg(&config)
        .args(["--child", "/nonexistent/methods/https"])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr.contains("/nonexistent/methods/https"),
        "Should name the child path. Got: {}",
        stderr
    );
    assert!(output.stdout.is_empty(), "Nothing may reach apt's stdin");
}
