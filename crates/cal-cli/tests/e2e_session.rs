//! End-to-end tests for the `cal` binary.
//!
//! Nothing here touches the network: only commands that stay local are run.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn cal_binary() -> String {
    env!("CARGO_BIN_EXE_cal").to_string()
}

/// A `cal` command isolated from the user's config and environment.
fn cal(home: &Path) -> Command {
    let mut command = Command::new(cal_binary());
    command
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("CAL_API_KEY")
        .env_remove("RUST_LOG");
    command
}

fn run_session(mut command: Command, script: &str) -> Output {
    let mut child = command
        .arg("session")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn cal session");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_lists_subcommands() {
    let temp = TempDir::new().unwrap();
    let output = cal(temp.path()).arg("--help").output().unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    for subcommand in ["search", "lookup", "session", "config"] {
        assert!(text.contains(subcommand), "missing {subcommand} in help");
    }
}

#[test]
fn test_config_layers_file_and_env() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("cal.toml");
    std::fs::write(&config_path, "debounce_ms = 450\napi_key = \"file-secret\"\n").unwrap();

    let output = cal(temp.path())
        .env("CAL_CAMERA__AVAILABLE", "false")
        .arg("--config")
        .arg(&config_path)
        .arg("config")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "cal config should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(!text.contains("file-secret"));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["debounce_ms"], 450);
    assert_eq!(json["camera"]["available"], false);
    assert_eq!(json["api_key"], "[REDACTED]");
}

#[test]
fn test_home_config_file_is_read() {
    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join(".config/cal");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "request_timeout_secs = 3\n").unwrap();

    let output = cal(temp.path()).arg("config").output().unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["request_timeout_secs"], 3);
}

#[test]
fn test_lookup_rejects_invalid_barcode() {
    let temp = TempDir::new().unwrap();
    let output = cal(temp.path()).args(["lookup", "12345"]).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid barcode"));
}

#[test]
fn test_session_with_denied_camera() {
    let temp = TempDir::new().unwrap();
    let mut command = cal(temp.path());
    command
        .env("CAL_CAMERA__AVAILABLE", "false")
        .env("CAL_CAMERA__GRANT_DELAY_MS", "0");

    let output = run_session(command, "scan\nwait 200\ntotals\nquit\n");

    assert!(
        output.status.success(),
        "session should exit cleanly: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("Unable to access the camera"));
    assert!(text.contains("No macros to display"));
}

#[test]
fn test_session_capture_and_eof() {
    let temp = TempDir::new().unwrap();
    let mut command = cal(temp.path());
    command.env("CAL_CAMERA__GRANT_DELAY_MS", "0");

    // No `quit`: end of input ends the session too.
    let output = run_session(command, "scan\nwait 200\ncapture\nwait 100\nlog\n");

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Captured a 1280x720 frame"));
    assert!(text.contains("Food Items\n(none)"));
}
