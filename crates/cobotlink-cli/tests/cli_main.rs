//! Basic CLI tests for the cobotlink binary.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("cobotlink").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("collaborative robot control session"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--status-file"))
        .stdout(predicate::str::contains("--move-duration-ms"));
}

/// Test that the CLI shows version information.
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("cobotlink").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("cobotlink"));
}

/// Test that an enable command is acknowledged and the session torn down at EOF.
#[test]
fn test_enable_acknowledged() {
    let mut cmd = Command::cargo_bin("cobotlink").unwrap();
    cmd.arg("--move-duration-ms")
        .arg("0")
        .write_stdin("{\"methodName\": \"EnableControlCommand\", \"payload\": null}\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"methodName\":\"EnableControlCommand\""))
        .stdout(predicate::str::contains("\"status\":200"))
        .stdout(predicate::str::contains("StartTime"))
        .stderr(predicate::str::contains("Control session disabled"));
}

/// Test that unknown methods and garbage lines get error responses.
#[test]
fn test_error_responses() {
    let mut cmd = Command::cargo_bin("cobotlink").unwrap();
    cmd.arg("--move-duration-ms")
        .arg("0")
        .write_stdin("{\"methodName\": \"StartIotCommand\"}\nnot json\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\":404"))
        .stdout(predicate::str::contains("\"status\":400"))
        .stdout(predicate::str::contains("Unknown method: StartIotCommand"));
}

/// Test that motion before enable is reported as a conflict.
#[test]
fn test_motion_before_enable_conflicts() {
    let mut cmd = Command::cargo_bin("cobotlink").unwrap();
    cmd.arg("--move-duration-ms").arg("0").write_stdin(
        "{\"methodName\": \"MoveJControlCommand\", \"payload\": \"[0, 0, 0, 0, 0, 0]\"}\n",
    );

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\":409"));
}

/// Test that a stop in the status file ends a live process and disables
/// the session before exit, while stdin is still open.
#[test]
fn test_status_file_stop_disables_session() {
    let dir = tempfile::tempdir().unwrap();
    let status = dir.path().join("status.toml");
    std::fs::write(&status, "status = true\n").unwrap();
    let config = dir.path().join("cobotlink.toml");
    std::fs::write(
        &config,
        format!(
            "[status]\npath = {:?}\npoll_interval_ms = 50\n",
            status.display().to_string()
        ),
    )
    .unwrap();

    let mut child = StdCommand::new(env!("CARGO_BIN_EXE_cobotlink"))
        .arg("--config")
        .arg(&config)
        .arg("--move-duration-ms")
        .arg("0")
        .env_remove("RUST_LOG")
        .env_remove("COBOTLINK_LOG_JSON")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    writeln!(
        stdin,
        "{{\"methodName\": \"EnableControlCommand\", \"payload\": null}}"
    )
    .unwrap();
    stdin.flush().unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut response = String::new();
    stdout.read_line(&mut response).unwrap();
    assert!(response.contains("\"status\":200"), "{}", response);

    // Still serving while the status file says running
    std::thread::sleep(Duration::from_millis(300));
    assert!(child.try_wait().unwrap().is_none());

    std::fs::write(&status, "status = false\n").unwrap();
    let exit = wait_with_timeout(&mut child, Duration::from_secs(10));
    drop(stdin);

    let mut stderr = String::new();
    child
        .stderr
        .take()
        .unwrap()
        .read_to_string(&mut stderr)
        .unwrap();
    assert!(exit.success(), "{}", stderr);
    assert!(stderr.contains("Stop requested by status file"), "{}", stderr);
    assert!(stderr.contains("Control session disabled"), "{}", stderr);
    assert!(!stderr.contains("Command input closed"), "{}", stderr);
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            child.kill().unwrap();
            panic!("cobotlink did not exit after a status file stop");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Test that a broken config file is reported.
#[test]
fn test_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("cobotlink.toml");
    std::fs::write(&config, "[robot]\nport = \"nope\"\n").unwrap();

    let mut cmd = Command::cargo_bin("cobotlink").unwrap();
    cmd.arg("--config").arg(&config);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
