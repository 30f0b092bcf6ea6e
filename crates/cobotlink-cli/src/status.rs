//! Persisted status flag polling.
//!
//! An external process requests shutdown by writing a stop value into the
//! status file. Accepted forms are TOML (`status = false`, `status = "stop"`)
//! or a bare `False` / `stop` body.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

/// What the status file asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Stop,
}

/// Read the status file once.
pub fn read_status(path: &Path) -> std::io::Result<RunStatus> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_status(&text))
}

fn parse_status(text: &str) -> RunStatus {
    if let Ok(table) = text.parse::<toml::Table>() {
        match table.get("status") {
            Some(toml::Value::Boolean(false)) => return RunStatus::Stop,
            Some(toml::Value::String(s)) if is_stop_word(s) => return RunStatus::Stop,
            Some(_) => return RunStatus::Running,
            None => {}
        }
    }
    if is_stop_word(text) {
        RunStatus::Stop
    } else {
        RunStatus::Running
    }
}

fn is_stop_word(s: &str) -> bool {
    let s = s.trim();
    s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("stop")
}

/// Resolve once the status file at `path` asks for a stop.
///
/// A missing or unreadable file counts as "keep running".
pub async fn wait_for_stop(path: PathBuf, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    let mut last_error: Option<std::io::ErrorKind> = None;

    loop {
        ticker.tick().await;

        match read_status(&path) {
            Ok(RunStatus::Stop) => {
                info!(path = %path.display(), "Stop requested by status file");
                return;
            }
            Ok(RunStatus::Running) => {
                debug!(path = %path.display(), "Status file says running");
                last_error = None;
            }
            Err(e) => {
                // Only log when the failure changes, not every second
                if last_error != Some(e.kind()) {
                    warn!(path = %path.display(), error = %e, "Cannot read status file");
                    last_error = Some(e.kind());
                }
            }
        }
    }
}
