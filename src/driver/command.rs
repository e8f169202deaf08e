//! Subprocess execution for the platform drivers.
//!
//! Every external tool (`wg-quick`, `sc`, `osascript`, package managers)
//! goes through [`run`], which bounds the call with a timeout and folds a
//! non-zero exit into a typed error carrying the captured stderr. Elevation
//! refusals are recognized from the tool output and surfaced as
//! `PermissionDenied` instead of a generic command failure.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{VpnError, VpnResult};

/// Substrings that mean the user (or the OS) refused elevation.
const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "operation not permitted",
    "a password is required",
    "request dismissed",
    "user canceled",
    "user cancelled",
    "access is denied",
];

/// Run a command, returning trimmed stdout on success.
///
/// A non-zero exit becomes `CommandFailed` (or `PermissionDenied` when the
/// output matches a refusal marker); exceeding `timeout` kills the child and
/// fails the call.
pub async fn run(program: &str, args: &[&str], timeout: Duration) -> VpnResult<String> {
    debug!(%program, ?args, "running command");

    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| VpnError::CommandFailed {
            program: program.to_string(),
            code: None,
            stderr: format!("timed out after {}s", timeout.as_secs()),
        })?
        .map_err(|e| VpnError::CommandFailed {
            program: program.to_string(),
            code: None,
            stderr: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    // `sc` and some installers report errors on stdout.
    let detail = if stderr.is_empty() { stdout } else { stderr };
    Err(classify_failure(program, output.status.code(), detail))
}

/// Map a failed command to `PermissionDenied` or `CommandFailed`.
pub fn classify_failure(program: &str, code: Option<i32>, detail: String) -> VpnError {
    let lowered = detail.to_lowercase();
    if PERMISSION_MARKERS.iter().any(|m| lowered.contains(m)) {
        return VpnError::PermissionDenied(detail);
    }
    VpnError::CommandFailed {
        program: program.to_string(),
        code,
        stderr: detail,
    }
}

/// True when a failed command's output contains one of the given markers,
/// used for success-as-no-op checks ("already exists", "does not exist").
pub fn failure_mentions(error: &VpnError, markers: &[&str]) -> bool {
    let text = match error {
        VpnError::CommandFailed { stderr, .. } => stderr,
        _ => return false,
    };
    let lowered = text.to_lowercase();
    markers.iter().any(|m| lowered.contains(&m.to_lowercase()))
}

/// Locate a program, preferring known install locations over PATH.
///
/// WireGuard's tools often live outside the default PATH of a GUI session
/// (Homebrew prefixes, `C:\Program Files\WireGuard`), so callers pass those
/// as `extra_dirs`.
pub fn find_program(name: &str, extra_dirs: &[&str]) -> Option<PathBuf> {
    for dir in extra_dirs {
        let candidate = PathBuf::from(dir).join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
