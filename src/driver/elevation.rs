//! Per-call privilege elevation.
//!
//! No credential is ever cached: each privileged command goes through the
//! platform's own authorization path at the moment it runs. On Linux that is
//! `pkexec` (falling back to non-interactive `sudo`), on macOS the native
//! authorization dialog via `osascript`. Windows commands talk to the
//! service control manager directly and need no wrapper here.

use crate::driver::command::find_program;
use crate::platform;

/// A command line ready to hand to the subprocess runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elevated {
    pub program: String,
    pub args: Vec<String>,
}

impl Elevated {
    pub fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

/// Wrap a command for Linux.
///
/// Already-root processes run the command as-is. Otherwise `pkexec` is
/// preferred for its desktop authorization prompt; `sudo -n` covers headless
/// sessions with cached sudo timestamps, failing fast instead of hanging on
/// a password prompt.
pub fn elevate_linux(program: &str, args: &[&str]) -> Elevated {
    if platform::is_elevated() {
        return Elevated {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        };
    }
    let mut wrapped = Vec::with_capacity(args.len() + 2);
    let wrapper = if find_program("pkexec", &[]).is_some() {
        "pkexec"
    } else {
        wrapped.push("-n".to_string());
        "sudo"
    };
    wrapped.push(program.to_string());
    wrapped.extend(args.iter().map(|s| s.to_string()));
    Elevated {
        program: wrapper.to_string(),
        args: wrapped,
    }
}

/// Wrap a command for macOS in an `osascript` administrator-privileges call.
///
/// The resulting dialog is the OS's own; a dismissal surfaces as "User
/// canceled" in stderr and is classified as `PermissionDenied` downstream.
pub fn elevate_macos(program: &str, args: &[&str]) -> Elevated {
    if platform::is_elevated() {
        return Elevated {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        };
    }
    let shell_line = std::iter::once(program)
        .chain(args.iter().copied())
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ");
    let script = format!(
        "do shell script \"{}\" with administrator privileges",
        applescript_escape(&shell_line)
    );
    Elevated {
        program: "osascript".to_string(),
        args: vec!["-e".to_string(), script],
    }
}

/// Single-quote a token for `sh`, the shell `do shell script` uses.
fn shell_quote(token: &str) -> String {
    if !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-=:".contains(c))
    {
        return token.to_string();
    }
    format!("'{}'", token.replace('\'', r"'\''"))
}

/// Escape a string for embedding in a double-quoted AppleScript literal.
fn applescript_escape(s: &str) -> String {
    s.replace('\\', r"\\").replace('"', r#"\""#)
}
