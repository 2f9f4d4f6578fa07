//! Command execution primitives with consistent error handling.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};

/// Run a command in a specific directory.
///
/// Returns trimmed stdout if the command succeeds.
/// Returns an error with stderr (or stdout fallback) if it fails.
pub fn run_in(dir: &Path, program: &str, args: &[&str], context: &str) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| {
            Error::internal_io(
                format!("Failed to run {}: {}", context, e),
                Some(context.to_string()),
            )
        })?;

    if !output.status.success() {
        return Err(Error::internal_io(
            format!("{} failed: {}", context, error_text(&output)),
            Some(context.to_string()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a command in a directory, returning None on failure or empty output.
///
/// Useful when command failure is expected/acceptable (e.g., a repo without tags).
pub fn run_in_optional(dir: &Path, program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}

/// Run a shell command line with inherited stdio and a controlled environment.
///
/// Inherited variables for which `keep_env` returns false are removed before
/// `env` is applied. Returns the exit code (`None` when killed by a signal).
pub fn run_streaming(
    dir: &Path,
    command_line: &str,
    env: &BTreeMap<String, String>,
    keep_env: impl Fn(&str) -> bool,
) -> Result<Option<i32>> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command_line)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    for (key, _) in std::env::vars() {
        if !keep_env(&key) {
            cmd.env_remove(&key);
        }
    }
    cmd.envs(env);

    let status = cmd.status().map_err(|e| {
        Error::internal_io(
            format!("Failed to run `{}`: {}", command_line, e),
            Some("run command".to_string()),
        )
    })?;

    Ok(status.code())
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

/// Check if a command succeeds in a directory without capturing output.
pub fn succeeded_in(dir: &Path, program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Quote a value for interpolation into an `sh -c` command line.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
