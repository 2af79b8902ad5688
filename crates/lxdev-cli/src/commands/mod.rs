pub mod clone;
pub mod completions;
pub mod create;
pub mod delete;
pub mod exec;
pub mod image;
pub mod init;
pub mod lifecycle;
pub mod list;
pub mod man_pages;
pub mod mount;
pub mod mounts;
pub mod snapshot;
pub mod status;
pub mod sync;

use indicatif::{ProgressBar, ProgressStyle};
use lxdev_core::{CoreError, ErrorKind};
use std::fmt;
use std::io::{stderr, stdin, IsTerminal};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INVALID_INPUT: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;

/// A failed command: the message printed after `error:` and the exit code.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
}

impl CliError {
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<CoreError> for CliError {
    fn from(e: CoreError) -> Self {
        Self::new(exit_code(e.kind()), e.to_string())
    }
}

impl From<String> for CliError {
    fn from(message: String) -> Self {
        Self::new(EXIT_FAILURE, message)
    }
}

pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidInput
        | ErrorKind::SecurityBlocked
        | ErrorKind::RiskyPath
        | ErrorKind::ParseFailure
        | ErrorKind::NoProject => EXIT_INVALID_INPUT,
        ErrorKind::LockTimeout | ErrorKind::Io => EXIT_STORE_ERROR,
        ErrorKind::NotFound
        | ErrorKind::AlreadyExists
        | ErrorKind::Unsupported
        | ErrorKind::Runtime => EXIT_FAILURE,
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn is_interactive() -> bool {
    stdin().is_terminal() && stderr().is_terminal()
}

pub fn confirm(prompt: &str) -> Result<bool, CliError> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| CliError::from(format!("prompt failed: {e}")))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, line: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(line);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

/// Run `op` under a spinner showing `msg`, closed with `done` or `failed`.
/// `--json` output gets no spinner.
pub fn with_spinner<T>(
    json: bool,
    msg: &str,
    done: &str,
    failed: &str,
    op: impl FnOnce() -> Result<T, CoreError>,
) -> Result<T, CliError> {
    let pb = (!json).then(|| spinner(msg));
    let result = op();
    if let Some(pb) = pb {
        match &result {
            Ok(_) => spin_ok(&pb, done),
            Err(_) => spin_fail(&pb, failed),
        }
    }
    Ok(result?)
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "RUNNING" | "ok" => Style::new().green().apply_to(status).to_string(),
        "STOPPED" => Style::new().yellow().apply_to(status).to_string(),
        "FROZEN" => Style::new().blue().apply_to(status).to_string(),
        "missing" | "NOT FOUND" => Style::new().red().apply_to(status).to_string(),
        "untracked" => Style::new().magenta().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"project": "demo"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"project\""));
        assert!(result.contains("\"demo\""));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(exit_code(ErrorKind::NoProject), EXIT_INVALID_INPUT);
        assert_eq!(exit_code(ErrorKind::ParseFailure), EXIT_INVALID_INPUT);
        assert_eq!(exit_code(ErrorKind::SecurityBlocked), EXIT_INVALID_INPUT);
        assert_eq!(exit_code(ErrorKind::LockTimeout), EXIT_STORE_ERROR);
        assert_eq!(exit_code(ErrorKind::Io), EXIT_STORE_ERROR);
        assert_eq!(exit_code(ErrorKind::NotFound), EXIT_FAILURE);
        assert_eq!(exit_code(ErrorKind::Runtime), EXIT_FAILURE);
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_INVALID_INPUT);
        assert_ne!(EXIT_INVALID_INPUT, EXIT_STORE_ERROR);
    }

    #[test]
    fn core_error_converts_with_code() {
        let err = CliError::from(CoreError::NotFound("container 'web' not found".to_owned()));
        assert_eq!(err.code, EXIT_FAILURE);
        assert_eq!(err.to_string(), "container 'web' not found");

        let err = CliError::from(CoreError::InvalidInput("bad".to_owned()));
        assert_eq!(err.code, EXIT_INVALID_INPUT);
    }

    #[test]
    fn with_spinner_passes_result_through() {
        let value = with_spinner(true, "working...", "done", "failed", || Ok(7)).unwrap();
        assert_eq!(value, 7);

        let err = with_spinner(false, "working...", "done", "failed", || {
            Err::<(), _>(CoreError::Unsupported("nope".to_owned()))
        })
        .unwrap_err();
        assert_eq!(err.code, EXIT_FAILURE);
    }

    #[test]
    fn colorize_keeps_text() {
        assert!(colorize_status("RUNNING").contains("RUNNING"));
        assert!(colorize_status("missing").contains("missing"));
        assert_eq!(colorize_status("unknown"), "unknown");
    }
}
