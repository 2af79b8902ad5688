//! Container runtime backends for lxdev.
//!
//! The core never talks to a container engine directly; it goes through the
//! `RuntimeBackend` trait. `LxcBackend` drives the `lxc` client binary,
//! `MockBackend` keeps everything in memory for tests. This crate also builds
//! the argument vectors for interactive `exec`/`shell` sessions and checks
//! host prerequisites.

pub mod backend;
pub mod exec;
pub mod lxc;
pub mod mock;
pub mod prereq;

pub use backend::{
    select_backend, ContainerInfo, ContainerStatus, DeviceInfo, ImageInfo, RuntimeBackend,
};
pub use exec::{exec_args, shell_args};
pub use lxc::LxcBackend;
pub use mock::MockBackend;
pub use prereq::{check_lxc_prereqs, format_missing, MissingPrereq};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("container '{0}' not found in runtime")]
    NotFound(String),
    #[error("container '{0}' is not running")]
    NotRunning(String),
    #[error("{op} failed for '{target}': {detail}")]
    CommandFailed {
        op: String,
        target: String,
        detail: String,
    },
    #[error("timed out waiting for container '{0}' to become ready")]
    Timeout(String),
    #[error("unexpected runtime output: {0}")]
    Parse(String),
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}

impl RuntimeError {
    pub fn command_failed(op: &str, target: &str, detail: impl Into<String>) -> Self {
        Self::CommandFailed {
            op: op.to_owned(),
            target: target.to_owned(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_names_op_and_target() {
        let e = RuntimeError::command_failed("device add", "demo-web", "exit status 1");
        let msg = e.to_string();
        assert!(msg.contains("device add"));
        assert!(msg.contains("demo-web"));
        assert!(msg.contains("exit status 1"));
    }

    #[test]
    fn not_running_display() {
        let e = RuntimeError::NotRunning("demo-web".to_owned());
        assert_eq!(e.to_string(), "container 'demo-web' is not running");
    }
}
