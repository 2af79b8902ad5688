//! Orchestration engine for lxdev.
//!
//! `Engine` ties the document store, the validation rules and a runtime
//! backend together. Every mutating operation follows the same shape: take
//! the project lock, load, validate inputs, call the runtime, mutate the
//! document in memory, save. Read-only views load without the lock. The
//! mount reconciler lives in [`reconcile`]; mount and unmount, with the
//! rollback that keeps document and runtime in step, live in [`mounts`].

pub mod containers;
pub mod engine;
pub mod images;
pub mod mounts;
pub mod project;
pub mod reconcile;
pub mod session;
pub mod snapshots;
pub mod sync;

pub use containers::{CloneOptions, ContainerSummary, CreateOptions, NOT_FOUND_STATUS};
pub use engine::Engine;
pub use mounts::MountOptions;
pub use project::InitOptions;
pub use reconcile::{MountInfo, MountStatus, SyncReport};
pub use snapshots::SnapshotInfo;
pub use sync::expand_home;

use lxdev_runtime::RuntimeError;
use lxdev_schema::ValidationError;
use lxdev_store::StoreError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("risky path: {0}")]
    RiskyPath(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("container '{0}' is not running")]
    NotRunning(String),
    #[error("{summary}:\n  {}", .failures.join("\n  "))]
    Partial {
        summary: String,
        failures: Vec<String>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification callers branch on instead of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    SecurityBlocked,
    RiskyPath,
    LockTimeout,
    ParseFailure,
    Unsupported,
    Runtime,
    NoProject,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::InvalidInput => "invalid input",
            Self::SecurityBlocked => "blocked",
            Self::RiskyPath => "risky path",
            Self::LockTimeout => "lock timeout",
            Self::ParseFailure => "invalid document",
            Self::Unsupported => "unsupported",
            Self::Runtime => "runtime failure",
            Self::NoProject => "no project",
            Self::Io => "I/O error",
        };
        f.write_str(s)
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => match e {
                StoreError::NoProject(_) => ErrorKind::NoProject,
                StoreError::ProjectExists(_) => ErrorKind::AlreadyExists,
                StoreError::Parse { .. } | StoreError::Invalid { .. } => ErrorKind::ParseFailure,
                StoreError::LockTimeout { .. } => ErrorKind::LockTimeout,
                StoreError::Io(_) | StoreError::Serialization(_) => ErrorKind::Io,
            },
            Self::Validation(e) if e.is_blocked() => ErrorKind::SecurityBlocked,
            Self::Validation(_) | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::RiskyPath(_) => ErrorKind::RiskyPath,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Runtime(_) | Self::NotRunning(_) | Self::Partial { .. } => ErrorKind::Runtime,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}
