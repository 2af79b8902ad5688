//! Persistence for the lxdev declared-state document.
//!
//! `ProjectStore` is the only reader and writer of `containers.yaml`. Loads
//! parse and validate the whole document; saves go through a temporary file
//! that is synced and renamed over the target. `ProjectLock` provides the
//! cross-process exclusion every read-modify-write sequence runs under.

pub mod layout;
pub mod lock;
pub mod project_store;

pub use layout::{ProjectLayout, DOCUMENT_FILE, LOCK_FILE};
pub use lock::{ProjectLock, LOCK_POLL_INTERVAL, LOCK_TIMEOUT};
pub use project_store::ProjectStore;

use lxdev_schema::{DocumentError, ValidationError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Fsync a directory so a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no project found in {}: run 'lxdev init' first", .0.display())]
    NoProject(PathBuf),
    #[error("project already exists in {}", .0.display())]
    ProjectExists(PathBuf),
    #[error("invalid document {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
    #[error("invalid configuration in {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
    #[error(
        "timed out after {}s waiting for lock {}: another instance may be running",
        .timeout.as_secs_f32(),
        .path.display()
    )]
    LockTimeout { path: PathBuf, timeout: Duration },
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_yaml::Error),
}
