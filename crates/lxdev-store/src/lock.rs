use crate::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on a project's lock file.
///
/// The lock is held until the guard is dropped or [`release`](Self::release)d.
/// The kernel drops it when the owning process dies, so a killed invocation
/// never wedges the project.
#[derive(Debug)]
pub struct ProjectLock {
    lock_file: File,
    path: PathBuf,
}

fn open_lock_file(lock_path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == fs2::lock_contended_error().kind()
}

impl ProjectLock {
    /// Poll for the lock until `timeout` elapses.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let file = open_lock_file(lock_path)?;
        let deadline = Instant::now() + timeout;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("acquired lock {}", lock_path.display());
                    return Ok(Self {
                        lock_file: file,
                        path: lock_path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(StoreError::Io(e)),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::LockTimeout {
                    path: lock_path.to_path_buf(),
                    timeout,
                });
            }
            thread::sleep(LOCK_POLL_INTERVAL.min(deadline - now));
        }
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, StoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                lock_file: file,
                path: lock_path.to_path_buf(),
            })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) -> Result<(), StoreError> {
        FileExt::unlock(&self.lock_file)?;
        debug!("released lock {}", self.path.display());
        Ok(())
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}
