use crate::layout::{ProjectLayout, TEMP_PREFIX};
use crate::lock::{ProjectLock, LOCK_TIMEOUT};
use crate::{fsync_dir, StoreError};
use lxdev_schema::{parse_document_str, Project};
use std::fs::{self, Permissions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::Builder;
use tracing::debug;

const DOCUMENT_MODE: u32 = 0o644;

/// Reads and writes `containers.yaml` for one project directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    layout: ProjectLayout,
    lock_timeout: Duration,
}

impl ProjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: ProjectLayout::new(dir),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[inline]
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        self.layout.root()
    }

    pub fn exists(&self) -> bool {
        self.layout.document_path().is_file()
    }

    /// Parse and validate the document. A missing file is `NoProject`, never
    /// a plain I/O error.
    pub fn load(&self) -> Result<Project, StoreError> {
        let path = self.layout.document_path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoProject(self.layout.root().to_path_buf()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let project = parse_document_str(&content).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        project
            .validate()
            .map_err(|source| StoreError::Invalid { path, source })?;
        Ok(project)
    }

    /// Atomically replace the document: temp file, fsync, chmod, rename,
    /// directory fsync.
    pub fn save(&self, project: &Project) -> Result<(), StoreError> {
        let content = project.to_yaml()?;
        let dir = self.layout.root();
        fs::create_dir_all(dir)?;

        let mut tmp = Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.as_file()
            .set_permissions(Permissions::from_mode(DOCUMENT_MODE))?;
        tmp.persist(self.layout.document_path())
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(dir)?;

        debug!(
            "saved {} ({} containers)",
            self.layout.document_path().display(),
            project.containers.len()
        );
        Ok(())
    }

    pub fn lock(&self) -> Result<ProjectLock, StoreError> {
        ProjectLock::acquire(&self.layout.lock_path(), self.lock_timeout)
    }

    /// Acquire the lock, then load. If the load fails the lock is dropped
    /// before returning.
    pub fn load_with_lock(&self) -> Result<(Project, ProjectLock), StoreError> {
        let lock = self.lock()?;
        let project = self.load()?;
        Ok((project, lock))
    }

    /// Write a fresh document; refuses to overwrite an existing one.
    pub fn create(&self, project: &Project) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        if self.exists() {
            return Err(StoreError::ProjectExists(self.layout.root().to_path_buf()));
        }
        self.save(project)
    }

    /// Delete the document. The lock file stays; it carries no content.
    pub fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.layout.document_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoProject(self.layout.root().to_path_buf()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        }
        fsync_dir(self.layout.root())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lxdev_schema::{Container, Device, Snapshot, User};

    fn sample_project() -> Project {
        let mut p = Project {
            project: "demo".to_owned(),
            ..Project::default()
        };
        p.defaults.ports = vec![3000, 8080];
        p.defaults.user = User::new("alice", "pw");
        let mut web = Container::with_image("ubuntu:24.04");
        web.ports = vec![5173];
        p.add_container("web", web);
        p.add_sync_entry("web", "./app", "/home/alice/app");
        p.add_snapshot(
            "web",
            "initial-state",
            Snapshot {
                description: "Initial state after setup".to_owned(),
                created_at: "2024-05-01T10:00:00Z".to_owned(),
            },
        );
        p.add_device("web", "repo", Device::disk("/src/repo", "/workspace", true, false));
        p
    }

    #[test]
    fn load_missing_is_no_project() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(StoreError::NoProject(_))));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        let project = sample_project();
        store.save(&project).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), project);
    }

    #[test]
    fn save_sets_mode_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.save(&sample_project()).unwrap();
        store.save(&sample_project()).unwrap();

        let mode = fs::metadata(store.layout().document_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("containers.yaml"), "containers: [oops").unwrap();
        let store = ProjectStore::new(dir.path());
        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn semantically_invalid_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("containers.yaml"),
            "containers:\n  web--app:\n    image: x\n",
        )
        .unwrap();
        let store = ProjectStore::new(dir.path());
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
        assert!(err.to_string().contains("consecutive hyphens"));
    }

    #[test]
    fn load_with_lock_releases_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        assert!(store.load_with_lock().is_err());
        assert!(ProjectLock::try_acquire(&store.layout().lock_path())
            .unwrap()
            .is_some());
    }

    #[test]
    fn load_with_lock_holds_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path()).with_lock_timeout(Duration::from_millis(200));
        store.save(&sample_project()).unwrap();

        let (_project, lock) = store.load_with_lock().unwrap();
        assert!(matches!(
            store.load_with_lock(),
            Err(StoreError::LockTimeout { .. })
        ));
        drop(lock);
        assert!(store.load_with_lock().is_ok());
    }

    #[test]
    fn create_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.create(&sample_project()).unwrap();
        assert!(matches!(
            store.create(&sample_project()),
            Err(StoreError::ProjectExists(_))
        ));
    }

    #[test]
    fn remove_deletes_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.save(&sample_project()).unwrap();
        store.remove().unwrap();
        assert!(!store.exists());
        assert!(matches!(store.remove(), Err(StoreError::NoProject(_))));
    }
}
