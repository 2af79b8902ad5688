use crate::CoreError;
use lxdev_runtime::{RuntimeBackend, RuntimeError};
use lxdev_schema::Project;
use lxdev_store::{ProjectLock, ProjectStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Central orchestration engine for one lxdev project directory.
///
/// The runtime backend is injected, so tests drive the same code paths with
/// `MockBackend` that production drives with `LxcBackend`. Operations are
/// spread over several modules as separate `impl Engine` blocks.
pub struct Engine {
    store: ProjectStore,
    backend: Arc<dyn RuntimeBackend>,
}

impl Engine {
    pub fn new(dir: impl Into<PathBuf>, backend: Arc<dyn RuntimeBackend>) -> Self {
        Self::with_store(ProjectStore::new(dir), backend)
    }

    pub fn with_store(store: ProjectStore, backend: Arc<dyn RuntimeBackend>) -> Self {
        Self { store, backend }
    }

    #[inline]
    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        self.store.dir()
    }

    #[inline]
    pub fn backend(&self) -> &dyn RuntimeBackend {
        self.backend.as_ref()
    }

    /// Load without the lock, for read-only views.
    pub fn load(&self) -> Result<Project, CoreError> {
        Ok(self.store.load()?)
    }

    pub(crate) fn load_locked(&self) -> Result<(Project, ProjectLock), CoreError> {
        let (project, lock) = self.store.load_with_lock()?;
        debug!("acquired {}", lock.path().display());
        Ok((project, lock))
    }

    pub(crate) fn save(&self, project: &Project) -> Result<(), CoreError> {
        Ok(self.store.save(project)?)
    }

    /// Runtime name of a declared container, or `NotFound`.
    pub(crate) fn declared(project: &Project, name: &str) -> Result<String, CoreError> {
        if project.has_container(name) {
            Ok(project.runtime_name(name))
        } else {
            Err(CoreError::NotFound(format!(
                "container '{name}' not found in config"
            )))
        }
    }

    /// Runtime name of a container that is both declared and present in the
    /// runtime.
    pub(crate) fn live(&self, project: &Project, name: &str) -> Result<String, CoreError> {
        let runtime_name = Self::declared(project, name)?;
        if !self.backend.exists(&runtime_name)? {
            return Err(CoreError::NotFound(format!(
                "container '{runtime_name}' does not exist in {}",
                self.backend.name()
            )));
        }
        Ok(runtime_name)
    }

    pub(crate) fn running(&self, project: &Project, name: &str) -> Result<String, CoreError> {
        let runtime_name = self.live(project, name)?;
        let status = self.backend.status(&runtime_name)?;
        if !status.is_running() {
            debug!("{runtime_name} is {status}");
            return Err(CoreError::NotRunning(name.to_owned()));
        }
        Ok(runtime_name)
    }

    /// Run a command in the container and fail on a non-zero exit.
    pub(crate) fn run_in(&self, runtime_name: &str, argv: &[String]) -> Result<(), CoreError> {
        let output = self.backend.exec(runtime_name, argv)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(RuntimeError::command_failed(
            argv.first().map_or("exec", String::as_str),
            runtime_name,
            format!("{}: {}", output.status, stderr.trim()),
        )
        .into())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::fixture;
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn declared_and_live_checks() {
        let (_dir, mock, engine) = fixture();
        let project = engine.load().unwrap();

        assert_eq!(Engine::declared(&project, "web").unwrap(), "demo-web");
        let err = Engine::declared(&project, "db").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("not found in config"));

        assert_eq!(engine.live(&project, "web").unwrap(), "demo-web");
        mock.delete("demo-web").unwrap();
        let err = engine.live(&project, "web").unwrap_err();
        assert!(err.to_string().contains("does not exist in mock"));
    }

    #[test]
    fn running_requires_running_status() {
        let (_dir, mock, engine) = fixture();
        let project = engine.load().unwrap();
        assert!(engine.running(&project, "web").is_ok());

        mock.stop("demo-web").unwrap();
        let err = engine.running(&project, "web").unwrap_err();
        assert!(matches!(err, CoreError::NotRunning(ref n) if n == "web"));
    }

    #[test]
    fn mutating_ops_hold_the_lock() {
        let (_dir, _mock, engine) = fixture();
        let (_project, _lock) = engine.load_locked().unwrap();
        let err = engine.load_locked().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockTimeout);
    }
}
