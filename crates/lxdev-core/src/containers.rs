use crate::engine::Engine;
use crate::CoreError;
use lxdev_runtime::{ContainerInfo, ContainerStatus};
use lxdev_schema::{
    validate_full_name, validate_ports, Container, Project, Snapshot, User, INITIAL_SNAPSHOT,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shown for declared containers the runtime does not know.
pub const NOT_FOUND_STATUS: &str = "NOT FOUND";

const READY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Overrides the project default ports when non-empty.
    pub ports: Vec<u32>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Copy from this snapshot of the source instead of its current state.
    pub from_snapshot: Option<String>,
}

/// One row of [`Engine::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub name: String,
    pub image: String,
    pub status: String,
    pub ip: Option<String>,
    pub ports: Vec<u32>,
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

impl Engine {
    /// Launch and provision a new container, then record it.
    ///
    /// The `initial-state` snapshot is taken after the container is saved;
    /// if it fails the container stays, without a reset baseline.
    pub fn create(&self, name: &str, image: &str, opts: &CreateOptions) -> Result<(), CoreError> {
        info!("create {name} from {image}");
        let (mut project, _lock) = self.load_locked()?;

        validate_full_name(&project.project, name)?;
        if !opts.ports.is_empty() {
            validate_ports(&opts.ports)?;
        }
        if project.has_container(name) {
            return Err(CoreError::AlreadyExists(format!(
                "container '{name}' already exists in config"
            )));
        }
        let runtime_name = project.runtime_name(name);
        if self.backend().exists(&runtime_name)? {
            return Err(CoreError::AlreadyExists(format!(
                "container '{runtime_name}' already exists in {}",
                self.backend().name()
            )));
        }

        self.backend().launch(&runtime_name, image)?;
        if let Err(e) = self.backend().enable_nesting(&runtime_name) {
            warn!("could not enable nesting on {runtime_name}: {e}");
        }
        self.backend().wait_ready(&runtime_name, READY_TIMEOUT)?;

        let mut user = project.user(name);
        if let Some(u) = opts.user.as_deref().filter(|u| !u.is_empty()) {
            u.clone_into(&mut user.name);
        }
        if let Some(p) = opts.password.as_deref().filter(|p| !p.is_empty()) {
            p.clone_into(&mut user.password);
        }
        debug!("provisioning user {} in {runtime_name}", user.name);
        self.backend()
            .setup_user(&runtime_name, &user.name, &user.password)?;
        self.backend().enable_ssh(&runtime_name)?;

        let mut container = Container::with_image(image);
        container.ports.clone_from(&opts.ports);
        if opts.user.as_deref().is_some_and(|u| !u.is_empty()) {
            container.user = User::new(&user.name, &user.password);
        }
        project.add_container(name, container);
        self.save(&project)?;

        self.record_initial_state(&mut project, name, &runtime_name, "Initial state after setup");
        Ok(())
    }

    fn record_initial_state(
        &self,
        project: &mut Project,
        name: &str,
        runtime_name: &str,
        description: &str,
    ) {
        if let Err(e) = self.backend().snapshot(runtime_name, INITIAL_SNAPSHOT) {
            warn!("could not snapshot {runtime_name}: {e}");
            return;
        }
        project.add_snapshot(
            name,
            INITIAL_SNAPSHOT,
            Snapshot {
                description: description.to_owned(),
                created_at: now_rfc3339(),
            },
        );
        if let Err(e) = self.save(project) {
            warn!("could not record {INITIAL_SNAPSHOT} for {name}: {e}");
        }
    }

    pub fn start(&self, name: &str) -> Result<(), CoreError> {
        info!("start {name}");
        let (project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, name)?;
        if self.backend().status(&runtime_name)?.is_running() {
            debug!("{runtime_name} already running");
            return Ok(());
        }
        Ok(self.backend().start(&runtime_name)?)
    }

    pub fn stop(&self, name: &str) -> Result<(), CoreError> {
        info!("stop {name}");
        let (project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, name)?;
        if self.backend().status(&runtime_name)? == ContainerStatus::Stopped {
            debug!("{runtime_name} already stopped");
            return Ok(());
        }
        Ok(self.backend().stop(&runtime_name)?)
    }

    /// Delete from the runtime and drop from the document, whichever of the
    /// two still has it.
    pub fn remove(&self, name: &str) -> Result<(), CoreError> {
        info!("remove {name}");
        let (mut project, _lock) = self.load_locked()?;
        let runtime_name = project.runtime_name(name);
        let in_runtime = self.backend().exists(&runtime_name)?;
        let declared = project.has_container(name);
        if !in_runtime && !declared {
            return Err(CoreError::NotFound(format!("container '{name}' not found")));
        }

        if in_runtime {
            self.backend().delete(&runtime_name)?;
        }
        if declared {
            project.remove_container(name);
            self.save(&project)?;
        }
        Ok(())
    }

    /// Restore a snapshot, `initial-state` by default, keeping the running
    /// state the container had before.
    pub fn reset(&self, name: &str, snapshot: Option<&str>) -> Result<(), CoreError> {
        let snapshot = snapshot.filter(|s| !s.is_empty()).unwrap_or(INITIAL_SNAPSHOT);
        info!("reset {name} to {snapshot}");
        let (project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, name)?;

        if !self.backend().snapshot_exists(&runtime_name, snapshot)? {
            return Err(if snapshot == INITIAL_SNAPSHOT {
                CoreError::NotFound(format!(
                    "container '{name}' has no {INITIAL_SNAPSHOT} snapshot (it was created outside lxdev or the snapshot was removed)"
                ))
            } else {
                CoreError::NotFound(format!("snapshot '{snapshot}' does not exist"))
            });
        }

        let was_running = self.backend().status(&runtime_name)?.is_running();
        if was_running {
            self.backend().stop(&runtime_name)?;
        }
        self.backend().restore(&runtime_name, snapshot)?;
        if was_running {
            self.backend().start(&runtime_name)?;
        }
        Ok(())
    }

    /// Copy `source` (or one of its snapshots) to a new container `name`.
    pub fn clone_container(
        &self,
        source: &str,
        name: &str,
        opts: &CloneOptions,
    ) -> Result<(), CoreError> {
        info!("clone {source} -> {name}");
        let (mut project, _lock) = self.load_locked()?;
        validate_full_name(&project.project, name)?;

        if !project.has_container(source) {
            return Err(CoreError::NotFound(format!(
                "source container '{source}' not found in config"
            )));
        }
        let source_runtime = self.live(&project, source)?;
        if project.has_container(name) {
            return Err(CoreError::AlreadyExists(format!(
                "container '{name}' already exists in config"
            )));
        }
        let runtime_name = project.runtime_name(name);
        if self.backend().exists(&runtime_name)? {
            return Err(CoreError::AlreadyExists(format!(
                "container '{runtime_name}' already exists in {}",
                self.backend().name()
            )));
        }

        let from_snapshot = opts.from_snapshot.as_deref().filter(|s| !s.is_empty());
        match from_snapshot {
            Some(snapshot) => {
                if !self.backend().snapshot_exists(&source_runtime, snapshot)? {
                    return Err(CoreError::NotFound(format!(
                        "snapshot '{snapshot}' does not exist on container '{source}'"
                    )));
                }
                self.backend()
                    .copy_snapshot(&source_runtime, snapshot, &runtime_name)?;
            }
            None => self.backend().copy(&source_runtime, &runtime_name)?,
        }

        let source_image = project
            .container(source)
            .map_or("cloned", |c| c.image.as_str());
        let image = format!("{source_image}:cloned-from-{source}");
        project.add_container(name, Container::with_image(&image));
        self.save(&project)?;

        self.record_initial_state(&mut project, name, &runtime_name, "Initial state after clone");
        if let Err(e) = self.backend().start(&runtime_name) {
            warn!("could not start clone {runtime_name}: {e}");
        }
        Ok(())
    }

    /// Declared containers with their live status, sorted by name.
    pub fn list(&self) -> Result<Vec<ContainerSummary>, CoreError> {
        let project = self.load()?;
        if project.containers.is_empty() {
            return Ok(Vec::new());
        }

        let live: BTreeMap<String, ContainerInfo> = self
            .backend()
            .list_all()?
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        Ok(project
            .containers
            .iter()
            .map(|(name, container)| {
                let info = live.get(&project.runtime_name(name));
                ContainerSummary {
                    name: name.clone(),
                    image: container.image.clone(),
                    status: info.map_or_else(|| NOT_FOUND_STATUS.to_owned(), |i| i.status.to_string()),
                    ip: info.and_then(|i| i.ipv4.clone()),
                    ports: project.ports(name).to_vec(),
                }
            })
            .collect())
    }

    pub fn status(&self, name: &str) -> Result<ContainerStatus, CoreError> {
        let project = self.load()?;
        let runtime_name = self.live(&project, name)?;
        Ok(self.backend().status(&runtime_name)?)
    }

    pub fn ip(&self, name: &str) -> Result<Option<String>, CoreError> {
        let project = self.load()?;
        let runtime_name = self.live(&project, name)?;
        Ok(self.backend().ip(&runtime_name)?)
    }
}
