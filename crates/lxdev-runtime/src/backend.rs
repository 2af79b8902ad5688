use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Frozen,
    Other(String),
}

impl ContainerStatus {
    /// Accepts the runtime's spelling in any case (`Running`, `RUNNING`).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Self::Running,
            "STOPPED" => Self::Stopped,
            "FROZEN" => Self::Frozen,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Frozen => write!(f, "FROZEN"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A device attached to a live container, as the runtime reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: String,
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub status: ContainerStatus,
    pub ipv4: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub fingerprint: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub size: u64,
    pub created_at: String,
}

/// Everything lxdev needs from a container engine. Calls are synchronous and
/// never retried by callers.
pub trait RuntimeBackend: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    fn exists(&self, name: &str) -> Result<bool, RuntimeError>;

    fn status(&self, name: &str) -> Result<ContainerStatus, RuntimeError>;

    fn ip(&self, name: &str) -> Result<Option<String>, RuntimeError>;

    fn launch(&self, name: &str, image: &str) -> Result<(), RuntimeError>;

    fn enable_nesting(&self, name: &str) -> Result<(), RuntimeError>;

    fn wait_ready(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError>;

    fn setup_user(&self, name: &str, user: &str, password: &str) -> Result<(), RuntimeError>;

    fn enable_ssh(&self, name: &str) -> Result<(), RuntimeError>;

    fn start(&self, name: &str) -> Result<(), RuntimeError>;

    fn stop(&self, name: &str) -> Result<(), RuntimeError>;

    fn delete(&self, name: &str) -> Result<(), RuntimeError>;

    fn snapshot(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError>;

    fn restore(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError>;

    fn copy(&self, source: &str, dest: &str) -> Result<(), RuntimeError>;

    fn copy_snapshot(&self, source: &str, snapshot: &str, dest: &str) -> Result<(), RuntimeError>;

    fn device_add(
        &self,
        name: &str,
        device: &str,
        kind: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<(), RuntimeError>;

    fn device_remove(&self, name: &str, device: &str) -> Result<(), RuntimeError>;

    fn device_list(&self, name: &str) -> Result<Vec<DeviceInfo>, RuntimeError>;

    fn is_privileged(&self, name: &str) -> Result<bool, RuntimeError>;

    fn list_all(&self) -> Result<Vec<ContainerInfo>, RuntimeError>;

    fn list_snapshots(&self, name: &str) -> Result<Vec<String>, RuntimeError>;

    fn snapshot_exists(&self, name: &str, snapshot: &str) -> Result<bool, RuntimeError> {
        Ok(self
            .list_snapshots(name)?
            .iter()
            .any(|s| s == snapshot))
    }

    fn delete_snapshot(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError>;

    fn list_images(&self, all: bool) -> Result<Vec<ImageInfo>, RuntimeError>;

    fn image_exists(&self, alias: &str) -> Result<bool, RuntimeError>;

    fn delete_image(&self, alias: &str) -> Result<(), RuntimeError>;

    fn rename_image(&self, old: &str, new: &str) -> Result<(), RuntimeError>;

    /// Publish `name/snapshot` as image `alias`, reporting progress lines.
    fn publish_snapshot(
        &self,
        name: &str,
        snapshot: &str,
        alias: &str,
        progress: &mut dyn FnMut(&str),
    ) -> Result<(), RuntimeError>;

    fn dir_exists(&self, name: &str, path: &str) -> Result<bool, RuntimeError>;

    /// Copy a host file or directory to `remote` inside the container.
    fn push_file(
        &self,
        name: &str,
        local: &Path,
        remote: &str,
        recursive: bool,
    ) -> Result<(), RuntimeError>;

    /// Run a command inside the container and capture its output.
    fn exec(&self, name: &str, command: &[String]) -> Result<std::process::Output, RuntimeError>;

    /// Replace the current process with the runtime client invoked with
    /// `args`. Real backends return only on failure.
    fn replace_process(&self, args: &[String]) -> Result<(), RuntimeError>;
}

pub fn select_backend(name: &str) -> Result<Box<dyn RuntimeBackend>, RuntimeError> {
    match name {
        "lxc" => Ok(Box::new(crate::lxc::LxcBackend::from_env())),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
