use crate::engine::Engine;
use crate::CoreError;
use lxdev_schema::{
    generate_mount_name, validate_container_path, validate_mount_name, validate_source_path,
    Device,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Host prefix privileged containers may never mount.
const PRIVILEGED_BLOCKED_PREFIX: &str = "/home";

/// Component-wise: `/home/alice` is blocked, `/homework` is not.
fn blocked_for_privileged(source: &str) -> bool {
    Path::new(source).starts_with(PRIVILEGED_BLOCKED_PREFIX)
}

/// Options for [`Engine::mount`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Device name; generated from the source directory when `None`.
    pub name: Option<String>,
    /// Mounts are read-only unless this is set.
    pub read_write: bool,
    /// Ask the runtime to shift uid/gid ownership.
    pub shift: bool,
    /// Proceed past a risky-path warning instead of failing.
    pub allow_risky_path: bool,
}

impl Engine {
    /// Attach host directory `source` at `container_path`. Returns the device
    /// name used.
    ///
    /// Every check runs before the runtime is touched. The runtime device is
    /// added first; if saving the document then fails, the device is removed
    /// again.
    pub fn mount(
        &self,
        container: &str,
        source: &str,
        container_path: &str,
        opts: &MountOptions,
    ) -> Result<String, CoreError> {
        info!("mount {source} -> {container}:{container_path}");
        let (mut project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, container)?;

        let resolved =
            validate_source_path(source).map_err(|e| e.context("invalid source path"))?;
        if let Some(warning) = resolved.warning {
            if !opts.allow_risky_path {
                return Err(CoreError::RiskyPath(warning));
            }
            warn!("{warning}");
        }
        validate_container_path(container_path).map_err(|e| e.context("invalid container path"))?;

        let device_name = match &opts.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => generate_mount_name(&resolved.path),
        };
        validate_mount_name(&device_name).map_err(|e| e.context("invalid device name"))?;

        if project.has_device(container, &device_name) {
            return Err(CoreError::AlreadyExists(format!(
                "device '{device_name}' already exists on container '{container}'"
            )));
        }
        if let Some(existing) = project.find_device_by_path(container, container_path) {
            return Err(CoreError::AlreadyExists(format!(
                "container path '{container_path}' is already mounted by device '{existing}'"
            )));
        }

        if self.backend().is_privileged(&runtime_name)? {
            if opts.read_write {
                return Err(CoreError::Unsupported(
                    "read-write mounts are disabled for privileged containers".to_owned(),
                ));
            }
            if blocked_for_privileged(&resolved.path) {
                return Err(CoreError::Unsupported(format!(
                    "mounting {PRIVILEGED_BLOCKED_PREFIX} to privileged containers is blocked for security reasons"
                )));
            }
        }

        let device = Device::disk(&resolved.path, container_path, !opts.read_write, opts.shift);
        self.backend().device_add(
            &runtime_name,
            &device_name,
            &device.kind,
            &device.config.to_runtime_map(),
        )?;
        debug!("added device {device_name} to {runtime_name}");

        project.add_device(container, &device_name, device);
        if let Err(e) = self.save(&project) {
            if let Err(rollback) = self.backend().device_remove(&runtime_name, &device_name) {
                warn!("failed to roll back device {device_name} on {runtime_name}: {rollback}");
            } else {
                debug!("rolled back device {device_name} on {runtime_name}");
            }
            return Err(e);
        }
        Ok(device_name)
    }

    /// Detach a device by name, or by container path when the argument
    /// starts with `/`.
    pub fn unmount(&self, container: &str, name_or_path: &str) -> Result<String, CoreError> {
        info!("unmount {name_or_path} from {container}");
        let (mut project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, container)?;

        let device_name = if name_or_path.starts_with('/') {
            project
                .find_device_by_path(container, name_or_path)
                .map(str::to_owned)
                .ok_or_else(|| {
                    CoreError::NotFound(format!(
                        "no device found with path '{name_or_path}' in container '{container}'"
                    ))
                })?
        } else {
            name_or_path.to_owned()
        };
        if !project.has_device(container, &device_name) {
            return Err(CoreError::NotFound(format!(
                "device '{device_name}' not found in container '{container}'"
            )));
        }

        self.backend().device_remove(&runtime_name, &device_name)?;
        project.remove_device(container, &device_name);
        self.save(&project)?;
        Ok(device_name)
    }
}
