use crate::backend::{ContainerInfo, ContainerStatus, DeviceInfo, ImageInfo, RuntimeBackend};
use crate::RuntimeError;
use std::collections::{BTreeMap, BTreeSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct MockContainer {
    status: ContainerStatus,
    ip: Option<String>,
    image: String,
    privileged: bool,
    devices: BTreeMap<String, DeviceInfo>,
    snapshots: BTreeSet<String>,
    users: BTreeMap<String, String>,
}

impl MockContainer {
    fn new(image: &str, ip: String) -> Self {
        Self {
            status: ContainerStatus::Stopped,
            ip: Some(ip),
            image: image.to_owned(),
            privileged: false,
            devices: BTreeMap::new(),
            snapshots: BTreeSet::new(),
            users: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    containers: BTreeMap<String, MockContainer>,
    images: BTreeMap<String, ImageInfo>,
    calls: Vec<String>,
    failures: BTreeSet<String>,
    pushed: Vec<(PathBuf, String, bool)>,
    executed: Vec<Vec<String>>,
    replaced: Option<Vec<String>>,
    dirs: BTreeSet<(String, String)>,
    next_ip: u8,
}

/// In-memory runtime for tests.
///
/// Every mutating call is recorded in [`calls`](Self::calls) as
/// `"<op> <target>"`. Any operation can be made to fail with
/// [`fail_on`](Self::fail_on).
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

fn not_found(name: &str) -> RuntimeError {
    RuntimeError::NotFound(name.to_owned())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))
    }

    /// Record `op` and fail if it was armed with `fail_on`.
    fn enter(&self, op: &str, target: &str) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(format!("{op} {target}"));
        if state.failures.contains(op) {
            return Err(RuntimeError::command_failed(op, target, "injected failure"));
        }
        Ok(state)
    }

    fn container_mut<'a>(
        state: &'a mut MockState,
        name: &str,
    ) -> Result<&'a mut MockContainer, RuntimeError> {
        state.containers.get_mut(name).ok_or_else(|| not_found(name))
    }

    fn insert_container(state: &mut MockState, name: &str, image: &str) {
        state.next_ip = state.next_ip.wrapping_add(1);
        let ip = format!("10.0.3.{}", state.next_ip);
        state
            .containers
            .insert(name.to_owned(), MockContainer::new(image, ip));
    }

    /// Seed a container that exists outside of any lxdev operation.
    pub fn add_container(&self, name: &str, running: bool) {
        if let Ok(mut state) = self.lock() {
            Self::insert_container(&mut state, name, "ubuntu:24.04");
            if let Some(c) = state.containers.get_mut(name) {
                c.status = if running {
                    ContainerStatus::Running
                } else {
                    ContainerStatus::Stopped
                };
            }
        }
    }

    pub fn set_privileged(&self, name: &str, privileged: bool) {
        if let Ok(mut state) = self.lock() {
            if let Some(c) = state.containers.get_mut(name) {
                c.privileged = privileged;
            }
        }
    }

    /// Attach a device directly, bypassing call recording.
    pub fn insert_device(&self, name: &str, device: DeviceInfo) {
        if let Ok(mut state) = self.lock() {
            if let Some(c) = state.containers.get_mut(name) {
                c.devices.insert(device.name.clone(), device);
            }
        }
    }

    /// Detach a device directly, bypassing call recording.
    pub fn drop_device(&self, name: &str, device: &str) {
        if let Ok(mut state) = self.lock() {
            if let Some(c) = state.containers.get_mut(name) {
                c.devices.remove(device);
            }
        }
    }

    pub fn add_image(&self, alias: &str) {
        if let Ok(mut state) = self.lock() {
            state.images.insert(
                alias.to_owned(),
                ImageInfo {
                    fingerprint: format!("mock-{alias}"),
                    aliases: vec![alias.to_owned()],
                    description: String::new(),
                    size: 0,
                    created_at: String::new(),
                },
            );
        }
    }

    pub fn fail_on(&self, op: &str) {
        if let Ok(mut state) = self.lock() {
            state.failures.insert(op.to_owned());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.lock() {
            state.failures.clear();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.lock() {
            state.calls.clear();
        }
    }

    pub fn devices(&self, name: &str) -> Vec<DeviceInfo> {
        self.lock()
            .ok()
            .and_then(|s| {
                s.containers
                    .get(name)
                    .map(|c| c.devices.values().cloned().collect())
            })
            .unwrap_or_default()
    }

    pub fn image_of(&self, name: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|s| s.containers.get(name).map(|c| c.image.clone()))
    }

    pub fn password_of(&self, name: &str, user: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|s| s.containers.get(name)?.users.get(user).cloned())
    }

    /// `(local, remote, recursive)` for each file push.
    pub fn pushed(&self) -> Vec<(PathBuf, String, bool)> {
        self.lock().map(|s| s.pushed.clone()).unwrap_or_default()
    }

    pub fn executed(&self) -> Vec<Vec<String>> {
        self.lock().map(|s| s.executed.clone()).unwrap_or_default()
    }

    /// Argument vector of the last `replace_process` call.
    pub fn replaced(&self) -> Option<Vec<String>> {
        self.lock().ok().and_then(|s| s.replaced.clone())
    }
}

impl RuntimeBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn exists(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self.lock()?.containers.contains_key(name))
    }

    fn status(&self, name: &str) -> Result<ContainerStatus, RuntimeError> {
        let state = self.lock()?;
        let c = state.containers.get(name).ok_or_else(|| not_found(name))?;
        Ok(c.status.clone())
    }

    fn ip(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        let state = self.lock()?;
        let c = state.containers.get(name).ok_or_else(|| not_found(name))?;
        Ok(if c.status.is_running() {
            c.ip.clone()
        } else {
            None
        })
    }

    fn launch(&self, name: &str, image: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("launch", name)?;
        if state.containers.contains_key(name) {
            return Err(RuntimeError::command_failed("launch", name, "already exists"));
        }
        Self::insert_container(&mut state, name, image);
        Self::container_mut(&mut state, name)?.status = ContainerStatus::Running;
        Ok(())
    }

    fn enable_nesting(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("enable_nesting", name)?;
        Self::container_mut(&mut state, name)?;
        Ok(())
    }

    fn wait_ready(&self, name: &str, _timeout: Duration) -> Result<(), RuntimeError> {
        let mut state = self.enter("wait_ready", name)?;
        let c = Self::container_mut(&mut state, name)?;
        if c.status.is_running() {
            Ok(())
        } else {
            Err(RuntimeError::Timeout(name.to_owned()))
        }
    }

    fn setup_user(&self, name: &str, user: &str, password: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("setup_user", name)?;
        Self::container_mut(&mut state, name)?
            .users
            .insert(user.to_owned(), password.to_owned());
        Ok(())
    }

    fn enable_ssh(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("enable_ssh", name)?;
        Self::container_mut(&mut state, name)?;
        Ok(())
    }

    fn start(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("start", name)?;
        Self::container_mut(&mut state, name)?.status = ContainerStatus::Running;
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("stop", name)?;
        Self::container_mut(&mut state, name)?.status = ContainerStatus::Stopped;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("delete", name)?;
        state
            .containers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    fn snapshot(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("snapshot", name)?;
        let c = Self::container_mut(&mut state, name)?;
        if !c.snapshots.insert(snapshot.to_owned()) {
            return Err(RuntimeError::command_failed(
                "snapshot",
                name,
                format!("snapshot '{snapshot}' already exists"),
            ));
        }
        Ok(())
    }

    fn restore(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("restore", name)?;
        let c = Self::container_mut(&mut state, name)?;
        if !c.snapshots.contains(snapshot) {
            return Err(RuntimeError::command_failed(
                "restore",
                name,
                format!("snapshot '{snapshot}' not found"),
            ));
        }
        Ok(())
    }

    fn copy(&self, source: &str, dest: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("copy", source)?;
        let mut copied = state
            .containers
            .get(source)
            .cloned()
            .ok_or_else(|| not_found(source))?;
        copied.status = ContainerStatus::Stopped;
        copied.snapshots.clear();
        state.containers.insert(dest.to_owned(), copied);
        Ok(())
    }

    fn copy_snapshot(&self, source: &str, snapshot: &str, dest: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("copy_snapshot", source)?;
        let mut copied = state
            .containers
            .get(source)
            .cloned()
            .ok_or_else(|| not_found(source))?;
        if !copied.snapshots.contains(snapshot) {
            return Err(RuntimeError::command_failed(
                "copy",
                source,
                format!("snapshot '{snapshot}' not found"),
            ));
        }
        copied.status = ContainerStatus::Stopped;
        copied.snapshots.clear();
        state.containers.insert(dest.to_owned(), copied);
        Ok(())
    }

    fn device_add(
        &self,
        name: &str,
        device: &str,
        kind: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<(), RuntimeError> {
        let mut state = self.enter("device_add", name)?;
        let c = Self::container_mut(&mut state, name)?;
        if c.devices.contains_key(device) {
            return Err(RuntimeError::command_failed(
                "device_add",
                name,
                format!("device '{device}' already exists"),
            ));
        }
        c.devices.insert(
            device.to_owned(),
            DeviceInfo {
                name: device.to_owned(),
                kind: kind.to_owned(),
                config: config.clone(),
            },
        );
        Ok(())
    }

    fn device_remove(&self, name: &str, device: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("device_remove", name)?;
        let c = Self::container_mut(&mut state, name)?;
        c.devices.remove(device).map(|_| ()).ok_or_else(|| {
            RuntimeError::command_failed(
                "device_remove",
                name,
                format!("device '{device}' not found"),
            )
        })
    }

    fn device_list(&self, name: &str) -> Result<Vec<DeviceInfo>, RuntimeError> {
        let state = self.lock()?;
        let c = state.containers.get(name).ok_or_else(|| not_found(name))?;
        Ok(c.devices.values().cloned().collect())
    }

    fn is_privileged(&self, name: &str) -> Result<bool, RuntimeError> {
        let state = self.lock()?;
        let c = state.containers.get(name).ok_or_else(|| not_found(name))?;
        Ok(c.privileged)
    }

    fn list_all(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let state = self.lock()?;
        Ok(state
            .containers
            .iter()
            .map(|(name, c)| ContainerInfo {
                name: name.clone(),
                status: c.status.clone(),
                ipv4: if c.status.is_running() {
                    c.ip.clone()
                } else {
                    None
                },
            })
            .collect())
    }

    fn list_snapshots(&self, name: &str) -> Result<Vec<String>, RuntimeError> {
        let state = self.lock()?;
        let c = state.containers.get(name).ok_or_else(|| not_found(name))?;
        Ok(c.snapshots.iter().cloned().collect())
    }

    fn delete_snapshot(&self, name: &str, snapshot: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("delete_snapshot", name)?;
        let c = Self::container_mut(&mut state, name)?;
        if c.snapshots.remove(snapshot) {
            Ok(())
        } else {
            Err(RuntimeError::command_failed(
                "delete_snapshot",
                name,
                format!("snapshot '{snapshot}' not found"),
            ))
        }
    }

    fn list_images(&self, all: bool) -> Result<Vec<ImageInfo>, RuntimeError> {
        let state = self.lock()?;
        Ok(state
            .images
            .values()
            .filter(|img| all || !img.aliases.is_empty())
            .cloned()
            .collect())
    }

    fn image_exists(&self, alias: &str) -> Result<bool, RuntimeError> {
        Ok(self.lock()?.images.contains_key(alias))
    }

    fn delete_image(&self, alias: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("delete_image", alias)?;
        state
            .images
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::command_failed("delete_image", alias, "not found"))
    }

    fn rename_image(&self, old: &str, new: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter("rename_image", old)?;
        let mut image = state
            .images
            .remove(old)
            .ok_or_else(|| RuntimeError::command_failed("rename_image", old, "not found"))?;
        image.aliases = vec![new.to_owned()];
        state.images.insert(new.to_owned(), image);
        Ok(())
    }

    fn publish_snapshot(
        &self,
        name: &str,
        snapshot: &str,
        alias: &str,
        progress: &mut dyn FnMut(&str),
    ) -> Result<(), RuntimeError> {
        {
            let mut state = self.enter("publish_snapshot", name)?;
            let c = Self::container_mut(&mut state, name)?;
            if !c.snapshots.contains(snapshot) {
                return Err(RuntimeError::command_failed(
                    "publish",
                    name,
                    format!("snapshot '{snapshot}' not found"),
                ));
            }
        }
        progress("Image pack: 100%");
        self.add_image(alias);
        Ok(())
    }

    fn dir_exists(&self, name: &str, path: &str) -> Result<bool, RuntimeError> {
        let state = self.lock()?;
        if !state.containers.contains_key(name) {
            return Err(not_found(name));
        }
        Ok(path == "/" || state.dirs.contains(&(name.to_owned(), path.to_owned())))
    }

    fn push_file(
        &self,
        name: &str,
        local: &Path,
        remote: &str,
        recursive: bool,
    ) -> Result<(), RuntimeError> {
        let mut state = self.enter("push_file", name)?;
        Self::container_mut(&mut state, name)?;
        state
            .pushed
            .push((local.to_path_buf(), remote.to_owned(), recursive));
        Ok(())
    }

    fn exec(&self, name: &str, command: &[String]) -> Result<Output, RuntimeError> {
        let mut state = self.enter("exec", name)?;
        Self::container_mut(&mut state, name)?;
        if let [mkdir, flag, dir] = command {
            if mkdir == "mkdir" && flag == "-p" {
                state.dirs.insert((name.to_owned(), dir.clone()));
            }
        }
        state.executed.push(command.to_vec());
        Ok(Output {
            status: ExitStatus::from_raw(0),
            stdout: format!("mock-exec: {}\n", command.join(" ")).into_bytes(),
            stderr: Vec::new(),
        })
    }

    fn replace_process(&self, args: &[String]) -> Result<(), RuntimeError> {
        let mut state = self.enter("replace_process", args.get(1).map_or("", String::as_str))?;
        state.replaced = Some(args.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(source: &str, path: &str) -> BTreeMap<String, String> {
        let mut config = BTreeMap::new();
        config.insert("source".to_owned(), source.to_owned());
        config.insert("path".to_owned(), path.to_owned());
        config
    }

    #[test]
    fn mock_lifecycle() {
        let backend = MockBackend::new();
        backend.launch("demo-web", "ubuntu:24.04").unwrap();
        assert!(backend.exists("demo-web").unwrap());
        assert_eq!(backend.status("demo-web").unwrap(), ContainerStatus::Running);
        assert!(backend.ip("demo-web").unwrap().is_some());

        backend.stop("demo-web").unwrap();
        assert_eq!(backend.status("demo-web").unwrap(), ContainerStatus::Stopped);
        assert!(backend.ip("demo-web").unwrap().is_none());

        backend.delete("demo-web").unwrap();
        assert!(!backend.exists("demo-web").unwrap());
        assert!(matches!(
            backend.status("demo-web"),
            Err(RuntimeError::NotFound(_))
        ));
    }

    #[test]
    fn mock_devices() {
        let backend = MockBackend::new();
        backend.add_container("c", true);
        backend
            .device_add("c", "repo", "disk", &disk("/src", "/ws"))
            .unwrap();
        assert!(backend
            .device_add("c", "repo", "disk", &disk("/src", "/ws"))
            .is_err());
        assert_eq!(backend.device_list("c").unwrap().len(), 1);
        backend.device_remove("c", "repo").unwrap();
        assert!(backend.device_list("c").unwrap().is_empty());
        assert!(backend.device_remove("c", "repo").is_err());
    }

    #[test]
    fn mock_snapshots_and_copy() {
        let backend = MockBackend::new();
        backend.add_container("a", true);
        backend.snapshot("a", "s1").unwrap();
        assert!(backend.snapshot("a", "s1").is_err());
        assert!(backend.snapshot_exists("a", "s1").unwrap());

        backend.copy_snapshot("a", "s1", "b").unwrap();
        assert_eq!(backend.status("b").unwrap(), ContainerStatus::Stopped);
        assert!(backend.list_snapshots("b").unwrap().is_empty());

        backend.delete_snapshot("a", "s1").unwrap();
        assert!(!backend.snapshot_exists("a", "s1").unwrap());
    }

    #[test]
    fn injected_failures_are_recorded() {
        let backend = MockBackend::new();
        backend.add_container("c", true);
        backend.fail_on("device_add");
        let err = backend
            .device_add("c", "repo", "disk", &disk("/src", "/ws"))
            .unwrap_err();
        assert!(err.to_string().contains("injected failure"));
        assert_eq!(backend.calls(), ["device_add c"]);
        assert!(backend.devices("c").is_empty());

        backend.clear_failures();
        backend
            .device_add("c", "repo", "disk", &disk("/src", "/ws"))
            .unwrap();
        assert_eq!(backend.devices("c").len(), 1);
    }

    #[test]
    fn mock_images() {
        let backend = MockBackend::new();
        backend.add_container("c", false);
        backend.snapshot("c", "snap").unwrap();
        let mut lines = Vec::new();
        backend
            .publish_snapshot("c", "snap", "base", &mut |l| lines.push(l.to_owned()))
            .unwrap();
        assert!(!lines.is_empty());
        assert!(backend.image_exists("base").unwrap());
        backend.rename_image("base", "base2").unwrap();
        assert!(!backend.image_exists("base").unwrap());
        assert_eq!(backend.list_images(false).unwrap().len(), 1);
        backend.delete_image("base2").unwrap();
        assert!(backend.list_images(true).unwrap().is_empty());
    }

    #[test]
    fn mock_exec_and_replace() {
        let backend = MockBackend::new();
        backend.add_container("c", true);
        let out = backend.exec("c", &["true".to_owned()]).unwrap();
        assert!(out.status.success());
        assert_eq!(backend.executed(), vec![vec!["true".to_owned()]]);

        let args = crate::exec::shell_args("c", Some("dev"));
        backend.replace_process(&args).unwrap();
        assert_eq!(backend.replaced(), Some(args));
    }
}
