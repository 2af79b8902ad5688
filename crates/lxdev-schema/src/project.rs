use crate::device::Device;
use crate::document::{Container, Project, Snapshot, SyncEntry, User};
use crate::validation::{
    validate_full_name, validate_ports, validate_project_name, ValidationError,
};

pub const FALLBACK_USER: &str = "dev";
pub const FALLBACK_PASSWORD: &str = "dev";
/// Taken right after creation; the reset baseline. Never deletable.
pub const INITIAL_SNAPSHOT: &str = "initial-state";

fn has_control_chars(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_control())
}

fn validate_device(device: &Device) -> Result<(), ValidationError> {
    if device.kind.is_empty() {
        return Err(ValidationError::InvalidDevice(
            "device type must not be empty".to_owned(),
        ));
    }
    if !device.is_disk() {
        return Ok(());
    }

    let source = device.config.source();
    let path = device.config.path();
    if source.is_empty() {
        return Err(ValidationError::InvalidDevice(
            "disk device requires 'source' config key".to_owned(),
        ));
    }
    if path.is_empty() {
        return Err(ValidationError::InvalidDevice(
            "disk device requires 'path' config key".to_owned(),
        ));
    }
    if has_control_chars(source) {
        return Err(ValidationError::InvalidDevice(
            "source path contains control characters".to_owned(),
        ));
    }
    if has_control_chars(path) {
        return Err(ValidationError::InvalidDevice(
            "path contains control characters".to_owned(),
        ));
    }
    Ok(())
}

impl Project {
    /// Semantic checks run on every load: names, ports and device shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.project.is_empty() {
            validate_project_name(&self.project)?;
        }
        validate_ports(&self.defaults.ports).map_err(|e| e.context("invalid default ports"))?;

        for (name, container) in &self.containers {
            let scope = || format!("container '{name}'");
            validate_full_name(&self.project, name).map_err(|e| e.context(scope()))?;
            if !container.ports.is_empty() {
                validate_ports(&container.ports).map_err(|e| e.context(scope()))?;
            }
            for (device_name, device) in &container.devices {
                validate_device(device)
                    .map_err(|e| e.context(format!("container '{name}' device '{device_name}'")))?;
            }
        }
        Ok(())
    }

    /// Name the runtime knows the container by.
    pub fn runtime_name(&self, name: &str) -> String {
        if self.project.is_empty() {
            name.to_owned()
        } else {
            format!("{}-{name}", self.project)
        }
    }

    /// Inverse of [`runtime_name`](Self::runtime_name); `None` for runtime
    /// containers outside this project.
    pub fn short_name<'a>(&self, runtime_name: &'a str) -> Option<&'a str> {
        if self.project.is_empty() {
            return Some(runtime_name);
        }
        runtime_name
            .strip_prefix(self.project.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.get(name)
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut Container> {
        self.containers.get_mut(name)
    }

    pub fn add_container(&mut self, name: &str, container: Container) {
        self.containers.insert(name.to_owned(), container);
    }

    pub fn remove_container(&mut self, name: &str) -> Option<Container> {
        self.containers.remove(name)
    }

    pub fn set_container_image(&mut self, name: &str, image: &str) -> bool {
        match self.containers.get_mut(name) {
            Some(c) => {
                image.clone_into(&mut c.image);
                true
            }
            None => false,
        }
    }

    /// Per-container ports when set, else the project defaults.
    pub fn ports(&self, name: &str) -> &[u32] {
        match self.containers.get(name) {
            Some(c) if !c.ports.is_empty() => &c.ports,
            _ => &self.defaults.ports,
        }
    }

    /// Three-tier cascade: container user, defaults user, fallback identity.
    /// Each tier fills a missing password from the tiers below it.
    pub fn user(&self, name: &str) -> User {
        let defaults = &self.defaults.user;
        let fallback_password = if defaults.password.is_empty() {
            FALLBACK_PASSWORD
        } else {
            defaults.password.as_str()
        };

        if let Some(c) = self.containers.get(name) {
            if !c.user.name.is_empty() {
                let password = if c.user.password.is_empty() {
                    fallback_password
                } else {
                    c.user.password.as_str()
                };
                return User::new(&c.user.name, password);
            }
        }
        if !defaults.name.is_empty() {
            return User::new(&defaults.name, fallback_password);
        }
        User::new(FALLBACK_USER, FALLBACK_PASSWORD)
    }

    pub fn snapshot(&self, container: &str, snapshot: &str) -> Option<&Snapshot> {
        self.containers.get(container)?.snapshots.get(snapshot)
    }

    pub fn has_snapshot(&self, container: &str, snapshot: &str) -> bool {
        self.snapshot(container, snapshot).is_some()
    }

    pub fn add_snapshot(&mut self, container: &str, name: &str, snapshot: Snapshot) -> bool {
        match self.containers.get_mut(container) {
            Some(c) => {
                c.snapshots.insert(name.to_owned(), snapshot);
                true
            }
            None => false,
        }
    }

    pub fn remove_snapshot(&mut self, container: &str, name: &str) -> Option<Snapshot> {
        self.containers.get_mut(container)?.snapshots.remove(name)
    }

    pub fn device(&self, container: &str, device: &str) -> Option<&Device> {
        self.containers.get(container)?.devices.get(device)
    }

    pub fn has_device(&self, container: &str, device: &str) -> bool {
        self.device(container, device).is_some()
    }

    pub fn add_device(&mut self, container: &str, name: &str, device: Device) -> bool {
        match self.containers.get_mut(container) {
            Some(c) => {
                c.devices.insert(name.to_owned(), device);
                true
            }
            None => false,
        }
    }

    pub fn remove_device(&mut self, container: &str, name: &str) -> Option<Device> {
        self.containers.get_mut(container)?.devices.remove(name)
    }

    /// Name of the device mounted at `path`, compared literally.
    pub fn find_device_by_path(&self, container: &str, path: &str) -> Option<&str> {
        self.containers
            .get(container)?
            .devices
            .iter()
            .find(|(_, d)| d.config.path.as_deref() == Some(path))
            .map(|(name, _)| name.as_str())
    }

    pub fn sync_entries(&self, container: &str) -> &[SyncEntry] {
        match self.containers.get(container) {
            Some(c) => &c.sync,
            None => &[],
        }
    }

    /// Replaces an entry with the same source in place, else appends.
    pub fn add_sync_entry(&mut self, container: &str, source: &str, dest: &str) -> bool {
        let Some(c) = self.containers.get_mut(container) else {
            return false;
        };
        if let Some(existing) = c.sync.iter_mut().find(|e| e.source == source) {
            dest.clone_into(&mut existing.dest);
        } else {
            c.sync.push(SyncEntry {
                source: source.to_owned(),
                dest: dest.to_owned(),
            });
        }
        true
    }

    pub fn remove_sync_entry(&mut self, container: &str, source: &str) -> bool {
        let Some(c) = self.containers.get_mut(container) else {
            return false;
        };
        let before = c.sync.len();
        c.sync.retain(|e| e.source != source);
        c.sync.len() != before
    }
}
