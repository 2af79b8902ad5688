//! Three-way diff between declared disk devices and the runtime's live ones.
//!
//! A declared device present live is `ok`, declared but absent is `missing`,
//! live but undeclared is `untracked`. [`Engine::sync_mounts`] converges the
//! two sides: untracked devices are adopted into the document, missing ones
//! are re-added to the runtime.

use crate::engine::Engine;
use crate::CoreError;
use lxdev_runtime::{DeviceInfo, RuntimeError};
use lxdev_schema::{Device, DeviceConfig, Project, DISK_DEVICE};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountStatus {
    Ok,
    Missing,
    Untracked,
}

impl fmt::Display for MountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Missing => write!(f, "missing"),
            Self::Untracked => write!(f, "untracked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub name: String,
    pub source: String,
    pub path: String,
    pub mode: String,
    pub status: MountStatus,
}

/// What [`Engine::sync_mounts`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Untracked runtime devices written into the document.
    pub adopted: Vec<String>,
    /// Declared devices re-added to the runtime.
    pub readded: Vec<String>,
    /// Untracked devices left out of the document because they lack a
    /// host source or a container path.
    pub skipped: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.readded.is_empty()
    }
}

/// Classify declared against live disk devices, sorted by name.
pub fn diff_mounts(declared: &BTreeMap<String, Device>, live: &[DeviceInfo]) -> Vec<MountInfo> {
    let live_disks: BTreeMap<&str, &DeviceInfo> = live
        .iter()
        .filter(|d| d.kind == DISK_DEVICE)
        .map(|d| (d.name.as_str(), d))
        .collect();

    let mut mounts: Vec<MountInfo> = declared
        .iter()
        .filter(|(_, d)| d.is_disk())
        .map(|(name, d)| MountInfo {
            name: name.clone(),
            source: d.config.source().to_owned(),
            path: d.config.path().to_owned(),
            mode: d.config.mode().to_owned(),
            status: if live_disks.contains_key(name.as_str()) {
                MountStatus::Ok
            } else {
                MountStatus::Missing
            },
        })
        .collect();

    for (name, dev) in &live_disks {
        if declared.get(*name).is_some_and(Device::is_disk) {
            continue;
        }
        let config = DeviceConfig::from_runtime_map(&dev.config);
        mounts.push(MountInfo {
            name: (*name).to_owned(),
            source: config.source().to_owned(),
            path: config.path().to_owned(),
            mode: config.mode().to_owned(),
            status: MountStatus::Untracked,
        });
    }

    mounts.sort_by(|a, b| a.name.cmp(&b.name));
    mounts
}

impl Engine {
    /// Declared and live mounts of one container. Read-only; runs without
    /// the project lock.
    pub fn list_mounts(&self, container: &str) -> Result<Vec<MountInfo>, CoreError> {
        let project = self.load()?;
        self.mounts_of(&project, container)
    }

    fn mounts_of(&self, project: &Project, container: &str) -> Result<Vec<MountInfo>, CoreError> {
        let runtime_name = self.live(project, container)?;
        let live = self.backend().device_list(&runtime_name)?;
        let empty = BTreeMap::new();
        let declared = project.container(container).map_or(&empty, |c| &c.devices);
        Ok(diff_mounts(declared, &live))
    }

    /// Adopt untracked devices and re-add missing ones.
    ///
    /// Fail-fast: the first runtime error aborts and nothing is saved. The
    /// document is written once, after every runtime call has succeeded,
    /// and only if it still passes the checks `load` applies.
    pub fn sync_mounts(&self, container: &str) -> Result<SyncReport, CoreError> {
        info!("sync mounts for {container}");
        let (mut project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, container)?;
        let mounts = self.mounts_of(&project, container)?;

        let mut report = SyncReport::default();
        for m in mounts {
            match m.status {
                MountStatus::Ok => {}
                MountStatus::Untracked if m.source.is_empty() || m.path.is_empty() => {
                    warn!(
                        "not adopting device {}: disk devices need both a source and a path",
                        m.name
                    );
                    report.skipped.push(m.name);
                }
                MountStatus::Untracked => {
                    debug!("adopting untracked device {}", m.name);
                    let device = Device::disk(&m.source, &m.path, m.mode == "ro", false);
                    project.add_device(container, &m.name, device);
                    report.adopted.push(m.name);
                }
                MountStatus::Missing => {
                    let Some(device) = project.device(container, &m.name) else {
                        continue;
                    };
                    debug!("re-adding missing device {}", m.name);
                    self.backend()
                        .device_add(
                            &runtime_name,
                            &m.name,
                            &device.kind,
                            &device.config.to_runtime_map(),
                        )
                        .map_err(|e| {
                            RuntimeError::command_failed(
                                &format!("re-add device '{}'", m.name),
                                &runtime_name,
                                e.to_string(),
                            )
                        })?;
                    report.readded.push(m.name);
                }
            }
        }

        project.validate()?;
        self.save(&project)?;
        Ok(report)
    }
}
