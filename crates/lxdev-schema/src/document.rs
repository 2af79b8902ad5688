use crate::device::Device;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to parse document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Root of `containers.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Prefix for runtime names; empty means unprefixed.
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub containers: BTreeMap<String, Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub ports: Vec<u32>,
    #[serde(default, skip_serializing_if = "User::is_empty")]
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl User {
    pub fn new(name: &str, password: &str) -> Self {
        Self {
            name: name.to_owned(),
            password: password.to_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.password.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u32>,
    #[serde(default, skip_serializing_if = "User::is_empty")]
    pub user: User,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sync: Vec<SyncEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub snapshots: BTreeMap<String, Snapshot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub devices: BTreeMap<String, Device>,
}

impl Container {
    pub fn with_image(image: &str) -> Self {
        Self {
            image: image.to_owned(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub source: String,
    pub dest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub description: String,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub created_at: String,
}

/// Parse without semantic validation; see [`Project::validate`].
pub fn parse_document_str(content: &str) -> Result<Project, DocumentError> {
    if content.trim().is_empty() {
        return Ok(Project::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

impl Project {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
