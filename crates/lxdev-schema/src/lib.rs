//! Declared-state document model and validation rules for lxdev.
//!
//! This crate defines the schema layer: the `containers.yaml` document
//! (`Project`, `Container`, `Device`, `SyncEntry`, `Snapshot`), its YAML
//! parsing and serialization, the in-memory accessors used by every
//! operation, and the pure validation functions that gate names, ports and
//! filesystem paths before they reach the container runtime.

pub mod device;
pub mod document;
pub mod project;
pub mod validation;

pub use device::{Device, DeviceConfig, DISK_DEVICE};
pub use document::{
    parse_document_str, Container, Defaults, DocumentError, Project, Snapshot, SyncEntry, User,
};
pub use project::{FALLBACK_PASSWORD, FALLBACK_USER, INITIAL_SNAPSHOT};
pub use validation::{
    generate_mount_name, validate_container_name, validate_container_path, validate_full_name,
    validate_mount_name, validate_port, validate_ports, validate_project_name,
    validate_source_path, ResolvedSource, ValidationError,
};
