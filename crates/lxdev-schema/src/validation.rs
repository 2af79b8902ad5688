use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MAX_CONTAINER_NAME_LENGTH: usize = 63;
pub const MAX_MOUNT_NAME_LENGTH: usize = 50;
/// Limit imposed by the runtime on `<project>-<name>`.
pub const MAX_COMBINED_NAME_LENGTH: usize = 63;
pub const MAX_CONTAINER_PATH_LENGTH: usize = 4096;
pub const MIN_PORT: u32 = 1;
pub const MAX_PORT: u32 = 65535;

pub const RESERVED_NAMES: &[&str] = &[
    "list", "create", "delete", "start", "stop", "snapshot", "image", "config",
];

const BLOCKED_HOST_PATHS: &[&str] = &[
    "/",
    "/root",
    "/etc",
    "/boot",
    "/proc",
    "/sys",
    "/dev",
    "/var/lib/lxd",
    "/var/lib/lxc",
];

const BLOCKED_HOST_SUFFIXES: &[&str] = &["/.ssh", "/.aws", "/.gnupg", "/.config/gcloud"];

const RISKY_HOST_PATHS: &[&str] = &["/home", "/var", "/tmp", "/opt"];

const BLOCKED_CONTAINER_PATHS: &[&str] = &["/", "/proc", "/sys", "/dev"];

const MOUNT_NAME_PREFIX: &str = "mount-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    InvalidName(String),
    #[error("{0}")]
    InvalidPort(String),
    #[error("{0}")]
    InvalidPath(String),
    #[error("{0}")]
    Blocked(String),
    #[error("{0}")]
    InvalidDevice(String),
    #[error("{scope}: {inner}")]
    Context {
        scope: String,
        #[source]
        inner: Box<ValidationError>,
    },
}

impl ValidationError {
    pub fn context(self, scope: impl Into<String>) -> Self {
        Self::Context {
            scope: scope.into(),
            inner: Box::new(self),
        }
    }

    /// The innermost error, with every `Context` layer stripped.
    pub fn root(&self) -> &ValidationError {
        match self {
            Self::Context { inner, .. } => inner.root(),
            other => other,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.root(), Self::Blocked(_))
    }
}

/// A host source path after absolutization and symlink resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub path: String,
    /// Present when the path is allowed but sensitive; callers decide whether
    /// it needs explicit approval.
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum NameKind {
    Container,
    Mount,
}

impl NameKind {
    fn label(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Mount => "mount",
        }
    }

    fn max_len(self) -> usize {
        match self {
            Self::Container => MAX_CONTAINER_NAME_LENGTH,
            Self::Mount => MAX_MOUNT_NAME_LENGTH,
        }
    }
}

fn matches_name_grammar(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn validate_name(kind: NameKind, raw: &str) -> Result<(), ValidationError> {
    let label = kind.label();
    let name = raw.trim();

    if name.is_empty() {
        return Err(ValidationError::InvalidName(format!(
            "{label} name cannot be empty"
        )));
    }

    let len = name.chars().count();
    if len > kind.max_len() {
        return Err(ValidationError::InvalidName(format!(
            "{label} name too long: {len} characters (max {})",
            kind.max_len()
        )));
    }

    if !matches_name_grammar(name) {
        let reason = match name.chars().next() {
            Some(c) if c.is_ascii_digit() => format!("must start with a letter, not '{c}'"),
            _ if name.contains(' ') => "cannot contain spaces".to_owned(),
            _ if name.contains('_') => "cannot contain underscores (use hyphens instead)".to_owned(),
            _ => "contains invalid characters (allowed: letters, numbers, hyphens)".to_owned(),
        };
        return Err(ValidationError::InvalidName(format!(
            "{label} name '{name}' {reason}"
        )));
    }

    if name.ends_with('-') {
        return Err(ValidationError::InvalidName(format!(
            "{label} name '{name}' cannot start or end with a hyphen"
        )));
    }

    if name.contains("--") {
        return Err(ValidationError::InvalidName(format!(
            "{label} name '{name}' cannot contain consecutive hyphens"
        )));
    }

    if matches!(kind, NameKind::Container)
        && RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(ValidationError::InvalidName(format!(
            "'{name}' is a reserved name"
        )));
    }

    Ok(())
}

pub fn validate_container_name(name: &str) -> Result<(), ValidationError> {
    validate_name(NameKind::Container, name)
}

/// Mount (device) and snapshot names share this grammar.
pub fn validate_mount_name(name: &str) -> Result<(), ValidationError> {
    validate_name(NameKind::Mount, name)
}

/// Validate `name` and the runtime name `<project>-<name>` it expands to.
pub fn validate_full_name(project: &str, name: &str) -> Result<(), ValidationError> {
    validate_container_name(name)?;

    let name = name.trim();
    let full = if project.is_empty() {
        name.to_owned()
    } else {
        format!("{project}-{name}")
    };
    let len = full.chars().count();
    if len > MAX_COMBINED_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "full container name '{full}' too long: {len} characters (max {MAX_COMBINED_NAME_LENGTH}). \
             Use a shorter project or container name"
        )));
    }
    Ok(())
}

pub fn validate_project_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidName(
            "project name cannot be empty".to_owned(),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(ValidationError::InvalidName(format!(
            "invalid project name '{name}': only letters, numbers, hyphens and underscores are allowed"
        )));
    }
    Ok(())
}

pub fn validate_port(port: u32) -> Result<(), ValidationError> {
    if !(MIN_PORT..=MAX_PORT).contains(&port) {
        return Err(ValidationError::InvalidPort(format!(
            "invalid port {port}: must be between {MIN_PORT} and {MAX_PORT}"
        )));
    }
    Ok(())
}

pub fn validate_ports(ports: &[u32]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(ports.len());
    for &port in ports {
        validate_port(port)?;
        if !seen.insert(port) {
            return Err(ValidationError::InvalidPort(format!(
                "duplicate port {port} in configuration"
            )));
        }
    }
    Ok(())
}

/// Resolve a host directory for mounting and check it against the host
/// deny-lists. The returned path is the symlink-resolved one.
pub fn validate_source_path(raw: &str) -> Result<ResolvedSource, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::InvalidPath(
            "source path cannot be empty".to_owned(),
        ));
    }

    let absolute = std::path::absolute(raw).map_err(|e| {
        ValidationError::InvalidPath(format!("cannot resolve source path '{raw}': {e}"))
    })?;

    let resolved = fs::canonicalize(&absolute).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ValidationError::InvalidPath(format!(
                "source path does not exist: {}",
                absolute.display()
            ))
        } else {
            ValidationError::InvalidPath(format!(
                "cannot resolve source path '{}': {e}",
                absolute.display()
            ))
        }
    })?;

    let meta = fs::metadata(&resolved).map_err(|e| {
        ValidationError::InvalidPath(format!(
            "cannot access source path '{}': {e}",
            resolved.display()
        ))
    })?;
    if !meta.is_dir() {
        return Err(ValidationError::InvalidPath(format!(
            "source path must be a directory, not a file: {}",
            resolved.display()
        )));
    }

    let path = resolved
        .to_str()
        .ok_or_else(|| {
            ValidationError::InvalidPath(format!(
                "source path is not valid UTF-8: {}",
                resolved.display()
            ))
        })?
        .to_owned();

    if BLOCKED_HOST_PATHS.contains(&path.as_str()) {
        return Err(ValidationError::Blocked(format!(
            "mounting '{path}' is not allowed for security reasons"
        )));
    }
    if let Some(suffix) = BLOCKED_HOST_SUFFIXES
        .iter()
        .find(|suffix| path.ends_with(*suffix))
    {
        return Err(ValidationError::Blocked(format!(
            "mounting paths matching '{suffix}' is not allowed for security reasons"
        )));
    }

    let warning = RISKY_HOST_PATHS
        .contains(&path.as_str())
        .then(|| format!("mounting '{path}' is risky and may expose sensitive data"));

    Ok(ResolvedSource { path, warning })
}

fn is_path_control_char(c: char) -> bool {
    matches!(c, '\0' | '\n' | '\r' | '\t')
}

/// Lexically resolve `.` and `..` segments of an absolute path.
pub(crate) fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// The deny-list is checked against the cleaned path, so traversal that
/// lands elsewhere (`/home/../etc`) is accepted.
pub fn validate_container_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::InvalidPath(
            "container path cannot be empty".to_owned(),
        ));
    }
    if !path.starts_with('/') {
        return Err(ValidationError::InvalidPath(format!(
            "container path must be absolute (start with /): '{path}'"
        )));
    }
    let len = path.chars().count();
    if len > MAX_CONTAINER_PATH_LENGTH {
        return Err(ValidationError::InvalidPath(format!(
            "container path too long: {len} characters (max {MAX_CONTAINER_PATH_LENGTH})"
        )));
    }
    if path.chars().any(is_path_control_char) {
        return Err(ValidationError::InvalidPath(
            "container path cannot contain control characters".to_owned(),
        ));
    }

    let cleaned = clean_path(path);
    if BLOCKED_CONTAINER_PATHS.contains(&cleaned.as_str()) {
        return Err(ValidationError::Blocked(format!(
            "mounting to '{cleaned}' inside container is not allowed"
        )));
    }
    Ok(())
}

/// Derive a device name from the last segment of a host path.
pub fn generate_mount_name(source: &str) -> String {
    let base = Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name = String::with_capacity(base.len());
    let mut pending_hyphen = false;
    for c in base.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen {
                name.push('-');
                pending_hyphen = false;
            }
            name.push(c);
        } else if !name.is_empty() {
            pending_hyphen = true;
        }
    }

    if name.is_empty() {
        return MOUNT_NAME_PREFIX.trim_end_matches('-').to_owned();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, MOUNT_NAME_PREFIX);
    }

    if name.len() > MAX_MOUNT_NAME_LENGTH {
        name.truncate(MAX_MOUNT_NAME_LENGTH);
        while name.ends_with('-') {
            name.pop();
        }
    }
    name
}
