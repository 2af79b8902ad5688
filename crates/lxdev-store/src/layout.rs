use std::path::{Path, PathBuf};

pub const DOCUMENT_FILE: &str = "containers.yaml";
pub const LOCK_FILE: &str = "containers.yaml.lock";
/// Prefix of in-flight temporary files; they live beside the document so the
/// final rename never crosses a filesystem.
pub const TEMP_PREFIX: &str = ".containers.yaml.tmp.";

/// File locations inside one project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_FILE)
    }

    #[inline]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Resolve a sync source relative to the project directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}
