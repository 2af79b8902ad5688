//! Host-to-container file sync driven by the `sync` entries of a container.

use crate::engine::Engine;
use crate::CoreError;
use lxdev_schema::{Project, SyncEntry};
use std::fs;
use tracing::{debug, info, warn};

fn valid_dest(dest: &str) -> bool {
    dest.starts_with('/') || dest == "~" || dest.starts_with("~/")
}

/// Expand a leading `~` to `/home/<user>`.
pub fn expand_home(dest: &str, user: &str) -> String {
    if dest == "~" {
        format!("/home/{user}")
    } else if let Some(rest) = dest.strip_prefix("~/") {
        format!("/home/{user}/{rest}")
    } else {
        dest.to_owned()
    }
}

/// Parent directory of an in-container path; `/` for top-level entries.
fn remote_parent(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

impl Engine {
    pub fn sync_entries(&self, container: &str) -> Result<Vec<SyncEntry>, CoreError> {
        let project = self.load()?;
        Self::declared(&project, container)?;
        Ok(project.sync_entries(container).to_vec())
    }

    /// Add or replace (by source) a sync entry.
    pub fn sync_entry_add(&self, container: &str, source: &str, dest: &str) -> Result<(), CoreError> {
        if source.is_empty() {
            return Err(CoreError::InvalidInput("sync source cannot be empty".to_owned()));
        }
        if !valid_dest(dest) {
            return Err(CoreError::InvalidInput(format!(
                "sync destination '{dest}' must be an absolute path or start with ~/"
            )));
        }
        let (mut project, _lock) = self.load_locked()?;
        Self::declared(&project, container)?;
        project.add_sync_entry(container, source, dest);
        self.save(&project)
    }

    pub fn sync_entry_remove(&self, container: &str, source: &str) -> Result<(), CoreError> {
        let (mut project, _lock) = self.load_locked()?;
        Self::declared(&project, container)?;
        if !project.remove_sync_entry(container, source) {
            return Err(CoreError::NotFound(format!(
                "no sync entry with source '{source}' in container '{container}'"
            )));
        }
        self.save(&project)
    }

    /// Push every sync entry into the running container. All entries are
    /// attempted; failures are reported together. Returns how many entries
    /// were copied.
    pub fn sync_files(&self, container: &str) -> Result<usize, CoreError> {
        let project = self.load()?;
        Self::declared(&project, container)?;
        let entries = project.sync_entries(container);
        if entries.is_empty() {
            return Ok(0);
        }
        let runtime_name = self.running(&project, container)?;
        info!("sync {} entries into {runtime_name}", entries.len());

        let mut failures = Vec::new();
        for entry in entries {
            if let Err(e) = self.sync_entry(&project, container, &runtime_name, entry) {
                warn!("sync of {} failed: {e}", entry.source);
                failures.push(format!("{}: {e}", entry.source));
            }
        }

        if failures.is_empty() {
            Ok(entries.len())
        } else {
            Err(CoreError::Partial {
                summary: "sync errors".to_owned(),
                failures,
            })
        }
    }

    fn sync_entry(
        &self,
        project: &Project,
        container: &str,
        runtime_name: &str,
        entry: &SyncEntry,
    ) -> Result<(), CoreError> {
        let source = self.store().layout().resolve(&entry.source);
        let meta = match fs::metadata(&source) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::NotFound("source does not exist".to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        let recursive = meta.is_dir();

        let user = project.user(container);
        let owner = format!("{0}:{0}", user.name);
        let dest = expand_home(&entry.dest, &user.name);
        let dest_dir = remote_parent(&dest);

        if !self.backend().dir_exists(runtime_name, dest_dir)? {
            debug!("creating {dest_dir} in {runtime_name}");
            self.run_in(runtime_name, &argv(&["mkdir", "-p", dest_dir]))?;
            if let Err(e) = self.run_in(runtime_name, &argv(&["chown", &owner, dest_dir])) {
                warn!("could not chown {dest_dir}: {e}");
            }
        }

        // A recursive push lands the directory inside the target.
        let push_target = if recursive { dest_dir } else { dest.as_str() };
        self.backend()
            .push_file(runtime_name, &source, push_target, recursive)?;

        let chown = if recursive {
            argv(&["chown", "-R", &owner, &dest])
        } else {
            argv(&["chown", &owner, &dest])
        };
        self.run_in(runtime_name, &chown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::fixture;
    use crate::ErrorKind;
    use lxdev_runtime::RuntimeBackend;

    #[test]
    fn expand_home_variants() {
        assert_eq!(expand_home("~", "alice"), "/home/alice");
        assert_eq!(expand_home("~/app", "alice"), "/home/alice/app");
        assert_eq!(expand_home("/srv/app", "alice"), "/srv/app");
        assert_eq!(expand_home("~bob/app", "alice"), "~bob/app");
    }

    #[test]
    fn remote_parent_variants() {
        assert_eq!(remote_parent("/home/alice/app"), "/home/alice");
        assert_eq!(remote_parent("/home/alice/app/"), "/home/alice");
        assert_eq!(remote_parent("/app"), "/");
    }

    #[test]
    fn entries_replace_in_place_by_source() {
        let (_dir, _mock, engine) = fixture();
        engine.sync_entry_add("web", "./a", "/a").unwrap();
        engine.sync_entry_add("web", "./b", "/b").unwrap();
        engine.sync_entry_add("web", "./a", "~/a2").unwrap();

        let entries = engine.sync_entries("web").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source, "./a");
        assert_eq!(entries[0].dest, "~/a2");
        assert_eq!(entries[1].source, "./b");

        engine.sync_entry_remove("web", "./a").unwrap();
        assert_eq!(engine.sync_entries("web").unwrap().len(), 1);
        let err = engine.sync_entry_remove("web", "./a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn entry_validation() {
        let (_dir, _mock, engine) = fixture();
        let err = engine.sync_entry_add("web", "./a", "relative").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = engine.sync_entry_add("db", "./a", "/a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn sync_with_no_entries_is_noop() {
        let (_dir, mock, engine) = fixture();
        mock.stop("demo-web").unwrap();
        assert_eq!(engine.sync_files("web").unwrap(), 0);
    }

    #[test]
    fn sync_pushes_files_and_directories() {
        let (dir, mock, engine) = fixture();
        fs::write(dir.path().join(".env"), "A=1").unwrap();
        fs::create_dir(dir.path().join("app")).unwrap();
        engine.sync_entry_add("web", ".env", "~/.env").unwrap();
        engine.sync_entry_add("web", "app", "/srv/app").unwrap();

        assert_eq!(engine.sync_files("web").unwrap(), 2);

        let pushed = mock.pushed();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0].0, dir.path().join(".env"));
        assert_eq!(pushed[0].1, "/home/alice/.env");
        assert!(!pushed[0].2);
        assert_eq!(pushed[1].1, "/srv");
        assert!(pushed[1].2);

        let executed = mock.executed();
        assert!(executed.contains(&argv(&["mkdir", "-p", "/home/alice"])));
        assert!(executed.contains(&argv(&["chown", "alice:alice", "/home/alice/.env"])));
        assert!(executed.contains(&argv(&["chown", "-R", "alice:alice", "/srv/app"])));
    }

    #[test]
    fn sync_collects_every_failure() {
        let (dir, mock, engine) = fixture();
        fs::write(dir.path().join("present"), "x").unwrap();
        engine.sync_entry_add("web", "missing-1", "/a").unwrap();
        engine.sync_entry_add("web", "present", "/b").unwrap();
        engine.sync_entry_add("web", "missing-2", "/c").unwrap();

        let err = engine.sync_files("web").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing-1: source does not exist"));
        assert!(msg.contains("missing-2: source does not exist"));
        assert!(!msg.contains("present:"));
        assert_eq!(mock.pushed().len(), 1);
    }

    #[test]
    fn sync_requires_running_container() {
        let (_dir, mock, engine) = fixture();
        engine.sync_entry_add("web", "x", "/x").unwrap();
        mock.stop("demo-web").unwrap();
        let err = engine.sync_files("web").unwrap_err();
        assert!(matches!(err, CoreError::NotRunning(_)));
    }
}
