use crate::containers::now_rfc3339;
use crate::engine::Engine;
use crate::CoreError;
use chrono::{DateTime, Utc};
use lxdev_schema::{validate_mount_name, Snapshot, INITIAL_SNAPSHOT};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub name: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl Engine {
    pub fn snapshot_create(
        &self,
        container: &str,
        name: &str,
        description: &str,
    ) -> Result<(), CoreError> {
        info!("snapshot {container}/{name}");
        validate_mount_name(name).map_err(|e| e.context("invalid snapshot name"))?;
        let (mut project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, container)?;

        if self.backend().snapshot_exists(&runtime_name, name)? {
            return Err(CoreError::AlreadyExists(format!(
                "snapshot '{name}' already exists"
            )));
        }
        self.backend().snapshot(&runtime_name, name)?;

        project.add_snapshot(
            container,
            name,
            Snapshot {
                description: description.to_owned(),
                created_at: now_rfc3339(),
            },
        );
        self.save(&project)
    }

    /// Snapshots the runtime has, sorted, with whatever metadata the
    /// document recorded for them.
    pub fn snapshot_list(&self, container: &str) -> Result<Vec<SnapshotInfo>, CoreError> {
        let project = self.load()?;
        let runtime_name = self.live(&project, container)?;
        let mut names = self.backend().list_snapshots(&runtime_name)?;
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| {
                let meta = project.snapshot(container, &name);
                SnapshotInfo {
                    description: meta.map(|m| m.description.clone()).unwrap_or_default(),
                    created_at: meta.and_then(|m| parse_created_at(&m.created_at)),
                    name,
                }
            })
            .collect())
    }

    pub fn snapshot_delete(&self, container: &str, name: &str) -> Result<(), CoreError> {
        info!("delete snapshot {container}/{name}");
        let (mut project, _lock) = self.load_locked()?;
        let runtime_name = self.live(&project, container)?;

        if name == INITIAL_SNAPSHOT {
            return Err(CoreError::Unsupported(format!(
                "cannot delete '{INITIAL_SNAPSHOT}' snapshot"
            )));
        }
        if !self.backend().snapshot_exists(&runtime_name, name)? {
            return Err(CoreError::NotFound(format!(
                "snapshot '{name}' does not exist"
            )));
        }
        self.backend().delete_snapshot(&runtime_name, name)?;

        project.remove_snapshot(container, name);
        self.save(&project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::fixture;
    use crate::ErrorKind;
    use lxdev_runtime::RuntimeBackend;

    #[test]
    fn create_records_metadata() {
        let (_dir, mock, engine) = fixture();
        engine.snapshot_create("web", "before-upgrade", "pre apt upgrade").unwrap();

        assert!(mock.snapshot_exists("demo-web", "before-upgrade").unwrap());
        let project = engine.load().unwrap();
        let snap = project.snapshot("web", "before-upgrade").unwrap();
        assert_eq!(snap.description, "pre apt upgrade");
        assert!(parse_created_at(&snap.created_at).is_some());

        let err = engine.snapshot_create("web", "before-upgrade", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn create_validates_name() {
        let (_dir, mock, engine) = fixture();
        let err = engine.snapshot_create("web", "bad name", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("invalid snapshot name"));
        assert!(mock.list_snapshots("demo-web").unwrap().is_empty());
    }

    #[test]
    fn list_joins_runtime_names_with_metadata() {
        let (_dir, mock, engine) = fixture();
        engine.snapshot_create("web", "zeta", "last").unwrap();
        mock.snapshot("demo-web", "alpha").unwrap();

        let mut project = engine.load().unwrap();
        project.add_snapshot(
            "web",
            "alpha",
            Snapshot {
                description: "external".to_owned(),
                created_at: "not a timestamp".to_owned(),
            },
        );
        engine.save(&project).unwrap();

        let list = engine.snapshot_list("web").unwrap();
        let names: Vec<&str> = list.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(list[0].description, "external");
        assert_eq!(list[0].created_at, None);
        assert_eq!(list[1].description, "last");
        assert!(list[1].created_at.is_some());
    }

    #[test]
    fn initial_state_is_protected() {
        let (_dir, mock, engine) = fixture();
        mock.snapshot("demo-web", INITIAL_SNAPSHOT).unwrap();
        let err = engine.snapshot_delete("web", INITIAL_SNAPSHOT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(mock.snapshot_exists("demo-web", INITIAL_SNAPSHOT).unwrap());
    }

    #[test]
    fn delete_removes_from_both_sides() {
        let (_dir, mock, engine) = fixture();
        engine.snapshot_create("web", "v1", "").unwrap();
        engine.snapshot_delete("web", "v1").unwrap();
        assert!(!mock.snapshot_exists("demo-web", "v1").unwrap());
        assert!(!engine.load().unwrap().has_snapshot("web", "v1"));

        let err = engine.snapshot_delete("web", "v1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
