use crate::engine::Engine;
use crate::CoreError;
use lxdev_runtime::ImageInfo;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

fn temp_snapshot_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("snapshot-{secs}")
}

impl Engine {
    pub fn image_list(&self, all: bool) -> Result<Vec<ImageInfo>, CoreError> {
        Ok(self.backend().list_images(all)?)
    }

    pub fn image_delete(&self, alias: &str) -> Result<(), CoreError> {
        info!("delete image {alias}");
        if !self.backend().image_exists(alias)? {
            return Err(CoreError::NotFound(format!("image '{alias}' not found")));
        }
        Ok(self.backend().delete_image(alias)?)
    }

    pub fn image_rename(&self, old: &str, new: &str) -> Result<(), CoreError> {
        info!("rename image {old} -> {new}");
        if !self.backend().image_exists(old)? {
            return Err(CoreError::NotFound(format!("image '{old}' not found")));
        }
        if self.backend().image_exists(new)? {
            return Err(CoreError::AlreadyExists(format!(
                "image '{new}' already exists"
            )));
        }
        Ok(self.backend().rename_image(old, new)?)
    }

    /// Publish a container as image `alias`.
    ///
    /// The container is stopped for a consistent snapshot, the snapshot is
    /// published and then deleted, and the container is restarted if it was
    /// running, on the failure paths as well.
    pub fn image_create(
        &self,
        container: &str,
        alias: &str,
        progress: &mut dyn FnMut(&str),
    ) -> Result<(), CoreError> {
        info!("create image {alias} from {container}");
        let project = self.load()?;
        let runtime_name = self.live(&project, container)?;

        let was_running = self.backend().status(&runtime_name)?.is_running();
        if was_running {
            self.backend().stop(&runtime_name)?;
        }

        let snapshot = temp_snapshot_name();
        let published = self
            .backend()
            .snapshot(&runtime_name, &snapshot)
            .and_then(|()| {
                let result = self
                    .backend()
                    .publish_snapshot(&runtime_name, &snapshot, alias, progress);
                if let Err(e) = self.backend().delete_snapshot(&runtime_name, &snapshot) {
                    warn!("could not delete temporary snapshot {snapshot}: {e}");
                }
                result
            });

        if was_running {
            debug!("restarting {runtime_name}");
            let restarted = self.backend().start(&runtime_name);
            match (&published, restarted) {
                (Ok(()), Err(e)) => return Err(e.into()),
                (Err(_), Err(e)) => warn!("could not restart {runtime_name}: {e}"),
                _ => {}
            }
        }
        published.map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::fixture;
    use crate::ErrorKind;
    use lxdev_runtime::RuntimeBackend;

    #[test]
    fn create_publishes_and_cleans_up() {
        let (_dir, mock, engine) = fixture();
        let mut lines = Vec::new();
        engine
            .image_create("web", "web-base", &mut |l| lines.push(l.to_owned()))
            .unwrap();

        assert!(mock.image_exists("web-base").unwrap());
        assert!(!lines.is_empty());
        assert!(mock.list_snapshots("demo-web").unwrap().is_empty());
        assert!(mock.status("demo-web").unwrap().is_running());
        let calls = mock.calls();
        assert_eq!(calls.first().map(String::as_str), Some("stop demo-web"));
        assert_eq!(calls.last().map(String::as_str), Some("start demo-web"));
    }

    #[test]
    fn failed_publish_still_cleans_up_and_restarts() {
        let (_dir, mock, engine) = fixture();
        mock.fail_on("publish_snapshot");
        let err = engine.image_create("web", "web-base", &mut |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);

        assert!(mock.list_snapshots("demo-web").unwrap().is_empty());
        assert!(mock.status("demo-web").unwrap().is_running());
        assert!(!mock.image_exists("web-base").unwrap());
    }

    #[test]
    fn stopped_container_stays_stopped() {
        let (_dir, mock, engine) = fixture();
        mock.stop("demo-web").unwrap();
        mock.clear_calls();
        engine.image_create("web", "img", &mut |_| {}).unwrap();
        assert!(!mock.calls().iter().any(|c| c.starts_with("start")));
    }

    #[test]
    fn delete_and_rename_check_existence() {
        let (_dir, mock, engine) = fixture();
        assert_eq!(
            engine.image_delete("nope").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        mock.add_image("a");
        mock.add_image("b");
        assert_eq!(
            engine.image_rename("a", "b").unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );
        engine.image_rename("a", "c").unwrap();
        let aliases: Vec<String> = engine
            .image_list(false)
            .unwrap()
            .into_iter()
            .flat_map(|i| i.aliases)
            .collect();
        assert_eq!(aliases, ["b", "c"]);

        engine.image_delete("b").unwrap();
        assert!(!mock.image_exists("b").unwrap());
    }
}
