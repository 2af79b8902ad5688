//! Interactive `exec` and `shell`.
//!
//! Both end in [`RuntimeBackend::replace_process`](lxdev_runtime::RuntimeBackend::replace_process),
//! which only returns on failure with a real backend. No lock is held at
//! that point, so nothing is left to release.

use crate::engine::Engine;
use crate::CoreError;
use lxdev_runtime::{exec_args, shell_args};
use tracing::info;

impl Engine {
    pub fn exec(&self, container: &str, command: &[String]) -> Result<(), CoreError> {
        if command.is_empty() {
            return Err(CoreError::InvalidInput("no command given".to_owned()));
        }
        let project = self.load()?;
        let runtime_name = self.running(&project, container)?;
        info!("exec in {runtime_name}: {}", command.join(" "));
        Ok(self
            .backend()
            .replace_process(&exec_args(&runtime_name, command))?)
    }

    /// Login shell as `user`, or as the container's resolved user.
    pub fn shell(&self, container: &str, user: Option<&str>) -> Result<(), CoreError> {
        let project = self.load()?;
        let runtime_name = self.running(&project, container)?;
        let user = match user.filter(|u| !u.is_empty()) {
            Some(u) => u.to_owned(),
            None => project.user(container).name,
        };
        info!("shell in {runtime_name} as {user}");
        Ok(self
            .backend()
            .replace_process(&shell_args(&runtime_name, Some(&user)))?)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::test_support::fixture;
    use crate::{CoreError, ErrorKind};
    use lxdev_runtime::RuntimeBackend;

    #[test]
    fn exec_replaces_process_with_exec_argv() {
        let (_dir, mock, engine) = fixture();
        engine
            .exec("web", &["uname".to_owned(), "-a".to_owned()])
            .unwrap();
        assert_eq!(
            mock.replaced().unwrap(),
            ["exec", "demo-web", "--", "uname", "-a"]
        );
    }

    #[test]
    fn exec_rejects_empty_command() {
        let (_dir, mock, engine) = fixture();
        let err = engine.exec("web", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(mock.replaced().is_none());
    }

    #[test]
    fn shell_uses_resolved_user() {
        let (_dir, mock, engine) = fixture();
        engine.shell("web", None).unwrap();
        assert_eq!(
            mock.replaced().unwrap(),
            ["exec", "demo-web", "--", "su", "-l", "alice"]
        );

        engine.shell("web", Some("root")).unwrap();
        assert_eq!(
            mock.replaced().unwrap(),
            ["exec", "demo-web", "--", "bash", "-l"]
        );
    }

    #[test]
    fn shell_requires_running_container() {
        let (_dir, mock, engine) = fixture();
        mock.stop("demo-web").unwrap();
        let err = engine.shell("web", None).unwrap_err();
        assert!(matches!(err, CoreError::NotRunning(_)));
        assert!(mock.replaced().is_none());
    }
}
